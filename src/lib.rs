// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Decide which Kubernetes containers to tail
//!
//! [`watch::PodWatcher`] consumes raw pod watch events and produces two
//! streams of [`watch::Target`]s: containers that became interesting and
//! containers that stopped being interesting. [`kubernetes::PodApiSource`]
//! feeds it from a live cluster.

pub mod config;
pub mod kubernetes;
pub mod watch;
