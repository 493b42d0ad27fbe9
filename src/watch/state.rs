// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Container lifecycle state classification
//!
//! The watcher asks a [`StateMatcher`] whether a container's current runtime
//! state makes it worth tailing. [`ContainerStateFilter`] is the matcher built
//! from `--container-state` values.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::ContainerState;
use thiserror::Error;

/// Decides which container runtime states count as "active"
pub trait StateMatcher: Send + Sync {
    /// Whether the container's current state is one of the interesting states
    fn matches(&self, state: Option<&ContainerState>) -> bool;

    /// Whether every state is interesting, including ones `matches` rejects
    fn has_wildcard(&self) -> bool;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateFilterError {
    #[error("unknown container state '{0}', expected one of: running, waiting, terminated, all")]
    Unknown(String),
}

/// One selectable container state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Running,
    Waiting,
    Terminated,
    /// Wildcard: every pod is reported once, whatever its container states
    All,
}

impl StateKind {
    fn is_set_in(self, state: &ContainerState) -> bool {
        match self {
            StateKind::Running => state.running.is_some(),
            StateKind::Waiting => state.waiting.is_some(),
            StateKind::Terminated => state.terminated.is_some(),
            StateKind::All => false,
        }
    }
}

impl FromStr for StateKind {
    type Err = StateFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(StateKind::Running),
            "waiting" => Ok(StateKind::Waiting),
            "terminated" => Ok(StateKind::Terminated),
            "all" => Ok(StateKind::All),
            _ => Err(StateFilterError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Running => write!(f, "running"),
            StateKind::Waiting => write!(f, "waiting"),
            StateKind::Terminated => write!(f, "terminated"),
            StateKind::All => write!(f, "all"),
        }
    }
}

/// Matcher over a configured list of container states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStateFilter {
    kinds: Vec<StateKind>,
}

impl ContainerStateFilter {
    pub fn new(kinds: Vec<StateKind>) -> Self {
        if kinds.is_empty() {
            return Self::default();
        }
        Self { kinds }
    }

    /// Parse state names such as `["running", "terminated"]`
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, StateFilterError> {
        let kinds = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<StateKind>, _>>()?;
        Ok(Self::new(kinds))
    }

    pub fn kinds(&self) -> &[StateKind] {
        &self.kinds
    }

    fn has(&self, kind: StateKind) -> bool {
        self.kinds.contains(&kind)
    }
}

impl Default for ContainerStateFilter {
    fn default() -> Self {
        Self {
            kinds: vec![StateKind::Running],
        }
    }
}

impl StateMatcher for ContainerStateFilter {
    fn matches(&self, state: Option<&ContainerState>) -> bool {
        let Some(state) = state else {
            return false;
        };
        self.kinds.iter().any(|k| k.is_set_in(state))
    }

    fn has_wildcard(&self) -> bool {
        self.has(StateKind::All)
    }
}
