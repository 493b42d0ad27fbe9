// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Targets: one (pod, container) pair selected for tailing

use std::collections::HashMap;
use std::fmt;

/// A container inside a pod that should be tailed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl Target {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: container.into(),
        }
    }

    /// Flat identifier used for logging and deduplication
    pub fn id(&self) -> String {
        format!("{}-{}-{}", self.namespace, self.pod, self.container)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} › {}", self.namespace, self.pod, self.container)
    }
}

/// Targets currently being tailed, keyed by [`Target::id`]
///
/// The watcher may announce the same target several times (restarts,
/// repeated status updates). Consumers use this set to start tailing once
/// and stop once.
#[derive(Debug, Default)]
pub struct TargetSet {
    active: HashMap<String, Target>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the target was not active before
    pub fn insert(&mut self, target: Target) -> bool {
        let id = target.id();
        if self.active.contains_key(&id) {
            return false;
        }
        self.active.insert(id, target);
        true
    }

    /// Returns the removed target if it was active
    pub fn remove(&mut self, target: &Target) -> Option<Target> {
        self.active.remove(&target.id())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
