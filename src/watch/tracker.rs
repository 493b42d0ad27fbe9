// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-session state machine deciding which containers become active or inactive
//!
//! The tracker is synchronous and owned by the watch task. It only decides;
//! sending the resulting notifications is the task's job.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ContainerState;

use super::state::StateMatcher;
use super::target::Target;

/// What the watch task should tell consumers about one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Added(Target),
    Removed(Target),
}

/// Names of pods with at least one container announced as added
///
/// Ordered list rather than a set: a pod announced twice is recorded twice,
/// and a removal drops only the first occurrence.
#[derive(Debug, Default)]
pub struct ActivePods {
    names: Vec<String>,
}

impl ActivePods {
    pub fn push(&mut self, pod: &str) {
        self.names.push(pod.to_string());
    }

    pub fn contains(&self, pod: &str) -> bool {
        position(&self.names, pod).is_some()
    }

    /// Remove the first occurrence of `pod`, returning whether one was found
    pub fn remove_first(&mut self, pod: &str) -> bool {
        match position(&self.names, pod) {
            Some(index) => {
                self.names.remove(index);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn count(&self, pod: &str) -> usize {
        self.names.iter().filter(|n| *n == pod).count()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn position(names: &[String], pod: &str) -> Option<usize> {
    names.iter().position(|n| n == pod)
}

/// Registry plus the state classifier it is driven by
pub struct Tracker {
    active: ActivePods,
    states: Arc<dyn StateMatcher>,
}

impl Tracker {
    pub fn new(states: Arc<dyn StateMatcher>) -> Self {
        Self {
            active: ActivePods::default(),
            states,
        }
    }

    pub fn active(&self) -> &ActivePods {
        &self.active
    }

    /// A container reported by an Added or Modified event
    pub fn observe(
        &mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        state: Option<&ContainerState>,
    ) -> Option<Transition> {
        let target = Target::new(namespace, pod, container);

        if self.states.matches(state) {
            self.active.push(pod);
            return Some(Transition::Added(target));
        }

        if self.states.has_wildcard() {
            if self.active.contains(pod) {
                return None;
            }
            self.active.push(pod);
            return Some(Transition::Added(target));
        }

        // Stop this container even when another one already unregistered the pod
        self.active.remove_first(pod);
        Some(Transition::Removed(target))
    }

    /// A container declared by a pod that was deleted
    pub fn deleted(&mut self, namespace: &str, pod: &str, container: &str) -> Transition {
        self.active.remove_first(pod);
        Transition::Removed(Target::new(namespace, pod, container))
    }
}
