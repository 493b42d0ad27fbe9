// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Name filters for pods and containers

use k8s_openapi::api::core::v1::{ContainerState, Pod};
use regex::Regex;

/// Pod and container name patterns applied to every watch event
#[derive(Debug, Clone)]
pub struct NameFilter {
    pub pod: Regex,
    pub container: Regex,
    /// Wins over `container` when both match
    pub exclude_container: Option<Regex>,
    /// Also consider init containers
    pub init_containers: bool,
}

impl NameFilter {
    /// Filter that lets every pod and container through, init containers included
    pub fn match_all() -> Self {
        Self {
            pod: Regex::new(".*").expect("static regex"),
            container: Regex::new(".*").expect("static regex"),
            exclude_container: None,
            init_containers: true,
        }
    }

    pub fn pod_matches(&self, name: &str) -> bool {
        self.pod.is_match(name)
    }

    pub fn container_matches(&self, name: &str) -> bool {
        if !self.container.is_match(name) {
            return false;
        }
        match &self.exclude_container {
            Some(exclude) => !exclude.is_match(name),
            None => true,
        }
    }

    /// Containers with a runtime status, init containers appended when enabled
    pub fn status_candidates<'a>(&self, pod: &'a Pod) -> Vec<(&'a str, Option<&'a ContainerState>)> {
        let Some(status) = pod.status.as_ref() else {
            return Vec::new();
        };

        let mut statuses: Vec<_> = status.container_statuses.iter().flatten().collect();
        if self.init_containers {
            statuses.extend(status.init_container_statuses.iter().flatten());
        }

        statuses
            .into_iter()
            .filter(|s| self.container_matches(&s.name))
            .map(|s| (s.name.as_str(), s.state.as_ref()))
            .collect()
    }

    /// Containers declared in the pod spec, init containers appended when enabled
    pub fn spec_candidates<'a>(&self, pod: &'a Pod) -> Vec<&'a str> {
        let Some(spec) = pod.spec.as_ref() else {
            return Vec::new();
        };

        let mut names: Vec<&str> = spec.containers.iter().map(|c| c.name.as_str()).collect();
        if self.init_containers {
            names.extend(spec.init_containers.iter().flatten().map(|c| c.name.as_str()));
        }

        names
            .into_iter()
            .filter(|n| self.container_matches(n))
            .collect()
    }
}
