// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Merge command line flags with the config file into watch options

use anyhow::{Context, Result};
use regex::Regex;

use super::args::Args;
use k8stail::config::Config;
use k8stail::watch::{ContainerStateFilter, NameFilter};

/// Which namespaces to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The given namespace, or the context's namespace when `None`
    Namespace(Option<String>),
    AllNamespaces,
}

/// Everything needed to start a pod watch
#[derive(Debug)]
pub struct WatchOptions {
    pub filter: NameFilter,
    pub states: ContainerStateFilter,
    pub label_selector: String,
    pub scope: Scope,
}

impl WatchOptions {
    pub fn resolve(args: &Args, config: &Config) -> Result<Self> {
        let exclude = args
            .exclude_container
            .as_deref()
            .or(config.exclude_container.as_deref());

        let filter = NameFilter {
            pod: compile("pod query", &args.pod_query)?,
            container: compile("--container", &args.container)?,
            exclude_container: exclude
                .map(|e| compile("--exclude-container", e))
                .transpose()?,
            init_containers: args.init_containers.unwrap_or(config.init_containers),
        };

        let state_names = if args.container_state.is_empty() {
            &config.container_states
        } else {
            &args.container_state
        };
        let states = ContainerStateFilter::parse(state_names)
            .context("Invalid --container-state")?;

        let label_selector = args
            .selector
            .clone()
            .or_else(|| config.label_selector.clone())
            .unwrap_or_default();

        let scope = if args.all_namespaces {
            Scope::AllNamespaces
        } else {
            Scope::Namespace(args.namespace.clone())
        };

        Ok(Self {
            filter,
            states,
            label_selector,
            scope,
        })
    }

    /// Config holding these options as defaults
    pub fn to_config(&self) -> Config {
        Config {
            container_states: self.states.kinds().iter().map(|k| k.to_string()).collect(),
            exclude_container: self
                .filter
                .exclude_container
                .as_ref()
                .map(|r| r.as_str().to_string()),
            init_containers: self.filter.init_containers,
            label_selector: Some(self.label_selector.clone()).filter(|s| !s.is_empty()),
        }
    }
}

fn compile(flag: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid regex for {}: '{}'", flag, pattern))
}
