// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8stail
//!
//! Stores default target selection options in a config file.
//! All k8stail data is stored under ~/.k8stail/:
//! - ~/.k8stail/config.json - user configuration
//! - ~/.k8stail/log/ - log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the base k8stail directory (~/.k8stail/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8stail"))
        .context("Could not determine home directory")
}

fn default_container_states() -> Vec<String> {
    vec!["running".to_string()]
}

fn default_init_containers() -> bool {
    true
}

/// k8stail configuration
///
/// Command line flags take precedence over every value here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Container states to tail (running, waiting, terminated, all)
    #[serde(default = "default_container_states")]
    pub container_states: Vec<String>,
    /// Container name regex to always exclude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_container: Option<String>,
    /// Whether init containers are considered
    #[serde(default = "default_init_containers")]
    pub init_containers: bool,
    /// Label selector applied when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            container_states: default_container_states(),
            exclude_container: None,
            init_containers: default_init_containers(),
            label_selector: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8stail/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }
}
