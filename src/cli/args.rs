// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "k8stail")]
#[command(author, version, about = "Report which Kubernetes containers to tail")]
pub struct Args {
    /// Pod name regex
    #[arg(value_name = "POD_QUERY", default_value = ".*")]
    pub pod_query: String,

    /// Container name regex
    #[arg(short, long, default_value = ".*")]
    pub container: String,

    /// Container name regex to exclude (wins over --container)
    #[arg(short = 'E', long, value_name = "REGEX")]
    pub exclude_container: Option<String>,

    /// Container states to tail: running, waiting, terminated, all.
    /// Repeat the flag or separate values with commas.
    #[arg(long, value_delimiter = ',', value_name = "STATE")]
    pub container_state: Vec<String>,

    /// Include init containers (default from config, normally true)
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub init_containers: Option<bool>,

    /// Label selector, e.g. "app=web,tier!=cache"
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Namespace to watch (defaults to the context's namespace)
    #[arg(short, long, conflicts_with = "all_namespaces")]
    pub namespace: Option<String>,

    /// Watch pods in all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Kubernetes context to use
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Store the selection flags as defaults in ~/.k8stail/config.json
    #[arg(long)]
    pub save_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
