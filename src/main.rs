// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Args, Scope, WatchOptions};
use k8stail::config::{self, Config};
use k8stail::kubernetes::{self, PodApiSource};
use k8stail::watch::{PodWatcher, TargetSet, TargetStreams};

const LOG_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILES_KEPT: usize = 5;

fn open_log_file() -> Result<RollingFileAppenderBase> {
    let dir = config::base_dir()?.join("log");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let rotation = RollingConditionBase::new()
        .daily()
        .max_size(LOG_FILE_MAX_BYTES);
    RollingFileAppenderBase::new(dir.join("k8stail.log"), rotation, LOG_FILES_KEPT)
        .context("Failed to open log file")
}

/// Send logs to the rolling file, and to stderr as well when verbose
///
/// stdout is left to the target lines.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "k8stail=debug" } else { "k8stail=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match open_log_file() {
        Ok(appender) => Some(
            fmt::layer()
                .with_writer(Mutex::new(appender))
                .with_ansi(false),
        ),
        Err(e) => {
            eprintln!("Warning: logging to file disabled: {e:#}");
            None
        }
    };
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::load()?;
    let options = WatchOptions::resolve(&args, &config)?;

    if args.save_config {
        options.to_config().save()?;
        info!(path = %Config::config_path()?.display(), "Saved defaults");
    }

    let conn = kubernetes::connect(args.context.as_deref()).await?;
    let source = match &options.scope {
        Scope::AllNamespaces => {
            info!(context = %conn.context, "Watching pods in all namespaces");
            PodApiSource::all(conn.client)
        }
        Scope::Namespace(ns) => {
            let namespace = ns.as_deref().unwrap_or(&conn.namespace);
            info!(context = %conn.context, namespace = %namespace, "Watching pods");
            PodApiSource::namespaced(conn.client, namespace)
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let streams = PodWatcher::new(
        source,
        options.filter,
        Arc::new(options.states),
        options.label_selector,
    )
    .start(cancel)
    .await?;

    report_targets(streams).await
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Interrupted, stopping watch");
    cancel.cancel();
}

/// Print each target once when it becomes active and once when it stops
async fn report_targets(streams: TargetStreams) -> Result<()> {
    let TargetStreams {
        mut added,
        mut removed,
        task,
    } = streams;

    let mut active = TargetSet::new();
    let mut added_open = true;
    let mut removed_open = true;

    while added_open || removed_open {
        tokio::select! {
            target = added.recv(), if added_open => match target {
                Some(target) => {
                    if active.insert(target.clone()) {
                        println!("+ {}", target);
                    }
                }
                None => added_open = false,
            },
            target = removed.recv(), if removed_open => match target {
                Some(target) => {
                    if active.remove(&target).is_some() {
                        println!("- {}", target);
                    }
                }
                None => removed_open = false,
            },
        }
    }

    task.await?;
    info!(active = active.len(), "Pod watch finished");
    Ok(())
}
