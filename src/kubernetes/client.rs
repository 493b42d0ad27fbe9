// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::WatchParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::watch::{PodEventSource, PodEventStream};

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum attempts to open a watch on transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Namespace used when the kubeconfig context doesn't set one
const DEFAULT_NAMESPACE: &str = "default";

/// A client connected to one kubeconfig context
pub struct Connection {
    pub client: Client,
    pub context: String,
    /// Namespace configured on the context
    pub namespace: String,
}

/// Build a client for the given context, or the kubeconfig's current context
pub async fn connect(context: Option<&str>) -> Result<Connection> {
    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;

    let context_name = context
        .map(String::from)
        .or_else(|| kubeconfig.current_context.clone())
        .ok_or_else(|| anyhow!("No context specified and no current context in kubeconfig"))?;

    let namespace = context_namespace(&kubeconfig, &context_name)?;

    let start = std::time::Instant::now();
    let mut config = Config::from_custom_kubeconfig(
        kubeconfig,
        &KubeConfigOptions {
            context: Some(context_name.clone()),
            ..Default::default()
        },
    )
    .await
    .with_context(|| format!("Failed to load kubeconfig for context '{}'", context_name))?;

    // Watches are long-lived, so only bound the connect phase
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = None;

    let client = Client::try_from(config)
        .with_context(|| format!("Failed to create client for context '{}'", context_name))?;

    info!(
        context = %context_name,
        namespace = %namespace,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Connected"
    );

    Ok(Connection {
        client,
        context: context_name,
        namespace,
    })
}

/// Namespace configured for a context, verifying the context exists
fn context_namespace(kubeconfig: &Kubeconfig, context_name: &str) -> Result<String> {
    let named = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .ok_or_else(|| anyhow!("Context '{}' not found in kubeconfig", context_name))?;

    Ok(named
        .context
        .as_ref()
        .and_then(|c| c.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()))
}

/// Pod watches backed by the Kubernetes API
pub struct PodApiSource {
    api: Api<Pod>,
    scope: String,
}

impl PodApiSource {
    /// Watch pods in a single namespace
    pub fn namespaced(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            scope: namespace.to_string(),
        }
    }

    /// Watch pods in every namespace
    pub fn all(client: Client) -> Self {
        Self {
            api: Api::all(client),
            scope: "all-namespaces".to_string(),
        }
    }

    /// Open the watch, retrying transient failures with exponential backoff
    async fn watch_with_retry(&self, params: &WatchParams) -> Result<PodEventStream> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.api.watch(params, "0").await {
                Ok(stream) => return Ok(stream.map_err(anyhow::Error::from).boxed()),
                Err(e) => {
                    if Self::is_retryable_error(&e) {
                        warn!(
                            scope = %self.scope,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            error = %e,
                            "Retryable error"
                        );
                        if let Some(delay) = retry_delay(attempt) {
                            debug!(delay_ms = delay.as_millis(), "Backing off");
                            tokio::time::sleep(delay).await;
                        }
                        last_error = Some(e);
                    } else {
                        debug!(scope = %self.scope, error = %e, "Non-retryable error");
                        return Err(anyhow!("K8s API error: {}", e));
                    }
                }
            }
        }

        Err(anyhow!(
            "Failed after {} retries: {}",
            MAX_RETRIES,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
    }

    /// Check if an error is retryable (transient failures)
    fn is_retryable_error(err: &kube::Error) -> bool {
        match err {
            kube::Error::HyperError(_) => true,
            // 429 (rate limit), 503 (unavailable), 504 (timeout)
            kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
            _ => false,
        }
    }
}

/// Build WatchParams from a label selector; empty selects everything
fn build_watch_params(label_selector: &str) -> WatchParams {
    let params = WatchParams::default();
    if label_selector.is_empty() {
        params
    } else {
        params.labels(label_selector)
    }
}

/// Backoff before the next attempt, or `None` when `attempt` was the last one
fn retry_delay(attempt: u32) -> Option<Duration> {
    (attempt + 1 < MAX_RETRIES).then(|| RETRY_BASE_DELAY * 2u32.pow(attempt))
}

#[async_trait]
impl PodEventSource for PodApiSource {
    async fn subscribe(&self, label_selector: &str) -> Result<PodEventStream> {
        let params = build_watch_params(label_selector);
        debug!(scope = %self.scope, selector = %label_selector, "Opening pod watch");
        self.watch_with_retry(&params).await
    }
}
