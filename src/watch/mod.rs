// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Pod watch session
//!
//! Turns a raw stream of pod watch events into two streams of [`Target`]s:
//! containers that should start being tailed and containers that should stop.
//!
//! A session owns the raw subscription and a [`Tracker`] inside a single
//! spawned task. Events are handled strictly in arrival order, and every
//! notification waits until the consumer has received it before the next one
//! is evaluated, so only one target is ever in flight across both streams.
//! Cancelling the session token, or the upstream stream ending, drops the
//! subscription and closes both output streams.

mod channel;
mod filter;
mod state;
mod target;
mod tracker;

pub use channel::{Closed, TargetReceiver, TargetSender};
pub use filter::NameFilter;
pub use state::{ContainerStateFilter, StateFilterError, StateKind, StateMatcher};
pub use target::{Target, TargetSet};
pub use tracker::{ActivePods, Tracker, Transition};

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Pod;
use kube::api::WatchEvent;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Raw pod events as delivered by the API server
pub type PodEventStream = BoxStream<'static, anyhow::Result<WatchEvent<Pod>>>;

/// Something that can open a pod watch
///
/// Dropping the returned stream releases the subscription.
#[async_trait]
pub trait PodEventSource: Send + Sync {
    async fn subscribe(&self, label_selector: &str) -> anyhow::Result<PodEventStream>;
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to set up watch (selector '{selector}'): {source}")]
    Setup {
        selector: String,
        source: anyhow::Error,
    },
}

/// Output side of a running session
pub struct TargetStreams {
    /// Containers to start tailing
    pub added: TargetReceiver,
    /// Containers to stop tailing
    pub removed: TargetReceiver,
    /// The processing task; finishes once both streams are closed
    pub task: JoinHandle<()>,
}

/// Watch configuration for one session
pub struct PodWatcher<S> {
    source: S,
    filter: NameFilter,
    states: Arc<dyn StateMatcher>,
    label_selector: String,
}

impl<S: PodEventSource> PodWatcher<S> {
    pub fn new(
        source: S,
        filter: NameFilter,
        states: Arc<dyn StateMatcher>,
        label_selector: impl Into<String>,
    ) -> Self {
        Self {
            source,
            filter,
            states,
            label_selector: label_selector.into(),
        }
    }

    /// Open the watch and start processing events in the background
    ///
    /// Only the subscription itself can fail. After that, every way the
    /// session can end shows up as both streams closing.
    pub async fn start(self, cancel: CancellationToken) -> Result<TargetStreams, WatchError> {
        let stream = self
            .source
            .subscribe(&self.label_selector)
            .await
            .map_err(|source| WatchError::Setup {
                selector: self.label_selector.clone(),
                source,
            })?;

        let (added_tx, added_rx) = channel::channel();
        let (removed_tx, removed_rx) = channel::channel();

        info!(
            selector = %self.label_selector,
            pod_query = %self.filter.pod,
            container_query = %self.filter.container,
            init_containers = self.filter.init_containers,
            "Pod watch started"
        );

        let session = Session {
            stream,
            filter: self.filter,
            tracker: Tracker::new(self.states),
            added: added_tx,
            removed: removed_tx,
            cancel,
        };
        let task = tokio::spawn(session.run());

        Ok(TargetStreams {
            added: added_rx,
            removed: removed_rx,
            task,
        })
    }
}

struct Session {
    stream: PodEventStream,
    filter: NameFilter,
    tracker: Tracker,
    added: TargetSender,
    removed: TargetSender,
    cancel: CancellationToken,
}

impl Session {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Pod watch cancelled");
                    break;
                }
                next = self.stream.next() => next,
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(error = %e, "Pod watch stream failed, closing");
                    break;
                }
                None => {
                    debug!("Pod watch stream closed by upstream");
                    break;
                }
            };

            if self.handle(event).await.is_break() {
                break;
            }
        }

        debug!(active_pods = self.tracker.active().len(), "Pod watch stopped");
        // Dropping self releases the subscription and closes both outputs
    }

    async fn handle(&mut self, event: WatchEvent<Pod>) -> ControlFlow<()> {
        let (pod, deleted) = match event {
            WatchEvent::Added(pod) | WatchEvent::Modified(pod) => (pod, false),
            WatchEvent::Deleted(pod) => (pod, true),
            WatchEvent::Error(err) => {
                warn!(error = ?err, "Pod watch reported an error, closing");
                return ControlFlow::Break(());
            }
            WatchEvent::Bookmark(_) => {
                trace!("Skipping bookmark");
                return ControlFlow::Continue(());
            }
        };

        let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        let name = pod.metadata.name.as_deref().unwrap_or_default();

        if !self.filter.pod_matches(name) {
            trace!(namespace = %namespace, pod = %name, "Pod does not match query");
            return ControlFlow::Continue(());
        }

        if deleted {
            for container in self.filter.spec_candidates(&pod) {
                let transition = self.tracker.deleted(namespace, name, container);
                if self.emit(transition).await.is_break() {
                    return ControlFlow::Break(());
                }
            }
        } else {
            for (container, state) in self.filter.status_candidates(&pod) {
                let Some(transition) = self.tracker.observe(namespace, name, container, state)
                else {
                    continue;
                };
                if self.emit(transition).await.is_break() {
                    return ControlFlow::Break(());
                }
            }
        }

        ControlFlow::Continue(())
    }

    /// Wait until the consumer takes the target, or the session is cancelled
    async fn emit(&mut self, transition: Transition) -> ControlFlow<()> {
        let (tx, target, kind) = match transition {
            Transition::Added(t) => (&self.added, t, "added"),
            Transition::Removed(t) => (&self.removed, t, "removed"),
        };
        debug!(id = %target.id(), kind, "Target");

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("Pod watch cancelled while emitting");
                ControlFlow::Break(())
            }
            sent = tx.send(target) => {
                if sent.is_err() {
                    if self.added.is_closed() && self.removed.is_closed() {
                        debug!("All target consumers gone");
                        return ControlFlow::Break(());
                    }
                    trace!(kind, "Consumer gone, dropping target");
                }
                ControlFlow::Continue(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use futures::channel::mpsc::{UnboundedSender, unbounded};
    use k8s_openapi::api::core::v1::{
        Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
        ContainerStateWaiting, ContainerStatus, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::TypeMeta;
    use kube::core::watch::{Bookmark, BookmarkMeta};
    use regex::Regex;
    use std::sync::Mutex;
    use std::time::Duration;

    type EventTx = UnboundedSender<anyhow::Result<WatchEvent<Pod>>>;

    /// Event source fed by the test through a channel
    struct ChannelSource {
        stream: Mutex<Option<PodEventStream>>,
        selector: Arc<Mutex<Option<String>>>,
    }

    fn channel_source() -> (EventTx, ChannelSource, Arc<Mutex<Option<String>>>) {
        let (tx, rx) = unbounded();
        let selector = Arc::new(Mutex::new(None));
        let source = ChannelSource {
            stream: Mutex::new(Some(rx.boxed())),
            selector: Arc::clone(&selector),
        };
        (tx, source, selector)
    }

    #[async_trait]
    impl PodEventSource for ChannelSource {
        async fn subscribe(&self, label_selector: &str) -> anyhow::Result<PodEventStream> {
            *self.selector.lock().unwrap() = Some(label_selector.to_string());
            self.stream
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow!("already subscribed"))
        }
    }

    struct ForbiddenSource;

    #[async_trait]
    impl PodEventSource for ForbiddenSource {
        async fn subscribe(&self, _label_selector: &str) -> anyhow::Result<PodEventStream> {
            Err(anyhow!("pods is forbidden: User \"dev\" cannot watch resource \"pods\""))
        }
    }

    fn running() -> ContainerState {
        ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        }
    }

    fn pending() -> ContainerState {
        ContainerState {
            waiting: Some(ContainerStateWaiting::default()),
            ..Default::default()
        }
    }

    fn terminated() -> ContainerState {
        ContainerState {
            terminated: Some(ContainerStateTerminated::default()),
            ..Default::default()
        }
    }

    fn pod(name: &str, containers: &[(&str, ContainerState)]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|(n, _)| Container {
                        name: n.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            status: Some(PodStatus {
                container_statuses: Some(
                    containers
                        .iter()
                        .map(|(n, s)| ContainerStatus {
                            name: n.to_string(),
                            state: Some(s.clone()),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
        }
    }

    fn states(names: &[&str]) -> Arc<dyn StateMatcher> {
        Arc::new(ContainerStateFilter::parse(names).unwrap())
    }

    async fn start(
        source: ChannelSource,
        filter: NameFilter,
        state_names: &[&str],
    ) -> (TargetStreams, CancellationToken) {
        let cancel = CancellationToken::new();
        let streams = PodWatcher::new(source, filter, states(state_names), "app=web")
            .start(cancel.clone())
            .await
            .unwrap();
        (streams, cancel)
    }

    async fn recv(rx: &mut TargetReceiver) -> Option<Target> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for target")
    }

    fn send(tx: &EventTx, event: WatchEvent<Pod>) {
        tx.unbounded_send(Ok(event)).unwrap();
    }

    fn target(pod: &str, container: &str) -> Target {
        Target::new("ns", pod, container)
    }

    /// Session driven event by event, with its registry visible to the test
    struct Stepper {
        session: Session,
        added: TargetReceiver,
        removed: TargetReceiver,
    }

    impl Stepper {
        fn new(state_names: &[&str]) -> Self {
            let (added_tx, added) = channel::channel();
            let (removed_tx, removed) = channel::channel();
            let session = Session {
                stream: futures::stream::empty().boxed(),
                filter: NameFilter::match_all(),
                tracker: Tracker::new(states(state_names)),
                added: added_tx,
                removed: removed_tx,
                cancel: CancellationToken::new(),
            };
            Self {
                session,
                added,
                removed,
            }
        }

        /// Handle one event and collect everything it emitted, in order
        async fn step(&mut self, event: WatchEvent<Pod>) -> Vec<Transition> {
            let Self {
                session,
                added,
                removed,
            } = self;
            let handled = session.handle(event);
            tokio::pin!(handled);

            let mut seen = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    Some(t) = added.recv() => seen.push(Transition::Added(t)),
                    Some(t) = removed.recv() => seen.push(Transition::Removed(t)),
                    flow = &mut handled => {
                        assert!(flow.is_continue());
                        break;
                    }
                }
            }
            seen
        }

        fn registered(&self, pod: &str) -> usize {
            self.session.tracker.active().count(pod)
        }
    }

    #[tokio::test]
    async fn test_setup_failure_is_reported() {
        let watcher = PodWatcher::new(
            ForbiddenSource,
            NameFilter::match_all(),
            states(&["running"]),
            "app=web",
        );
        let err = watcher
            .start(CancellationToken::new())
            .await
            .err()
            .expect("start should fail");

        let msg = err.to_string();
        assert!(msg.contains("failed to set up watch"));
        assert!(msg.contains("app=web"));
        assert!(msg.contains("forbidden"));
    }

    #[tokio::test]
    async fn test_label_selector_passed_to_source() {
        let (_tx, source, selector) = channel_source();
        let (_streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;
        assert_eq!(selector.lock().unwrap().as_deref(), Some("app=web"));
    }

    #[tokio::test]
    async fn test_pending_running_terminated() {
        let mut s = Stepper::new(&["running"]);

        let seen = s.step(WatchEvent::Added(pod("p1", &[("c1", pending())]))).await;
        assert_eq!(seen, vec![Transition::Removed(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 0);

        let seen = s.step(WatchEvent::Modified(pod("p1", &[("c1", running())]))).await;
        assert_eq!(seen, vec![Transition::Added(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 1);

        let seen = s.step(WatchEvent::Modified(pod("p1", &[("c1", terminated())]))).await;
        assert_eq!(seen, vec![Transition::Removed(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 0);
    }

    #[tokio::test]
    async fn test_wildcard_pending_announced_once() {
        let mut s = Stepper::new(&["running", "all"]);

        let seen = s.step(WatchEvent::Added(pod("p1", &[("c1", pending())]))).await;
        assert_eq!(seen, vec![Transition::Added(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 1);

        let seen = s.step(WatchEvent::Modified(pod("p1", &[("c1", pending())]))).await;
        assert!(seen.is_empty());
        assert_eq!(s.registered("p1"), 1);
    }

    #[tokio::test]
    async fn test_stopped_container_removed_while_sibling_waits() {
        let mut s = Stepper::new(&["running"]);

        let seen = s
            .step(WatchEvent::Added(pod("p1", &[("c1", running()), ("c2", pending())])))
            .await;
        assert_eq!(
            seen,
            vec![
                Transition::Added(target("p1", "c1")),
                Transition::Removed(target("p1", "c2")),
            ]
        );

        // The waiting sibling already took p1 out of the registry
        let seen = s
            .step(WatchEvent::Modified(pod("p1", &[("c1", terminated()), ("c2", pending())])))
            .await;
        assert_eq!(
            seen,
            vec![
                Transition::Removed(target("p1", "c1")),
                Transition::Removed(target("p1", "c2")),
            ]
        );
        assert_eq!(s.registered("p1"), 0);
    }

    #[tokio::test]
    async fn test_deleted_with_duplicate_registrations() {
        let mut s = Stepper::new(&["running"]);

        s.step(WatchEvent::Added(pod("p1", &[("c1", running())]))).await;
        s.step(WatchEvent::Modified(pod("p1", &[("c1", running())]))).await;
        assert_eq!(s.registered("p1"), 2);

        let seen = s.step(WatchEvent::Deleted(pod("p1", &[("c1", running())]))).await;
        assert_eq!(seen, vec![Transition::Removed(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 1);

        let seen = s.step(WatchEvent::Deleted(pod("p1", &[("c1", running())]))).await;
        assert_eq!(seen, vec![Transition::Removed(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 0);

        // Deleting an unknown pod still tells the consumer to stop
        let seen = s.step(WatchEvent::Deleted(pod("p1", &[("c1", running())]))).await;
        assert_eq!(seen, vec![Transition::Removed(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 0);
    }

    #[tokio::test]
    async fn test_wildcard_reannounces_after_delete() {
        let mut s = Stepper::new(&["running", "all"]);

        s.step(WatchEvent::Added(pod("p1", &[("c1", running())]))).await;
        s.step(WatchEvent::Modified(pod("p1", &[("c1", running())]))).await;
        assert_eq!(s.registered("p1"), 2);

        s.step(WatchEvent::Deleted(pod("p1", &[("c1", running())]))).await;
        let seen = s.step(WatchEvent::Modified(pod("p1", &[("c1", pending())]))).await;
        assert!(seen.is_empty());

        s.step(WatchEvent::Deleted(pod("p1", &[("c1", running())]))).await;
        let seen = s.step(WatchEvent::Modified(pod("p1", &[("c1", pending())]))).await;
        assert_eq!(seen, vec![Transition::Added(target("p1", "c1"))]);
        assert_eq!(s.registered("p1"), 1);
    }

    #[tokio::test]
    async fn test_next_event_waits_for_consumer() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        send(&tx, WatchEvent::Added(pod("p1", &[("c1", running())])));
        send(&tx, WatchEvent::Modified(pod("p1", &[("c1", terminated())])));

        // Nobody has taken the added target, so the second event is not handled yet
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(streams.removed.try_recv(), None);

        assert_eq!(recv(&mut streams.added).await, Some(target("p1", "c1")));
        assert_eq!(recv(&mut streams.removed).await, Some(target("p1", "c1")));
    }

    #[tokio::test]
    async fn test_bookmark_is_skipped() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        send(
            &tx,
            WatchEvent::Bookmark(Bookmark {
                types: TypeMeta::default(),
                metadata: BookmarkMeta {
                    resource_version: String::new(),
                    annotations: Default::default(),
                },
            }),
        );
        send(&tx, WatchEvent::Added(pod("p1", &[("c1", running())])));

        assert_eq!(recv(&mut streams.added).await, Some(target("p1", "c1")));
        assert!(!streams.task.is_finished());
    }

    #[tokio::test]
    async fn test_wildcard_announces_pod_once() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["all"]).await;

        send(&tx, WatchEvent::Added(pod("p1", &[("c1", pending())])));
        assert_eq!(recv(&mut streams.added).await, Some(target("p1", "c1")));

        send(&tx, WatchEvent::Modified(pod("p1", &[("c1", pending())])));
        // Deletion acts as a marker that the modification was fully processed
        send(&tx, WatchEvent::Deleted(pod("p1", &[("c1", pending())])));
        assert_eq!(recv(&mut streams.removed).await, Some(target("p1", "c1")));
        assert_eq!(streams.added.try_recv(), None);
    }

    #[tokio::test]
    async fn test_deleted_removes_every_container() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        let mut deleted = pod("p1", &[("app", running()), ("sidecar", pending())]);
        if let Some(spec) = deleted.spec.as_mut() {
            spec.init_containers = Some(vec![Container {
                name: "migrate".to_string(),
                ..Default::default()
            }]);
        }
        send(&tx, WatchEvent::Deleted(deleted));

        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(recv(&mut streams.removed).await.unwrap().container);
        }
        assert_eq!(names, vec!["app", "sidecar", "migrate"]);
        assert_eq!(streams.added.try_recv(), None);
    }

    #[tokio::test]
    async fn test_init_container_statuses() {
        let (tx, source, _) = channel_source();
        let filter = NameFilter {
            init_containers: false,
            ..NameFilter::match_all()
        };
        let (mut streams, _cancel) = start(source, filter, &["running"]).await;

        let mut p = pod("p1", &[("app", running())]);
        if let Some(status) = p.status.as_mut() {
            status.init_container_statuses = Some(vec![ContainerStatus {
                name: "migrate".to_string(),
                state: Some(running()),
                ..Default::default()
            }]);
        }
        send(&tx, WatchEvent::Added(p));

        assert_eq!(recv(&mut streams.added).await.unwrap().container, "app");
        send(&tx, WatchEvent::Deleted(pod("p1", &[("app", running())])));
        assert_eq!(recv(&mut streams.removed).await.unwrap().container, "app");
        assert_eq!(streams.added.try_recv(), None);
    }

    #[tokio::test]
    async fn test_exclude_pattern_suppresses_container() {
        let (tx, source, _) = channel_source();
        let filter = NameFilter {
            container: Regex::new("app|istio-proxy").unwrap(),
            exclude_container: Some(Regex::new("istio").unwrap()),
            ..NameFilter::match_all()
        };
        let (mut streams, _cancel) = start(source, filter, &["running"]).await;

        send(
            &tx,
            WatchEvent::Added(pod("p1", &[("istio-proxy", running()), ("app", running())])),
        );
        assert_eq!(recv(&mut streams.added).await.unwrap().container, "app");

        send(&tx, WatchEvent::Deleted(pod("p1", &[("istio-proxy", running())])));
        send(&tx, WatchEvent::Deleted(pod("p1", &[("app", running())])));
        assert_eq!(recv(&mut streams.removed).await.unwrap().container, "app");
        assert_eq!(streams.added.try_recv(), None);
    }

    #[tokio::test]
    async fn test_pod_query_skips_other_pods() {
        let (tx, source, _) = channel_source();
        let filter = NameFilter {
            pod: Regex::new("^web-").unwrap(),
            ..NameFilter::match_all()
        };
        let (mut streams, _cancel) = start(source, filter, &["running"]).await;

        send(&tx, WatchEvent::Added(pod("db-0", &[("postgres", running())])));
        send(&tx, WatchEvent::Added(pod("web-0", &[("nginx", running())])));

        assert_eq!(recv(&mut streams.added).await, Some(target("web-0", "nginx")));
    }

    #[tokio::test]
    async fn test_upstream_close_ends_session() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        drop(tx);

        assert_eq!(recv(&mut streams.added).await, None);
        assert_eq!(recv(&mut streams.removed).await, None);
        streams.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_error_ends_session() {
        let (tx, source, _) = channel_source();
        let (mut streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        tx.unbounded_send(Err(anyhow!("connection reset"))).unwrap();
        send(&tx, WatchEvent::Added(pod("p1", &[("c1", running())])));

        assert_eq!(recv(&mut streams.added).await, None);
        assert_eq!(recv(&mut streams.removed).await, None);
        // Subscription was released
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_cancel_closes_streams_and_releases_watch() {
        let (tx, source, _) = channel_source();
        let (mut streams, cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        send(&tx, WatchEvent::Added(pod("p1", &[("c1", running())])));
        assert_eq!(recv(&mut streams.added).await, Some(target("p1", "c1")));

        cancel.cancel();
        streams.task.await.unwrap();

        assert!(tx.is_closed());
        assert_eq!(recv(&mut streams.added).await, None);
        assert_eq!(recv(&mut streams.removed).await, None);
    }

    #[tokio::test]
    async fn test_cancel_while_consumer_is_stalled() {
        let (tx, source, _) = channel_source();
        let (mut streams, cancel) = start(source, NameFilter::match_all(), &["running"]).await;

        // Three containers but nobody reading: the task waits on the first send
        send(
            &tx,
            WatchEvent::Added(pod("p1", &[("c1", running()), ("c2", running()), ("c3", running())])),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!streams.task.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), &mut streams.task)
            .await
            .expect("task did not stop")
            .unwrap();

        // The target handed over before cancellation is still readable, nothing after it
        assert_eq!(recv(&mut streams.added).await.unwrap().container, "c1");
        assert_eq!(recv(&mut streams.added).await, None);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_consumers_end_session() {
        let (tx, source, _) = channel_source();
        let (streams, _cancel) = start(source, NameFilter::match_all(), &["running"]).await;
        let TargetStreams {
            added,
            removed,
            task,
        } = streams;
        drop(added);
        drop(removed);

        send(&tx, WatchEvent::Added(pod("p1", &[("c1", running())])));
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("task did not stop")
            .unwrap();
        assert!(tx.is_closed());
    }
}
