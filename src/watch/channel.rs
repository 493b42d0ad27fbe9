// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Rendezvous channel for targets
//!
//! Each target travels with an acknowledgment that fires when the consumer
//! receives it, so a send only completes once the target has been taken.

use tokio::sync::{mpsc, oneshot};

use super::target::Target;

type Delivery = (Target, oneshot::Sender<()>);

/// The receiving side went away before taking the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

pub fn channel() -> (TargetSender, TargetReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TargetSender { tx }, TargetReceiver { rx })
}

pub struct TargetSender {
    tx: mpsc::Sender<Delivery>,
}

impl TargetSender {
    /// Send a target and wait until the consumer has received it
    pub async fn send(&self, target: Target) -> Result<(), Closed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx.send((target, ack_tx)).await.map_err(|_| Closed)?;
        // A receiver dropped with the target still queued drops the ack too
        ack_rx.await.map_err(|_| Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Stream of targets from a watch session
pub struct TargetReceiver {
    rx: mpsc::Receiver<Delivery>,
}

impl TargetReceiver {
    /// Next target, or `None` once the session has ended
    ///
    /// Cancel safe: a target is only taken off the channel when this returns.
    pub async fn recv(&mut self) -> Option<Target> {
        let (target, ack) = self.rx.recv().await?;
        let _ = ack.send(());
        Some(target)
    }

    /// Take a target that is already waiting, without blocking
    pub fn try_recv(&mut self) -> Option<Target> {
        let (target, ack) = self.rx.try_recv().ok()?;
        let _ = ack.send(());
        Some(target)
    }
}
