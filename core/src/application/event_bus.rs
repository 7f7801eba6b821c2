// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-process publish/subscribe for [`DomainEvent`] (spec §2, §4.7), built on
//! a `tokio::sync::broadcast` channel the same way the wider service layer
//! fans out internal notifications.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::events::DomainEvent;

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("receiver lagged, {0} events dropped")]
    Lagged(u64),
    #[error("event bus closed")]
    Closed,
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver { inner: self.sender.subscribe() }
    }

    /// Best-effort publish: no receivers is not an error, matching a
    /// fire-and-forget in-process notification bus.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    pub fn publish_note_updated(&self, user_id: i64, file_id: i64, file_path: String) {
        self.publish(DomainEvent::NoteUpdated { user_id, file_id, file_path });
    }

    pub fn publish_note_deleted(&self, user_id: i64, file_id: i64) {
        self.publish(DomainEvent::NoteDeleted { user_id, file_id });
    }
}

pub struct EventReceiver {
    inner: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        match self.inner.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(EventBusError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(EventBusError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_to_subscriber() {
        let bus = EventBus::with_default_capacity();
        let mut rx = bus.subscribe();
        bus.publish_note_updated(1, 2, "/Note/foo.note".to_string());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.file_id(), 2);
    }

    #[tokio::test]
    async fn lagging_receiver_reports_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish_note_updated(1, i, "/x".to_string());
        }
        let result = rx.recv().await;
        assert!(matches!(result, Err(EventBusError::Lagged(_))));
    }
}
