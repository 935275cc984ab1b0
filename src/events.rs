//! Ingestion event fan-out.
//!
//! Every successful ingestion (Drive sync, push ingest, chat relay) emits a
//! small event so dashboards can refresh without polling. Events are
//! fire-and-forget: with no subscribers they are dropped, and a slow
//! subscriber loses oldest-first.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Which connector produced new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Drive,
    Repo,
    Telegram,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceEvent {
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SourceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, source: EventSource, tenant_id: Option<&str>) {
        let event = SourceEvent {
            source,
            tenant_id: tenant_id.map(|t| t.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        // send() only fails when nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(EventSource::Drive, Some("acme"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, EventSource::Drive);
        assert_eq!(event.tenant_id.as_deref(), Some("acme"));
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(EventSource::Telegram, None);
    }
}
