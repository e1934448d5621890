//! livefeed transport: push-notification channels delivering live ledger events.
//!
//! A page subscribes to a topic and receives ordered [`ChannelEvent`]s. [`LocalHub`]
//! is the in-process implementation used by the CLI and tests; [`script`] reads
//! recorded sessions for replay.

#![forbid(unsafe_code)]

use std::sync::Mutex;

use livefeed_core::LedgerMessage;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub mod script;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel closed: {0}")]
    Closed(String),
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// One event on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A pushed message; `payload` is an object or an array of objects in wire casing.
    Message { event: String, payload: serde_json::Value },
    /// The channel failed. Subscribers treat this as terminal.
    Error { reason: String },
}

impl ChannelEvent {
    /// Decode the payload of a `Message` into ledger messages.
    pub fn messages(&self) -> Vec<LedgerMessage> {
        match self {
            ChannelEvent::Message { payload, .. } => decode_payload(payload),
            ChannelEvent::Error { .. } => Vec::new(),
        }
    }
}

/// Decode a pushed payload (one object or an array of objects). Entries that are
/// not objects are logged and skipped.
pub fn decode_payload(payload: &serde_json::Value) -> Vec<LedgerMessage> {
    let values: Vec<&serde_json::Value> = match payload {
        serde_json::Value::Array(arr) => arr.iter().collect(),
        other => vec![other],
    };
    values
        .into_iter()
        .filter_map(|v| match LedgerMessage::from_value(v.clone()) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "dropping undecodable message");
                None
            }
        })
        .collect()
}

/// Live subscription to one topic. Events arrive in publish order.
pub struct Subscription {
    pub topic: String,
    pub rx: mpsc::Receiver<ChannelEvent>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: mpsc::Receiver<ChannelEvent>) -> Self {
        Self { topic: topic.into(), rx }
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> { self.rx.recv().await }
}

/// Source of topic subscriptions.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription>;
}

/// In-process transport: per-topic list of subscriber queues. Publishing waits for
/// queue space, so a slow subscriber back-pressures the publisher instead of losing events.
pub struct LocalHub {
    topics: Mutex<FxHashMap<String, Vec<mpsc::Sender<ChannelEvent>>>>,
    cap: usize,
}

impl LocalHub {
    pub fn new(cap: usize) -> Self {
        Self { topics: Mutex::new(FxHashMap::default()), cap: cap.max(1) }
    }

    fn senders(&self, topic: &str) -> TransportResult<Vec<mpsc::Sender<ChannelEvent>>> {
        let m = self.topics.lock().map_err(|_| TransportError::Closed(topic.to_string()))?;
        m.get(topic).cloned().ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))
    }

    /// Publish a message; returns how many subscribers received it.
    pub async fn publish(&self, topic: &str, event: &str, payload: serde_json::Value) -> TransportResult<usize> {
        self.send(topic, ChannelEvent::Message { event: event.to_string(), payload }).await
    }

    /// Signal a channel failure to every subscriber of `topic`.
    pub async fn fail(&self, topic: &str, reason: &str) -> TransportResult<usize> {
        info!(topic = %topic, reason = %reason, "transport: failing channel");
        self.send(topic, ChannelEvent::Error { reason: reason.to_string() }).await
    }

    /// Close a topic; subscriptions end once their queues drain.
    pub fn close(&self, topic: &str) {
        if let Ok(mut m) = self.topics.lock() {
            m.remove(topic);
        }
    }

    async fn send(&self, topic: &str, ev: ChannelEvent) -> TransportResult<usize> {
        let senders = self.senders(topic)?;
        let mut delivered = 0usize;
        for tx in &senders {
            if tx.send(ev.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        if delivered < senders.len() {
            debug!(topic = %topic, dropped = senders.len() - delivered, "transport: pruning closed subscribers");
            if let Ok(mut m) = self.topics.lock() {
                if let Some(list) = m.get_mut(topic) {
                    list.retain(|tx| !tx.is_closed());
                }
            }
        }
        if delivered == 0 {
            return Err(TransportError::Closed(topic.to_string()));
        }
        Ok(delivered)
    }
}

impl Default for LocalHub {
    fn default() -> Self { Self::new(1024) }
}

#[async_trait::async_trait]
impl Transport for LocalHub {
    async fn subscribe(&self, topic: &str) -> TransportResult<Subscription> {
        let (tx, rx) = mpsc::channel::<ChannelEvent>(self.cap);
        {
            let mut m = self.topics.lock().map_err(|_| TransportError::Closed(topic.to_string()))?;
            m.entry(topic.to_string()).or_default().push(tx);
        }
        debug!(topic = %topic, "transport: subscribed");
        Ok(Subscription::new(topic, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_array_decodes_each_object() {
        let ev = ChannelEvent::Message {
            event: "fee_payment".into(),
            payload: serde_json::json!([
                { "to_address_hash": "0xA", "fee_payment_html": "<a/>" },
                "not-an-object",
                { "from_address_hash": "0xB" },
            ]),
        };
        let msgs = ev.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].to_address_hash.as_deref(), Some("0xA"));
        assert_eq!(msgs[1].from_address_hash.as_deref(), Some("0xB"));
    }

    #[test]
    fn error_event_has_no_messages() {
        assert!(ChannelEvent::Error { reason: "x".into() }.messages().is_empty());
    }

    #[tokio::test]
    async fn publish_to_unknown_topic_fails() {
        let hub = LocalHub::new(8);
        assert!(matches!(
            hub.publish("nope", "fee_payment", serde_json::json!({})).await,
            Err(TransportError::UnknownTopic(_))
        ));
    }

    #[tokio::test]
    async fn subscriber_receives_in_publish_order() {
        let hub = LocalHub::new(8);
        let mut sub = hub.subscribe("addresses:0xA").await.unwrap();
        hub.publish("addresses:0xA", "fee_payment", serde_json::json!({ "n": 1 })).await.unwrap();
        hub.publish("addresses:0xA", "fee_payment", serde_json::json!({ "n": 2 })).await.unwrap();
        hub.fail("addresses:0xA", "socket closed").await.unwrap();
        let a = sub.recv().await.unwrap();
        let b = sub.recv().await.unwrap();
        let c = sub.recv().await.unwrap();
        assert!(matches!(a, ChannelEvent::Message { ref payload, .. } if payload["n"] == 1));
        assert!(matches!(b, ChannelEvent::Message { ref payload, .. } if payload["n"] == 2));
        assert!(matches!(c, ChannelEvent::Error { .. }));
    }

    #[tokio::test]
    async fn burst_larger_than_queue_is_delivered_in_full() {
        let hub = LocalHub::new(8);
        let mut sub = hub.subscribe("t").await.unwrap();
        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(ev) = sub.recv().await {
                if let ChannelEvent::Message { payload, .. } = ev {
                    seen.push(payload["n"].as_u64().unwrap());
                }
            }
            seen
        });
        for n in 0..50u64 {
            assert_eq!(hub.publish("t", "fee_payment", serde_json::json!({ "n": n })).await.unwrap(), 1);
        }
        hub.close("t");
        let seen = reader.await.unwrap();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let hub = LocalHub::new(2);
        let keep = hub.subscribe("t").await.unwrap();
        let gone = hub.subscribe("t").await.unwrap();
        drop(gone);
        assert_eq!(hub.publish("t", "fee_payment", serde_json::json!({})).await.unwrap(), 1);
        drop(keep);
        assert!(matches!(
            hub.publish("t", "fee_payment", serde_json::json!({})).await,
            Err(TransportError::Closed(_))
        ));
    }
}
