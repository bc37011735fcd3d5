//! Live learning feed.
//!
//! [`EventHub`] fans out [`LearningEvent`]s to every subscriber. Sending with
//! no subscribers is not an error; slow subscribers that lag behind the
//! channel capacity skip the missed events.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::store::Pattern;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LearningEvent {
    Connected,
    NewPattern { pattern: Pattern },
    PatternDeleted { id: i64 },
}

impl LearningEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<LearningEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: LearningEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(receivers, "learning event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LearningEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
