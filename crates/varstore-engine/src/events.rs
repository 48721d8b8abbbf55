//! Run state-change notifications.
//!
//! Emits [`RunEvent`]s via a [`tokio::sync::broadcast`] channel so observers
//! can follow condition transitions without coupling to the reconciler.

use serde::{Deserialize, Serialize};
use varstore_types::Condition;

/// A condition transition on one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// `namespace/name` of the run.
    pub run: String,
    pub before: Option<Condition>,
    pub after: Option<Condition>,
}

impl RunEvent {
    /// True when the condition status or reason differs between before and after.
    pub fn is_transition(&self) -> bool {
        let key = |c: &Option<Condition>| c.as_ref().map(|c| (c.status, c.reason.clone()));
        key(&self.before) != key(&self.after)
    }
}

#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to all current subscribers. Dropped when nobody listens.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
