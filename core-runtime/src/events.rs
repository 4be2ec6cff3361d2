//! # Event Bus System
//!
//! Provides an in-process publish/subscribe mechanism for typed domain events.
//! This module enables decoupled communication between core modules: the sync
//! and job layers publish events, and any number of live observers (a streaming
//! layer, notification hooks) subscribe to them.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **EventType**: the fixed vocabulary of domain events
//! - **Event**: a typed payload with a creation timestamp
//! - **EventBus**: subscription registry and synchronous fan-out
//!
//! Delivery is best-effort: every handler registered for a type at publish
//! time is invoked, in registration order, on the publisher's thread. There is
//! no persistence or replay; late subscribers miss earlier events.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventType};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//!
//! let sub_id = bus.subscribe(EventType::JobCompleted, |event| {
//!     println!("job done: {}", event.payload["job_id"]);
//!     Ok(())
//! });
//!
//! bus.publish(EventType::JobCompleted, json!({ "job_id": "123" }));
//! bus.unsubscribe(EventType::JobCompleted, sub_id);
//! ```
//!
//! ## Error Handling
//!
//! A handler returning an error is logged at warn level and never propagated
//! to the publisher or to the remaining handlers. The subscriber registry is
//! snapshotted before dispatch, so a handler may subscribe or unsubscribe
//! without invalidating the in-flight fan-out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

// ============================================================================
// Event Types
// ============================================================================

/// The fixed vocabulary of domain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A job row was appended to the ledger.
    #[serde(rename = "job.created")]
    JobCreated,
    /// A worker claimed a job and began executing it.
    #[serde(rename = "job.started")]
    JobStarted,
    /// A job's operation finished successfully.
    #[serde(rename = "job.completed")]
    JobCompleted,
    /// A job's operation raised; the error text is in the payload.
    #[serde(rename = "job.failed")]
    JobFailed,
    /// A full catalog reconciliation finished.
    #[serde(rename = "sync.completed")]
    SyncCompleted,
}

impl EventType {
    /// Get the wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobCreated => "job.created",
            EventType::JobStarted => "job.started",
            EventType::JobCompleted => "job.completed",
            EventType::JobFailed => "job.failed",
            EventType::SyncCompleted => "sync.completed",
        }
    }
}

impl FromStr for EventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job.created" => Ok(EventType::JobCreated),
            "job.started" => Ok(EventType::JobStarted),
            "job.completed" => Ok(EventType::JobCompleted),
            "job.failed" => Ok(EventType::JobFailed),
            "sync.completed" => Ok(EventType::SyncCompleted),
            _ => Err(crate::Error::Internal(format!("Unknown event type: {s}"))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A published event. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The event type this was published under.
    pub event_type: EventType,
    /// Free-form JSON payload.
    pub payload: Value,
    /// Unix timestamp at publish time.
    pub timestamp: i64,
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Identifier returned from `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handler callback invoked for each matching published event.
pub type EventHandler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

// ============================================================================
// Event Bus
// ============================================================================

/// In-process pub/sub bus with synchronous, best-effort fan-out.
///
/// Handlers registered for a type are invoked in registration order. The
/// registry is guarded by an `RwLock`; dispatch snapshots the handler list
/// before invoking anything, so concurrent subscribe/unsubscribe never
/// races an in-flight publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventType, Vec<(SubscriptionId, EventHandler)>>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an event type.
    ///
    /// Returns a subscription id that can later be passed to `unsubscribe`.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let sub_id = SubscriptionId::new();
        let mut subscribers = self
            .subscribers
            .write()
            .expect("event bus registry poisoned");
        subscribers
            .entry(event_type)
            .or_default()
            .push((sub_id, Arc::new(handler)));

        debug!(%sub_id, event_type = %event_type, "Subscribed handler");
        sub_id
    }

    /// Remove a subscription.
    ///
    /// Returns `true` if the subscription existed and was removed.
    pub fn unsubscribe(&self, event_type: EventType, sub_id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .expect("event bus registry poisoned");

        let Some(handlers) = subscribers.get_mut(&event_type) else {
            return false;
        };

        let before = handlers.len();
        handlers.retain(|(id, _)| *id != sub_id);
        let removed = handlers.len() < before;

        if removed {
            debug!(%sub_id, event_type = %event_type, "Unsubscribed handler");
        }
        removed
    }

    /// Publish an event to all handlers currently registered for its type.
    ///
    /// Handlers run synchronously in registration order. A handler error is
    /// logged and swallowed so it cannot affect the publisher or the
    /// remaining handlers.
    pub fn publish(&self, event_type: EventType, payload: Value) {
        let event = Event {
            event_type,
            payload,
            timestamp: chrono::Utc::now().timestamp(),
        };

        // Snapshot under the read lock, invoke outside it.
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let subscribers = self
                .subscribers
                .read()
                .expect("event bus registry poisoned");
            subscribers.get(&event_type).cloned().unwrap_or_default()
        };

        debug!(
            event_type = %event_type,
            subscriber_count = handlers.len(),
            "Publishing event"
        );

        for (sub_id, handler) in handlers {
            if let Err(error) = handler(&event) {
                warn!(
                    %sub_id,
                    event_type = %event_type,
                    %error,
                    "Event handler failed"
                );
            }
        }
    }

    /// Number of handlers registered for an event type.
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers
            .read()
            .expect("event bus registry poisoned")
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self
            .subscribers
            .read()
            .expect("event bus registry poisoned");
        let total: usize = subscribers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("subscriber_count", &total)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
