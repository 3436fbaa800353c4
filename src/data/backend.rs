use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{ChangeEvent, Document, Filter, Result};

/// Liveness of the change-feed channel. Loss of the channel is surfaced
/// through this signal rather than as an error, since the drop is
/// asynchronous and has no caller to receive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Queue end handed to a change feed at subscribe time.
pub type EventQueue = mpsc::UnboundedSender<ChangeEvent<Document>>;

/// Queue end drained by a subscription.
pub type EventSource = mpsc::UnboundedReceiver<ChangeEvent<Document>>;

/// Create a new change-event channel pair
pub fn event_channel() -> (EventQueue, EventSource) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        SubscriptionId(Uuid::new_v4())
    }
}

/// Query and mutation interface every backend implements.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// One full read of a table, optionally narrowed by an equality filter.
    async fn fetch(&self, table: &str, filter: Option<&Filter>) -> Result<Vec<Document>>;

    /// The newest `limit` rows by `created_at`, newest first. Backends with
    /// server-side ordering should override this.
    async fn fetch_recent(
        &self,
        table: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let mut rows = self.fetch(table, filter).await?;
        rows.sort_by(|a, b| created_at_key(b).cmp(&created_at_key(a)));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Patch one row by id, returning the updated row.
    async fn update(&self, table: &str, id: &str, patch: Map<String, Value>) -> Result<Document>;

    /// Patch every row matching all given predicates, returning the count.
    async fn update_many(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Map<String, Value>,
    ) -> Result<usize>;
}

// RFC 3339 strings order lexicographically, which is all the default
// `fetch_recent` needs.
fn created_at_key(row: &Document) -> String {
    row.get("created_at")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Change-feed interface: delivers committed changes for a table into a
/// caller-owned queue, in commit order.
pub trait ChangeFeed {
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&Filter>,
        queue: EventQueue,
    ) -> Result<SubscriptionId>;

    /// Release the channel. Returns false if the id was already released.
    fn unsubscribe(&self, id: &SubscriptionId) -> bool;

    /// Whether the feed applies filters before delivery. When false, the
    /// subscription filters client-side.
    fn server_side_filters(&self) -> bool {
        true
    }

    fn connection_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

/// Membership traffic on a shared presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceEvent {
    /// Authoritative full member set, replacing local state.
    Sync(Vec<String>),
    Join(String),
    Leave(String),
}

pub type PresenceQueue = mpsc::UnboundedSender<PresenceEvent>;
pub type PresenceSource = mpsc::UnboundedReceiver<PresenceEvent>;

/// Create a new presence-event channel pair
pub fn presence_channel() -> (PresenceQueue, PresenceSource) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceId(Uuid);

impl PresenceId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        PresenceId(Uuid::new_v4())
    }
}

/// Broadcast channel for "who is online". Best-effort only; nothing in the
/// sync layer may treat membership as authoritative.
#[allow(async_fn_in_trait)]
pub trait PresenceChannel {
    /// Announce `user_id` on `channel` and attach a queue for membership
    /// events. The joiner receives an initial `Sync`; peers observe a `Join`.
    async fn join(&self, channel: &str, user_id: &str, queue: PresenceQueue)
        -> Result<PresenceId>;

    /// Depart so that peers observe a `Leave` event.
    async fn leave(&self, id: &PresenceId) -> Result<()>;
}
