mod data;

#[cfg(test)]
mod test;

pub use data::{
    event_channel, merge, now, presence_channel, Backend, BackendUnavailable, ChangeEvent,
    ChangeFeed, ConnectionState, Document, EventQueue, EventSource, FetchTicket, Filter,
    MalformedEvent, MemoryBackend, Merge, Notification, NotificationKind, NotificationStore,
    NotifyOpts, Operation, PresenceChannel, PresenceEvent, PresenceId, PresenceQueue,
    PresenceSource, PresenceTracker, Record, RowNotFound, Stamped, Subscription, SubscriptionId,
    SyncState, Synchronizer, Tail, Timestamp, NOTIFICATIONS_TABLE,
};

// Re-exported so the `doc!` macro can build nested values without the caller
// depending on serde_json directly.
pub use serde_json::json;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Build an untyped backend row with minimal syntax
///
/// # Examples
///
/// ```
/// use livesync_rs::doc;
///
/// let row = doc! {
///     "id" => "t1",
///     "status" => "pending",
/// };
/// assert_eq!(row.get("status").and_then(|v| v.as_str()), Some("pending"));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Document::new();
        $(
            row.set($key, $crate::json!($value));
        )+
        row
    }};
}
