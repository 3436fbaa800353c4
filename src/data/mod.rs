mod backend;
mod event;
mod filter;
mod memory;
mod notifications;
mod presence;
mod record;
mod stream;
mod subscription;
mod synchronizer;

pub use backend::{
    event_channel, presence_channel, Backend, ChangeFeed, ConnectionState, EventQueue,
    EventSource, PresenceChannel, PresenceEvent, PresenceId, PresenceQueue, PresenceSource,
    SubscriptionId,
};
pub use event::{ChangeEvent, Operation};
pub use filter::Filter;
pub use memory::{BackendUnavailable, MemoryBackend, RowNotFound};
pub use notifications::{
    Notification, NotificationKind, NotificationStore, NotifyOpts, NOTIFICATIONS_TABLE,
};
pub use presence::PresenceTracker;
pub use record::{Document, Record, Stamped};
pub use stream::Tail;
pub use subscription::{MalformedEvent, Subscription};
pub use synchronizer::{merge, FetchTicket, Merge, SyncState, Synchronizer};

pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub fn now() -> Timestamp {
    chrono::Utc::now()
}
