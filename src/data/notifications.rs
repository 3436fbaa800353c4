use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::synchronizer::decode_rows;
use crate::{
    Backend, ChangeFeed, Filter, Merge, Operation, Record, Result, Stamped, SyncState,
    Synchronizer, Timestamp,
};

pub const NOTIFICATIONS_TABLE: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Task,
    Attendance,
    Leave,
    Deduction,
    Escalation,
    Alert,
}

/// A per-user notification row. Created server-side, delivered through the
/// change feed as an Insert, flipped to `read` by user action, never deleted
/// by this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub user_id: String,
    pub read: bool,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Stamped for Notification {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// Window options for the notification store
#[derive(Debug, Clone)]
pub struct NotifyOpts {
    /// Rows tracked in the display window; older rows fall out silently,
    /// read or not.
    pub limit: usize,
}

impl Default for NotifyOpts {
    fn default() -> Self {
        NotifyOpts { limit: 50 }
    }
}

/// One user's notification window plus unread accounting.
///
/// A specialization of [`Synchronizer`] over the `notifications` table,
/// filtered to one `user_id`, ordered newest first, capped at
/// `NotifyOpts::limit`. The unread counter follows event accounting and is
/// deliberately independent of window truncation: an unread row pushed out
/// of the window still counts until a baseline fetch recomputes it.
pub struct NotificationStore {
    user_id: String,
    opts: NotifyOpts,
    sync: Synchronizer<Notification>,
    unread: usize,
}

impl NotificationStore {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_opts(user_id, NotifyOpts::default())
    }

    pub fn with_opts(user_id: impl Into<String>, opts: NotifyOpts) -> Self {
        NotificationStore {
            user_id: user_id.into(),
            opts,
            sync: Synchronizer::new(NOTIFICATIONS_TABLE),
            unread: 0,
        }
    }

    fn user_filter(&self) -> Filter {
        Filter::eq("user_id", self.user_id.clone())
    }

    /// Baseline fetch (newest `limit` rows) plus subscription. The counter
    /// is recomputed from the fetched window.
    pub async fn start(&mut self, backend: &impl Backend, feed: &impl ChangeFeed) -> Result<()> {
        let ticket = self.sync.begin(feed, Some(self.user_filter()))?;
        self.fetch_and_land(backend, ticket).await
    }

    /// Re-read the baseline without dropping the subscription; reconciles
    /// the counter against what the backend actually holds.
    pub async fn refresh(&mut self, backend: &impl Backend) -> Result<()> {
        let ticket = self.sync.renew();
        self.fetch_and_land(backend, ticket).await
    }

    async fn fetch_and_land(
        &mut self,
        backend: &impl Backend,
        ticket: crate::FetchTicket,
    ) -> Result<()> {
        let filter = self.user_filter();
        let baseline = match backend
            .fetch_recent(NOTIFICATIONS_TABLE, Some(&filter), self.opts.limit)
            .await
        {
            Ok(rows) => Ok(decode_rows(NOTIFICATIONS_TABLE, rows)),
            Err(err) => Err(err.to_string()),
        };
        self.sync.resolve(ticket, baseline);
        if matches!(self.sync.state(), SyncState::Ready) {
            self.restore_window();
            self.unread = self.sync.data().iter().filter(|n| !n.read).count();
        }
        Ok(())
    }

    /// Drain pending events, maintaining the unread counter and the window.
    ///
    /// Every applied Insert of a new id counts +1 (all notifications arrive
    /// unread); an applied Update whose old row was unread and new row is
    /// read counts -1, clamped at zero. Re-delivered Inserts replace in
    /// place and do not move the counter.
    pub fn process_events(&mut self) -> usize {
        let unread = &mut self.unread;
        let applied = self.sync.process_events_with(|event, outcome| {
            match (event.operation, outcome) {
                (Operation::Insert, Merge::Appended) => *unread += 1,
                (Operation::Update, Merge::Updated) => {
                    let was_unread = event.old_record.as_ref().is_some_and(|old| !old.read);
                    let now_read = event.new_record.as_ref().is_some_and(|new| new.read);
                    if was_unread && now_read {
                        *unread = unread.saturating_sub(1);
                    }
                }
                _ => {}
            }
        });
        if applied > 0 {
            self.restore_window();
        }
        applied
    }

    // Newest first, capped. Truncation does not touch the counter.
    fn restore_window(&mut self) {
        let limit = self.opts.limit;
        let window = self.sync.data_mut();
        window.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        window.truncate(limit);
    }

    /// Flip one notification to read on the backend. Local state is not
    /// touched; the echoed Update event carries the transition back through
    /// the same channel as every other change.
    pub async fn mark_read(&self, backend: &impl Backend, id: &str) -> Result<()> {
        let mut patch = Map::new();
        patch.insert("read".to_string(), Value::Bool(true));
        backend.update(NOTIFICATIONS_TABLE, id, patch).await?;
        Ok(())
    }

    /// Bulk-flip every unread notification for this user. On success the
    /// counter resets to zero immediately rather than waiting for the echoed
    /// per-row events; if the bulk update only partially applied, the next
    /// baseline fetch reconciles. On failure local state is unchanged.
    pub async fn mark_all_read(&mut self, backend: &impl Backend) -> Result<usize> {
        let filters = [self.user_filter(), Filter::eq("read", false)];
        let mut patch = Map::new();
        patch.insert("read".to_string(), Value::Bool(true));
        let count = backend
            .update_many(NOTIFICATIONS_TABLE, &filters, patch)
            .await?;
        self.unread = 0;
        Ok(count)
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn data(&self) -> &[Notification] {
        self.sync.data()
    }

    pub fn loading(&self) -> bool {
        self.sync.loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.sync.error()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn detach(&mut self, feed: &impl ChangeFeed) {
        self.sync.detach(feed);
    }
}
