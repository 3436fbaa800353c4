use std::error;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;
use log::debug;
use serde_json::{Map, Value};

use crate::{
    Backend, ChangeEvent, ChangeFeed, ConnectionState, Document, EventQueue, Filter,
    PresenceChannel, PresenceEvent, PresenceId, PresenceQueue, Record, Result, SubscriptionId,
};

#[derive(Debug, Clone)]
pub struct RowNotFound(String, String);
impl error::Error for RowNotFound {}
impl std::fmt::Display for RowNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row not found in {}: {}", self.0, self.1)
    }
}

#[derive(Debug, Clone)]
pub struct BackendUnavailable(String);
impl error::Error for BackendUnavailable {}
impl std::fmt::Display for BackendUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend unavailable while reading {}", self.0)
    }
}

#[derive(Debug)]
struct SubEntry {
    id: SubscriptionId,
    table: String,
    filter: Option<Filter>,
    queue: EventQueue,
}

#[derive(Debug)]
struct MemberEntry {
    id: PresenceId,
    channel: String,
    user_id: String,
    queue: PresenceQueue,
}

#[derive(Debug, Default)]
struct Inner {
    tables: AHashMap<String, Vec<Document>>,
    subs: Vec<SubEntry>,
    members: Vec<MemberEntry>,
    disconnected: bool,
    fail_fetches: bool,
}

/// In-process reference backend implementing all three consumed interfaces:
/// query/mutation, change feed, and presence.
///
/// Mutations fan change events out to matching subscribers synchronously, in
/// commit order. While "disconnected", events are dropped rather than
/// queued, which is exactly the gap a post-reconnect baseline refetch has to
/// cover.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    server_side_filters: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            inner: Mutex::new(Inner::default()),
            server_side_filters: true,
        }
    }

    /// A feed that delivers every event on a subscribed table regardless of
    /// filter, forcing subscribers to filter client-side.
    pub fn without_server_filters() -> Self {
        MemoryBackend {
            inner: Mutex::new(Inner::default()),
            server_side_filters: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load rows without emitting change events, as pre-existing data.
    pub fn seed(&self, table: &str, rows: Vec<Document>) {
        let mut inner = self.lock();
        inner.tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Load typed records without emitting change events.
    pub fn seed_records<R: Record>(&self, table: &str, records: &[R]) -> Result<()> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            rows.push(Document::from_record(record)?);
        }
        self.seed(table, rows);
        Ok(())
    }

    /// Commit one row and broadcast an Insert. A duplicate id replaces the
    /// stored row and is re-delivered as an Insert, the way an at-least-once
    /// feed would.
    pub fn insert(&self, table: &str, row: Document) {
        let mut inner = self.lock();
        let rows = inner.tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| r.id() == row.id()) {
            Some(slot) => *slot = row.clone(),
            None => rows.push(row.clone()),
        }
        Self::broadcast(&inner, self.server_side_filters, ChangeEvent::insert(table, row));
    }

    /// Remove one row and broadcast a Delete. Returns false when absent.
    pub fn delete(&self, table: &str, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(rows) = inner.tables.get_mut(table) else {
            return false;
        };
        let Some(position) = rows.iter().position(|r| r.id() == id) else {
            return false;
        };
        let old = rows.remove(position);
        Self::broadcast(&inner, self.server_side_filters, ChangeEvent::delete(table, old));
        true
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.lock().disconnected = state == ConnectionState::Disconnected;
    }

    /// Make subsequent fetches fail, to exercise the error path.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.lock().fail_fetches = fail;
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().subs.len()
    }

    fn broadcast(inner: &Inner, server_side_filters: bool, event: ChangeEvent<Document>) {
        if inner.disconnected {
            debug!("dropping change event on {} while disconnected", event.table);
            return;
        }
        for sub in inner.subs.iter().filter(|s| s.table == event.table) {
            if server_side_filters {
                if let Some(filter) = &sub.filter {
                    if !filter.matches_event(&event) {
                        continue;
                    }
                }
            }
            // A closed receiver just means the subscriber is gone.
            let _ = sub.queue.send(event.clone());
        }
    }
}

impl Backend for MemoryBackend {
    async fn fetch(&self, table: &str, filter: Option<&Filter>) -> Result<Vec<Document>> {
        let inner = self.lock();
        if inner.fail_fetches {
            return Err(BackendUnavailable(table.to_string()).into());
        }
        let mut rows = inner.tables.get(table).cloned().unwrap_or_default();
        if let Some(filter) = filter {
            rows.retain(|row| filter.matches(row));
        }
        Ok(rows)
    }

    async fn update(&self, table: &str, id: &str, patch: Map<String, Value>) -> Result<Document> {
        let mut inner = self.lock();
        let row = inner
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id() == id))
            .ok_or_else(|| RowNotFound(table.to_string(), id.to_string()))?;
        let old = row.clone();
        for (column, value) in patch {
            row.set(column, value);
        }
        let new = row.clone();
        Self::broadcast(
            &inner,
            self.server_side_filters,
            ChangeEvent::update(table, old, new.clone()),
        );
        Ok(new)
    }

    async fn update_many(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Map<String, Value>,
    ) -> Result<usize> {
        let mut inner = self.lock();
        let mut events = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| f.matches(row)))
            {
                let old = row.clone();
                for (column, value) in &patch {
                    row.set(column.clone(), value.clone());
                }
                events.push(ChangeEvent::update(table, old, row.clone()));
            }
        }
        let count = events.len();
        for event in events {
            Self::broadcast(&inner, self.server_side_filters, event);
        }
        Ok(count)
    }
}

impl ChangeFeed for MemoryBackend {
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&Filter>,
        queue: EventQueue,
    ) -> Result<SubscriptionId> {
        let mut inner = self.lock();
        let id = SubscriptionId::new();
        inner.subs.push(SubEntry {
            id,
            table: table.to_string(),
            filter: filter.cloned(),
            queue,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subs.len();
        inner.subs.retain(|sub| sub.id != *id);
        inner.subs.len() < before
    }

    fn server_side_filters(&self) -> bool {
        self.server_side_filters
    }

    fn connection_state(&self) -> ConnectionState {
        if self.lock().disconnected {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }
}

impl PresenceChannel for MemoryBackend {
    async fn join(
        &self,
        channel: &str,
        user_id: &str,
        queue: PresenceQueue,
    ) -> Result<PresenceId> {
        let mut inner = self.lock();
        for member in inner.members.iter().filter(|m| m.channel == channel) {
            let _ = member.queue.send(PresenceEvent::Join(user_id.to_string()));
        }
        let id = PresenceId::new();
        inner.members.push(MemberEntry {
            id,
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            queue,
        });
        let roster: Vec<String> = inner
            .members
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.user_id.clone())
            .collect();
        if let Some(joined) = inner.members.last() {
            let _ = joined.queue.send(PresenceEvent::Sync(roster));
        }
        Ok(id)
    }

    async fn leave(&self, id: &PresenceId) -> Result<()> {
        let mut inner = self.lock();
        let Some(position) = inner.members.iter().position(|m| m.id == *id) else {
            return Ok(());
        };
        let departed = inner.members.remove(position);
        for member in inner.members.iter().filter(|m| m.channel == departed.channel) {
            let _ = member.queue.send(PresenceEvent::Leave(departed.user_id.clone()));
        }
        Ok(())
    }
}
