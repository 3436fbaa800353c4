use log::{debug, warn};

use crate::{
    Backend, ChangeEvent, ChangeFeed, Document, Filter, Operation, Record, Result, Subscription,
};

/// Lifecycle of a synchronized collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Outcome of offering one change event to a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// Insert of a previously unseen id.
    Appended,
    /// Insert re-delivered for an existing id; replaced in place.
    Replaced,
    /// Update applied to an existing record.
    Updated,
    /// Delete removed an existing record.
    Removed,
    /// Event did not apply; reason is logged, never surfaced.
    Ignored(&'static str),
}

/// Pure merge of one change event into a keyed, ordered collection.
///
/// Insert appends, or replaces in place on a duplicate id to tolerate
/// re-delivery. Update and Delete are no-ops when the id is absent (a
/// superseded delete, or a delete racing the baseline).
pub fn merge<R: Record>(collection: &mut Vec<R>, event: &ChangeEvent<R>) -> Merge {
    match event.operation {
        Operation::Insert => {
            let Some(record) = &event.new_record else {
                return Merge::Ignored("insert without new record");
            };
            match collection.iter_mut().find(|r| r.id() == record.id()) {
                Some(slot) => {
                    *slot = record.clone();
                    Merge::Replaced
                }
                None => {
                    collection.push(record.clone());
                    Merge::Appended
                }
            }
        }
        Operation::Update => {
            let Some(record) = &event.new_record else {
                return Merge::Ignored("update without new record");
            };
            match collection.iter_mut().find(|r| r.id() == record.id()) {
                Some(slot) => {
                    *slot = record.clone();
                    Merge::Updated
                }
                None => Merge::Ignored("update for unknown id"),
            }
        }
        Operation::Delete => {
            let Some(record) = &event.old_record else {
                return Merge::Ignored("delete without old record");
            };
            let before = collection.len();
            collection.retain(|r| r.id() != record.id());
            if collection.len() < before {
                Merge::Removed
            } else {
                Merge::Ignored("delete for unknown id")
            }
        }
    }
}

/// Single-use proof that a baseline fetch belongs to the current generation.
/// A ticket from before a filter change or a teardown no longer matches and
/// its resolution is discarded.
#[derive(Debug)]
pub struct FetchTicket(u64);

/// Maintains an ordered, keyed collection for one (table, filter) pair:
/// one full fetch for the baseline, then incremental change events merged on
/// top. Each synchronizer exclusively owns its collection and subscription.
#[derive(Debug)]
pub struct Synchronizer<R: Record> {
    table: String,
    filter: Option<Filter>,
    state: SyncState,
    collection: Vec<R>,
    subscription: Option<Subscription<R>>,
    generation: u64,
}

impl<R: Record> Synchronizer<R> {
    pub fn new(table: impl Into<String>) -> Self {
        Synchronizer {
            table: table.into(),
            filter: None,
            state: SyncState::Idle,
            collection: Vec::new(),
            subscription: None,
            generation: 0,
        }
    }

    /// Open the change feed and mark the collection as loading. The
    /// subscription opens before the baseline read is issued, so events
    /// committed during the fetch buffer in the queue and replay in arrival
    /// order once the baseline lands.
    ///
    /// Beginning with a different filter discards the previous collection
    /// and subscription; nothing from the old filter's cycle survives.
    pub fn begin(&mut self, feed: &impl ChangeFeed, filter: Option<Filter>) -> Result<FetchTicket> {
        if let Some(mut old) = self.subscription.take() {
            old.close(feed);
        }
        self.collection.clear();
        self.filter = filter;
        self.generation += 1;
        self.subscription = Some(Subscription::open(feed, &self.table, self.filter.clone())?);
        self.state = SyncState::Loading;
        Ok(FetchTicket(self.generation))
    }

    /// Renew the ticket without touching the collection or subscription,
    /// for re-reading the baseline after a reconnect or an explicit refetch.
    pub fn renew(&mut self) -> FetchTicket {
        self.generation += 1;
        if !matches!(self.state, SyncState::Ready) {
            self.state = SyncState::Loading;
        }
        FetchTicket(self.generation)
    }

    /// Land a baseline. A stale ticket is a no-op, which is what makes
    /// teardown safe while a fetch is in flight. On success the baseline
    /// replaces the collection wholesale (it is authoritative at completion
    /// time); on failure the last known collection is kept for display and
    /// the error is surfaced through `error()`.
    pub fn resolve(&mut self, ticket: FetchTicket, baseline: std::result::Result<Vec<R>, String>) {
        if ticket.0 != self.generation {
            debug!(
                "discarding stale baseline for {} (ticket {}, generation {})",
                self.table, ticket.0, self.generation
            );
            return;
        }
        match baseline {
            Ok(records) => {
                self.collection = records;
                self.state = SyncState::Ready;
            }
            Err(message) => {
                self.state = SyncState::Failed(message);
            }
        }
    }

    /// Baseline fetch plus subscription in one step.
    pub async fn start(
        &mut self,
        backend: &impl Backend,
        feed: &impl ChangeFeed,
        filter: Option<Filter>,
    ) -> Result<()> {
        let ticket = self.begin(feed, filter)?;
        let baseline = match backend.fetch(&self.table, self.filter.as_ref()).await {
            Ok(rows) => Ok(decode_rows(&self.table, rows)),
            Err(err) => Err(err.to_string()),
        };
        self.resolve(ticket, baseline);
        Ok(())
    }

    /// Re-read the baseline without dropping the live subscription. Used for
    /// consumer-driven refetch and after a reconnect, since events missed
    /// while disconnected are not replayable.
    pub async fn refetch(&mut self, backend: &impl Backend) -> Result<()> {
        let ticket = self.renew();
        let baseline = match backend.fetch(&self.table, self.filter.as_ref()).await {
            Ok(rows) => Ok(decode_rows(&self.table, rows)),
            Err(err) => Err(err.to_string()),
        };
        self.resolve(ticket, baseline);
        Ok(())
    }

    /// Drain pending change events into the collection. Merges are
    /// synchronous and applied in delivery order; the return value is the
    /// number of applied merges, each of which warrants a consumer-visible
    /// update. No events are merged before the baseline has landed.
    pub fn process_events(&mut self) -> usize {
        self.process_events_with(|_, _| {})
    }

    /// As `process_events`, with an observer invoked per event alongside its
    /// merge outcome. The notification store's unread accounting hangs off
    /// this hook.
    pub fn process_events_with(
        &mut self,
        mut observer: impl FnMut(&ChangeEvent<R>, &Merge),
    ) -> usize {
        if !matches!(self.state, SyncState::Ready) {
            return 0;
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        while let Some(event) = subscription.poll() {
            let outcome = merge(&mut self.collection, &event);
            match &outcome {
                Merge::Ignored(reason) => {
                    warn!("skipping change event on {}: {}", self.table, reason);
                }
                _ => applied += 1,
            }
            observer(&event, &outcome);
        }
        applied
    }

    /// Tear down: close the subscription and invalidate any in-flight
    /// fetch. The collection keeps its last known contents.
    pub fn detach(&mut self, feed: &impl ChangeFeed) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close(feed);
        }
        self.generation += 1;
        self.state = SyncState::Idle;
    }

    pub fn data(&self) -> &[R] {
        &self.collection
    }

    pub(crate) fn data_mut(&mut self) -> &mut Vec<R> {
        &mut self.collection
    }

    pub fn loading(&self) -> bool {
        matches!(self.state, SyncState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SyncState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }
}

/// Decode baseline rows, skipping the ones that do not parse as `R`.
/// Consistent with event handling: a malformed row is logged, never fatal.
pub(crate) fn decode_rows<R: Record>(table: &str, rows: Vec<Document>) -> Vec<R> {
    rows.into_iter()
        .filter_map(|row| match row.decode::<R>() {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("dropping malformed baseline row on {table}: {err}");
                None
            }
        })
        .collect()
}
