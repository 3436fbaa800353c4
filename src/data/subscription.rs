use std::error;
use std::marker::PhantomData;

use log::{debug, warn};

use crate::{
    event_channel, ChangeEvent, ChangeFeed, Document, EventSource, Filter, Record, Result,
    SubscriptionId,
};

#[derive(Debug, Clone)]
pub struct MalformedEvent {
    table: String,
    reason: String,
}

impl MalformedEvent {
    fn new(table: &str, reason: impl Into<String>) -> Self {
        MalformedEvent {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

impl error::Error for MalformedEvent {}
impl std::fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed change event on {}: {}", self.table, self.reason)
    }
}

/// A live change-feed attachment for one (table, filter) pair.
///
/// Owns the receiving end of the event queue. Events are delivered as
/// untyped rows and decoded to `R` at poll time; rows that cannot be decoded
/// are logged and skipped, never surfaced. A single FIFO queue preserves the
/// backend's commit order per record.
#[derive(Debug)]
pub struct Subscription<R: Record> {
    id: SubscriptionId,
    table: String,
    filter: Option<Filter>,
    client_filter: bool,
    source: EventSource,
    closed: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Subscription<R> {
    /// Open one subscription on the feed. When the feed cannot filter
    /// server-side, the filter is applied here before events are decoded.
    pub fn open(
        feed: &impl ChangeFeed,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<Subscription<R>> {
        let (queue, source) = event_channel();
        let id = feed.subscribe(table, filter.as_ref(), queue)?;
        Ok(Subscription {
            id,
            table: table.to_string(),
            client_filter: !feed.server_side_filters(),
            filter,
            source,
            closed: false,
            _record: PhantomData,
        })
    }

    /// Next decoded event, or `None` once the queue is drained.
    pub fn poll(&mut self) -> Option<ChangeEvent<R>> {
        loop {
            let raw = self.source.try_recv().ok()?;
            if self.client_filter {
                if let Some(filter) = &self.filter {
                    if !filter.matches_event(&raw) {
                        continue;
                    }
                }
            }
            match decode_event(&self.table, raw) {
                Ok(event) => return Some(event),
                Err(err) => warn!("{err}"),
            }
        }
    }

    /// Release the feed channel. Idempotent; at most one release reaches the
    /// feed.
    pub fn close(&mut self, feed: &impl ChangeFeed) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
        if !feed.unsubscribe(&self.id) {
            debug!("subscription on {} was already released", self.table);
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn decode_event<R: Record>(
    table: &str,
    raw: ChangeEvent<Document>,
) -> std::result::Result<ChangeEvent<R>, MalformedEvent> {
    match raw.keyed() {
        Some(row) if !row.id().is_empty() => {}
        Some(_) => return Err(MalformedEvent::new(table, "row has no id")),
        None => return Err(MalformedEvent::new(table, "event carries no payload")),
    }
    let decode = |row: Option<Document>| -> std::result::Result<Option<R>, MalformedEvent> {
        row.map(|r| r.decode::<R>())
            .transpose()
            .map_err(|err| MalformedEvent::new(table, err.to_string()))
    };
    Ok(ChangeEvent {
        operation: raw.operation,
        table: raw.table,
        new_record: decode(raw.new_record)?,
        old_record: decode(raw.old_record)?,
    })
}
