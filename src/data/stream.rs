use std::collections::VecDeque;

use crate::{ChangeFeed, Record, Result, Subscription};

/// Subscribe-only view of the most recent records on a table, newest first.
///
/// Unlike a [`crate::Synchronizer`] there is no baseline fetch: the window
/// starts empty and fills as inserts and updates arrive. Activity feeds
/// ("live events since you opened the page") are the intended consumer.
#[derive(Debug)]
pub struct Tail<R: Record> {
    capacity: usize,
    recent: VecDeque<R>,
    subscription: Subscription<R>,
}

impl<R: Record> Tail<R> {
    pub const DEFAULT_CAPACITY: usize = 20;

    pub fn open(feed: &impl ChangeFeed, table: &str, capacity: usize) -> Result<Self> {
        Ok(Tail {
            capacity,
            recent: VecDeque::with_capacity(capacity),
            subscription: Subscription::open(feed, table, None)?,
        })
    }

    /// Drain pending events into the window. Inserts and updates prepend
    /// their new record; deletes carry nothing to show and are skipped.
    pub fn process_events(&mut self) -> usize {
        let mut appended = 0;
        while let Some(event) = self.subscription.poll() {
            if let Some(record) = event.new_record {
                self.recent.push_front(record);
                self.recent.truncate(self.capacity);
                appended += 1;
            }
        }
        appended
    }

    pub fn latest(&self) -> Option<&R> {
        self.recent.front()
    }

    /// Recent records, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &R> {
        self.recent.iter()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn close(&mut self, feed: &impl ChangeFeed) {
        self.subscription.close(feed);
    }
}
