use itertools::Itertools;

use crate::{presence_channel, PresenceChannel, PresenceEvent, PresenceId, PresenceSource, Result};

/// Peer-set membership on a shared broadcast channel.
///
/// Membership is eventually consistent and advisory: `Sync` replaces the
/// whole set, `Join` adds one id (deduplicating), `Leave` removes one.
/// Teardown must go through [`PresenceTracker::leave`] so that peers observe
/// the departure.
#[derive(Debug)]
pub struct PresenceTracker {
    user_id: String,
    online: Vec<String>,
    source: Option<PresenceSource>,
    handle: Option<PresenceId>,
}

impl PresenceTracker {
    pub fn new(user_id: impl Into<String>) -> Self {
        PresenceTracker {
            user_id: user_id.into(),
            online: Vec::new(),
            source: None,
            handle: None,
        }
    }

    /// Announce self on `channel` and begin tracking membership events.
    pub async fn join(&mut self, channel: &impl PresenceChannel, name: &str) -> Result<()> {
        let (queue, source) = presence_channel();
        let handle = channel.join(name, &self.user_id, queue).await?;
        self.handle = Some(handle);
        self.source = Some(source);
        Ok(())
    }

    /// Drain pending membership events. Returns the number applied.
    pub fn process_events(&mut self) -> usize {
        let Some(source) = self.source.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(event) = source.try_recv() {
            match event {
                PresenceEvent::Sync(users) => {
                    self.online = users.into_iter().unique().collect();
                }
                PresenceEvent::Join(user) => {
                    if !self.online.contains(&user) {
                        self.online.push(user);
                    }
                }
                PresenceEvent::Leave(user) => {
                    self.online.retain(|u| u != &user);
                }
            }
            applied += 1;
        }
        applied
    }

    pub fn online_users(&self) -> &[String] {
        &self.online
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Depart the channel so peers observe a `Leave`. Idempotent.
    pub async fn leave(&mut self, channel: &impl PresenceChannel) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            channel.leave(&handle).await?;
        }
        self.source = None;
        self.online.clear();
        Ok(())
    }
}
