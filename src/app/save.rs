use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use bitflags::bitflags;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use time::OffsetDateTime;

use crate::identity::UserId;
use crate::links::{LinkEntry, LinkStore};
use crate::storage::LinkRepository;

bitflags! {
    /// Reasons the Save action is currently disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SaveBlockers: u8 {
        const EMPTY = 1;
        const MISSING_LINK = 1 << 1;
        const IN_FLIGHT = 1 << 2;
    }
}

impl SaveBlockers {
    pub fn describe(&self) -> String {
        let mut reasons = Vec::new();
        if self.contains(Self::EMPTY) {
            reasons.push("add a link first");
        }
        if self.contains(Self::MISSING_LINK) {
            reasons.push("every link needs a URL");
        }
        if self.contains(Self::IN_FLIGHT) {
            reasons.push("save in progress");
        }
        reasons.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Ready,
    Blocked(SaveBlockers),
    Saving,
    Saved(OffsetDateTime),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Saved {
        at: OffsetDateTime,
        /// Store revision the submitted snapshot was taken from.
        revision: u64,
    },
    Failed {
        message: String,
    },
}

struct InFlight {
    receiver: Receiver<Result<()>>,
    revision: u64,
}

/// Sends full-list snapshots to the repository, one submission at a time.
pub struct SavePipeline {
    repository: Arc<dyn LinkRepository>,
    user_id: UserId,
    in_flight: Option<InFlight>,
    last_event: Option<SaveEvent>,
}

impl SavePipeline {
    pub fn new(repository: Arc<dyn LinkRepository>, user_id: UserId) -> Self {
        Self {
            repository,
            user_id,
            in_flight: None,
            last_event: None,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn blockers(&self, entries: &[LinkEntry]) -> SaveBlockers {
        let mut blockers = SaveBlockers::empty();
        if entries.is_empty() {
            blockers |= SaveBlockers::EMPTY;
        }
        if entries.iter().any(|entry| !entry.has_link()) {
            blockers |= SaveBlockers::MISSING_LINK;
        }
        if self.in_flight.is_some() {
            blockers |= SaveBlockers::IN_FLIGHT;
        }
        blockers
    }

    pub fn is_enabled(&self, entries: &[LinkEntry]) -> bool {
        self.blockers(entries).is_empty()
    }

    pub fn status(&self, entries: &[LinkEntry]) -> SaveStatus {
        if self.in_flight.is_some() {
            return SaveStatus::Saving;
        }
        let blockers = self.blockers(entries);
        if !blockers.is_empty() {
            return SaveStatus::Blocked(blockers);
        }
        match &self.last_event {
            Some(SaveEvent::Saved { at, .. }) => SaveStatus::Saved(*at),
            Some(SaveEvent::Failed { message }) => SaveStatus::Failed(message.clone()),
            None => SaveStatus::Ready,
        }
    }

    /// Starts a submission of the store's current contents. Returns
    /// `Ok(false)` without side effects when Save is disabled; clicks while
    /// a submission is pending are dropped, not queued.
    pub fn submit(&mut self, store: &LinkStore) -> Result<bool> {
        let blockers = self.blockers(store.entries());
        if !blockers.is_empty() {
            tracing::debug!(?blockers, "save ignored");
            return Ok(false);
        }

        let records = store.records();
        let revision = store.revision();
        let repository = Arc::clone(&self.repository);
        let user_id = self.user_id.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("devlinks-save".into())
            .spawn(move || {
                let result = repository.set_links_for_user(&user_id, &records);
                let _ = tx.send(result);
            })
            .context("spawning save worker")?;

        tracing::info!(count = store.len(), revision, "save submitted");
        self.in_flight = Some(InFlight {
            receiver: rx,
            revision,
        });
        Ok(true)
    }

    /// Non-blocking check for the pending submission's outcome.
    pub fn poll(&mut self) -> Option<SaveEvent> {
        let outcome = match &self.in_flight {
            Some(flight) => match flight.receiver.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    Some(Err(anyhow::anyhow!("save worker exited without reporting")))
                }
            },
            None => None,
        }?;
        Some(self.finish(outcome))
    }

    /// Blocks up to `timeout` for the pending submission.
    pub fn wait(&mut self, timeout: Duration) -> Option<SaveEvent> {
        let outcome = match &self.in_flight {
            Some(flight) => match flight.receiver.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    Some(Err(anyhow::anyhow!("save worker exited without reporting")))
                }
            },
            None => None,
        }?;
        Some(self.finish(outcome))
    }

    fn finish(&mut self, outcome: Result<()>) -> SaveEvent {
        let revision = self
            .in_flight
            .take()
            .map(|flight| flight.revision)
            .unwrap_or_default();
        let event = match outcome {
            Ok(()) => {
                tracing::info!(revision, "save completed");
                SaveEvent::Saved {
                    at: OffsetDateTime::now_utc(),
                    revision,
                }
            }
            Err(err) => {
                tracing::error!(error = ?err, "save failed");
                SaveEvent::Failed {
                    message: format!("{err:#}"),
                }
            }
        };
        self.last_event = Some(event.clone());
        event
    }
}
