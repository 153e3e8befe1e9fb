//! At most one fetch per key at a time
//!
//! The first miss for a key becomes the leader and does the work; later
//! misses for the same key subscribe to the leader's result instead of
//! fetching again. A leader that is dropped before finishing closes the
//! channel, and its followers start over.

use crate::error::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

pub(crate) type SharedResult = Result<PathBuf>;

#[derive(Default)]
pub(crate) struct InFlight {
    requests: Mutex<HashMap<String, broadcast::Sender<SharedResult>>>,
}

pub(crate) enum Registration {
    Leader(LeaderGuard),
    Follower(broadcast::Receiver<SharedResult>),
}

impl InFlight {
    fn requests(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<SharedResult>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(self: &Arc<Self>, key: &str) -> Registration {
        let mut requests = self.requests();

        if let Some(sender) = requests.get(key) {
            debug!(key, "Joining in-flight fetch");
            return Registration::Follower(sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        requests.insert(key.to_string(), sender.clone());
        Registration::Leader(LeaderGuard {
            in_flight: Arc::clone(self),
            key: key.to_string(),
            sender,
            finished: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.requests().len()
    }
}

/// Held by the caller doing the work for a key
pub(crate) struct LeaderGuard {
    in_flight: Arc<InFlight>,
    key: String,
    sender: broadcast::Sender<SharedResult>,
    finished: bool,
}

impl LeaderGuard {
    /// Publish the result to every follower and release the key
    pub(crate) fn complete(mut self, result: &SharedResult) {
        self.in_flight.requests().remove(&self.key);
        // No receivers is fine: nobody was waiting
        let _ = self.sender.send(result.clone());
        self.finished = true;
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.in_flight.requests().remove(&self.key);
        }
    }
}
