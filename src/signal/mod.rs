//! Signal queue with cross-fetch de-duplication
//!
//! The remote source only ever returns "the signals it currently knows
//! about", so every fetch overlaps the previous one. [`SignalStore`] keeps a
//! newest-first buffer of undelivered signals and remembers the group of
//! already delivered signals that share the newest delivered timestamp. That
//! group is enough to reconcile the next fetch at its boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;

use crate::runtime::error::ApiResult;
use crate::runtime::value::Value;

pub mod throttle;

pub use throttle::Throttle;

/// Which signal feed a store buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalChannel {
    /// Signals broadcast to every player of the game.
    Global,
    /// Signals addressed to the current player.
    User,
}

/// One inbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Globally unique id.
    pub id: u64,
    /// Opaque payload.
    pub data: Value,
    /// Sending player's id.
    pub sender_id: u64,
    /// Sending player's display name.
    pub sender_name: String,
    /// Creation time. Non-decreasing, may collide between signals.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Per-session buffer of signals not yet delivered to the script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalStore {
    pending: Vec<Signal>,
    last_delivered: Vec<Signal>,
}

impl SignalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Undelivered signals, newest first.
    pub fn pending(&self) -> &[Signal] {
        &self.pending
    }

    /// Delivered signals sharing the most recent delivered timestamp.
    pub fn last_delivered(&self) -> &[Signal] {
        &self.last_delivered
    }

    /// Whether there is nothing left to deliver.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Replace `pending` with a freshly fetched batch, reconciled against the
    /// delivered boundary group.
    ///
    /// The batch is sorted newest first. When the boundary timestamp appears
    /// in it, everything older than the boundary group is dropped (it was
    /// consumed already) and the boundary group loses the signals that were
    /// delivered. When it does not appear the sorted batch is kept whole.
    pub fn merge(&mut self, mut batch: Vec<Signal>) {
        batch.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(boundary) = self.last_delivered.last().map(|s| s.created_at) {
            match batch.iter().rposition(|s| s.created_at == boundary) {
                Some(position) => {
                    batch.truncate(position + 1);
                    let delivered: HashSet<u64> =
                        self.last_delivered.iter().map(|s| s.id).collect();
                    batch.retain(|s| !delivered.contains(&s.id));
                }
                None => {
                    tracing::debug!(
                        boundary = %boundary,
                        fetched = batch.len(),
                        "delivered boundary not present in fetch; keeping batch as-is"
                    );
                }
            }
        }

        self.pending = batch;
    }

    /// Remove and return the oldest undelivered signal.
    pub fn take_next(&mut self) -> Option<Signal> {
        let signal = self.pending.pop()?;
        if self
            .last_delivered
            .last()
            .is_some_and(|last| last.created_at != signal.created_at)
        {
            self.last_delivered.clear();
        }
        self.last_delivered.push(signal.clone());
        Some(signal)
    }
}

/// Run one remote fetch and merge its result into `store`.
///
/// A failed fetch leaves the store untouched.
pub async fn fetch_and_merge<F, Fut>(remote_fetch: F, store: &mut SignalStore) -> ApiResult<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<Vec<Signal>>>,
{
    let batch = remote_fetch().await?;
    store.merge(batch);
    Ok(())
}
