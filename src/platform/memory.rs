//! In-memory platform used by tests and the CLI.
//!
//! Time is a manual millisecond clock so signal timestamps can be made to
//! collide on purpose. Every call can be delayed by a fixed latency and the
//! next call can be made to fail.

use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::{MAX_BOARD_ID, ScoreboardApi, SignalApi};
use crate::runtime::error::{ApiError, ApiErrorCode, ApiResult};
use crate::runtime::value::Value;
use crate::signal::{Signal, SignalChannel};

#[derive(Debug)]
struct Inner {
    player_id: u64,
    player_name: String,
    clock_ms: i64,
    next_signal_id: u64,
    global: Vec<Signal>,
    inbox: HashMap<u64, Vec<Signal>>,
    fetch_window: Option<usize>,
    latency: Duration,
    failures: VecDeque<ApiError>,
    fetches: HashMap<SignalChannel, usize>,
    boards: HashMap<u32, Vec<(u64, i64)>>,
}

/// Platform double holding all state in memory.
#[derive(Debug)]
pub struct MemoryPlatform {
    inner: Mutex<Inner>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(1, "player")
    }
}

impl MemoryPlatform {
    /// Create a platform signed in as the given player.
    pub fn new(player_id: u64, player_name: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                player_id,
                player_name: player_name.into(),
                clock_ms: 0,
                next_signal_id: 1,
                global: Vec::new(),
                inbox: HashMap::new(),
                fetch_window: None,
                latency: Duration::ZERO,
                failures: VecDeque::new(),
                fetches: HashMap::new(),
                boards: HashMap::new(),
            }),
        }
    }

    /// Id of the signed-in player.
    pub fn player_id(&self) -> u64 {
        self.inner.lock().player_id
    }

    /// Move the platform clock forward.
    pub fn advance_clock(&self, millis: i64) {
        self.inner.lock().clock_ms += millis;
    }

    /// Only the newest `window` signals are returned by a fetch.
    pub fn set_fetch_window(&self, window: Option<usize>) {
        self.inner.lock().fetch_window = window;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Make the next call (of any kind) fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.inner.lock().failures.push_back(error);
    }

    /// How many fetches reached the platform on `channel`.
    pub fn fetch_count(&self, channel: SignalChannel) -> usize {
        self.inner
            .lock()
            .fetches
            .get(&channel)
            .copied()
            .unwrap_or(0)
    }

    /// Record a signal from another player, stamped with the current clock.
    /// User-channel signals are addressed to the signed-in player.
    pub fn push_signal(
        &self,
        channel: SignalChannel,
        sender_id: u64,
        sender_name: &str,
        data: impl Into<Value>,
    ) -> u64 {
        let mut inner = self.inner.lock();
        let recipient = inner.player_id;
        let signal = inner.stamp(sender_id, sender_name.to_string(), data.into());
        let id = signal.id;
        match channel {
            SignalChannel::Global => inner.global.push(signal),
            SignalChannel::User => inner.inbox.entry(recipient).or_default().push(signal),
        }
        id
    }

    /// Append pre-built signals (fixtures) to a channel as-is.
    pub fn load_signals(&self, channel: SignalChannel, signals: Vec<Signal>) {
        let mut inner = self.inner.lock();
        if let Some(max_id) = signals.iter().map(|s| s.id).max() {
            inner.next_signal_id = inner.next_signal_id.max(max_id + 1);
        }
        let recipient = inner.player_id;
        match channel {
            SignalChannel::Global => inner.global.extend(signals),
            SignalChannel::User => inner.inbox.entry(recipient).or_default().extend(signals),
        }
    }

    /// Signals waiting in a player's inbox.
    pub fn inbox(&self, player_id: u64) -> Vec<Signal> {
        self.inner
            .lock()
            .inbox
            .get(&player_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every `(player, score)` entry on a board.
    pub fn records(&self, board_id: u32) -> Vec<(u64, i64)> {
        self.inner
            .lock()
            .boards
            .get(&board_id)
            .cloned()
            .unwrap_or_default()
    }

    fn respond<T: Send + 'static>(
        &self,
        call: impl FnOnce(&mut Inner) -> ApiResult<T>,
    ) -> BoxFuture<'static, ApiResult<T>> {
        let (latency, result) = {
            let mut inner = self.inner.lock();
            let result = match inner.failures.pop_front() {
                Some(error) => Err(error),
                None => call(&mut *inner),
            };
            (inner.latency, result)
        };
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            result
        }
        .boxed()
    }
}

impl Inner {
    fn stamp(&mut self, sender_id: u64, sender_name: String, data: Value) -> Signal {
        let id = self.next_signal_id;
        self.next_signal_id += 1;
        Signal {
            id,
            data,
            sender_id,
            sender_name,
            created_at: Utc
                .timestamp_millis_opt(self.clock_ms)
                .single()
                .unwrap_or_default(),
        }
    }

    fn windowed(&self, mut signals: Vec<Signal>) -> Vec<Signal> {
        if let Some(window) = self.fetch_window {
            signals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            signals.truncate(window);
        }
        signals
    }
}

fn check_board(board_id: u32) -> ApiResult<()> {
    if (1..=MAX_BOARD_ID).contains(&board_id) {
        Ok(())
    } else {
        Err(ApiError::new(
            ApiErrorCode::BadRequest,
            format!("scoreboard {board_id} does not exist"),
        ))
    }
}

impl SignalApi for MemoryPlatform {
    fn fetch_signals(&self, channel: SignalChannel) -> BoxFuture<'static, ApiResult<Vec<Signal>>> {
        self.respond(move |inner| {
            *inner.fetches.entry(channel).or_default() += 1;
            let signals = match channel {
                SignalChannel::Global => inner.global.clone(),
                SignalChannel::User => inner
                    .inbox
                    .get(&inner.player_id)
                    .cloned()
                    .unwrap_or_default(),
            };
            Ok(inner.windowed(signals))
        })
    }

    fn send_global_signal(&self, data: Value) -> BoxFuture<'static, ApiResult<()>> {
        self.respond(move |inner| {
            let (sender_id, sender_name) = (inner.player_id, inner.player_name.clone());
            let signal = inner.stamp(sender_id, sender_name, data);
            inner.global.push(signal);
            Ok(())
        })
    }

    fn send_user_signal(&self, recipient: u64, data: Value) -> BoxFuture<'static, ApiResult<()>> {
        self.respond(move |inner| {
            if recipient == 0 {
                return Err(ApiError::new(
                    ApiErrorCode::BadRequest,
                    "recipient user id must be positive",
                ));
            }
            let (sender_id, sender_name) = (inner.player_id, inner.player_name.clone());
            let signal = inner.stamp(sender_id, sender_name, data);
            inner.inbox.entry(recipient).or_default().push(signal);
            Ok(())
        })
    }
}

impl ScoreboardApi for MemoryPlatform {
    fn set_record(&self, board_id: u32, score: i64) -> BoxFuture<'static, ApiResult<()>> {
        self.respond(move |inner| {
            check_board(board_id)?;
            let player = inner.player_id;
            inner.boards.entry(board_id).or_default().push((player, score));
            Ok(())
        })
    }

    fn my_best_record(&self, board_id: u32) -> BoxFuture<'static, ApiResult<Option<i64>>> {
        self.respond(move |inner| {
            check_board(board_id)?;
            let player = inner.player_id;
            Ok(inner
                .boards
                .get(&board_id)
                .and_then(|entries| {
                    entries
                        .iter()
                        .filter(|(owner, _)| *owner == player)
                        .map(|(_, score)| *score)
                        .max()
                }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_window_returns_newest() {
        let platform = MemoryPlatform::default();
        for n in 0..5 {
            platform.push_signal(SignalChannel::Global, 9, "other", n as i64);
            platform.advance_clock(10);
        }
        platform.set_fetch_window(Some(2));

        let fetched = platform.fetch_signals(SignalChannel::Global).await.unwrap();
        let ids: Vec<u64> = fetched.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(platform.fetch_count(SignalChannel::Global), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let platform = MemoryPlatform::default();
        platform.fail_next(ApiError::new(ApiErrorCode::Forbidden, "nope"));

        let first = platform.set_record(1, 10).await;
        assert_eq!(first.unwrap_err().code, ApiErrorCode::Forbidden);
        platform.set_record(1, 10).await.unwrap();
        assert_eq!(platform.records(1), vec![(1, 10)]);
    }

    #[tokio::test]
    async fn test_best_record_and_unknown_board() {
        let platform = MemoryPlatform::new(3, "me");
        platform.set_record(4, 10).await.unwrap();
        platform.set_record(4, 30).await.unwrap();
        platform.set_record(4, 20).await.unwrap();

        assert_eq!(platform.my_best_record(4).await.unwrap(), Some(30));
        assert_eq!(platform.my_best_record(5).await.unwrap(), None);
        assert_eq!(
            platform.set_record(101, 1).await.unwrap_err().code,
            ApiErrorCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_user_signal_lands_in_recipient_inbox() {
        let platform = MemoryPlatform::new(3, "me");
        platform.send_user_signal(8, Value::from("hi")).await.unwrap();

        let inbox = platform.inbox(8);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_id, 3);
        assert_eq!(inbox[0].sender_name, "me");
        assert!(platform.fetch_signals(SignalChannel::User).await.unwrap().is_empty());
    }
}
