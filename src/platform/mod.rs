//! Host platform API surface
//!
//! Each API family is a trait whose methods return boxed `'static` futures,
//! so handlers can move a call into the suspension bridge without borrowing
//! the session.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::runtime::error::ApiResult;
use crate::runtime::value::Value;
use crate::signal::{Signal, SignalChannel};

pub mod memory;

pub use memory::MemoryPlatform;

/// Largest scoreboard id the platform accepts.
pub const MAX_BOARD_ID: u32 = 100;

/// Signal family: fetch the current window of signals, send new ones.
pub trait SignalApi: Send + Sync {
    /// Fetch the signals currently visible on `channel`, in any order.
    fn fetch_signals(&self, channel: SignalChannel) -> BoxFuture<'static, ApiResult<Vec<Signal>>>;

    /// Broadcast a signal to every player.
    fn send_global_signal(&self, data: Value) -> BoxFuture<'static, ApiResult<()>>;

    /// Send a signal to one player.
    fn send_user_signal(&self, recipient: u64, data: Value) -> BoxFuture<'static, ApiResult<()>>;
}

/// Scoreboard family.
pub trait ScoreboardApi: Send + Sync {
    /// Submit a score to a board.
    fn set_record(&self, board_id: u32, score: i64) -> BoxFuture<'static, ApiResult<()>>;

    /// The current player's best score on a board, if any.
    fn my_best_record(&self, board_id: u32) -> BoxFuture<'static, ApiResult<Option<i64>>>;
}

/// Handles to every platform API family a session may call.
#[derive(Clone)]
pub struct Platform {
    /// Signal API.
    pub signals: Arc<dyn SignalApi>,
    /// Scoreboard API.
    pub scoreboards: Arc<dyn ScoreboardApi>,
}

impl Platform {
    /// Use one implementation for every family.
    pub fn from_shared<P>(platform: Arc<P>) -> Self
    where
        P: SignalApi + ScoreboardApi + 'static,
    {
        Self {
            signals: platform.clone(),
            scoreboards: platform,
        }
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
