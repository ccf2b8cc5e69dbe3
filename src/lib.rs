//! Shimkit – platform API plugin shims for a cooperative script interpreter
//!
//! This crate exposes platform services (signals, scoreboards) as script
//! commands with:
//! - A suspension bridge that parks an interpreter on an asynchronous
//!   platform call and resumes it exactly once, on the next step after the
//!   call settles
//! - A de-duplicating signal queue that reconciles overlapping remote
//!   fetches, behind a process-wide fetch throttle
//! - A typed command registry with localized aliases
//! - An in-memory platform for tests and local runs

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Platform API traits and the in-memory implementation
pub mod platform;
/// Bundled plugin commands
pub mod plugins;
/// Sessions, interpreters and the suspension bridge
pub mod runtime;
/// Signal queue and fetch throttle
pub mod signal;

// Re-export key types for convenience
pub use runtime::{RuntimeConfig, Session};

/// Current version of the shimkit crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
