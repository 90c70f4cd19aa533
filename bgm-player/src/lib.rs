//! # BGM Player Library (bgm-player)
//!
//! Background-music playback orchestrator.
//!
//! **Purpose:** Pick among a direct stream URL, a media-host reference that
//! needs resolution, or a local file; resolve streams ahead of need; and drive
//! playback through a local-loop or a streaming backend with at most one
//! active session.
//!
//! **Architecture:** capability traits for every engine, detached worker
//! threads for resolution and download, one [`AudioOrchestrator`] owning all
//! shared state.

pub mod backends;
pub mod capabilities;
pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod preparer;
pub mod tools;

pub use error::{PlayerError, Result};
pub use orchestrator::{AudioOrchestrator, BackgroundTask, Capabilities};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
///
/// Every guarded slot is last-writer-wins, so a poisoned value is still valid.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
