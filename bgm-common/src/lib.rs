//! # BGM Common Library
//!
//! Shared code for the background-music player:
//! - Configuration loading (TOML + environment + CLI precedence)
//! - Source descriptors and the source-selection policy
//! - Playback state and event types (PlayerEvent, EventBus)
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod source;

pub use error::{Error, Result};
pub use source::{select_source, SourceDescriptor, SourceKind};
