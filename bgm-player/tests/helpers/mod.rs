//! Test helper modules for bgm-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - Fake engines: recording players, gated resolver, scripted downloader
//! - ToolDir: temporary directory of fake executables for tool lookup
//! - TestRig: orchestrator wired to fakes

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{
    DownloadBehavior, FakeBundle, FakeDownloader, FakeLocalPlayer, FakeResolver,
    FakeStreamPlayer, Gate,
};
pub use fixtures::{sample_media, wait_until, TestRig, ToolDir};
