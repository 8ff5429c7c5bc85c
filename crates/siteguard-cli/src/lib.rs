//! SiteGuard CLI - command line tools for the worksite tracking server.
//!
//! Binaries:
//! - send_fix: push a single position into the feed
//! - approach_scenario: simulate a machine passing a worker

pub mod client;
pub mod sim;

pub use client::SiteClient;
