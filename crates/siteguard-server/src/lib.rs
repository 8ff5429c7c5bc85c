//! Shared library surface for the tracking server and its tests.

pub mod alerts;
pub mod api;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod session;
pub mod state;
