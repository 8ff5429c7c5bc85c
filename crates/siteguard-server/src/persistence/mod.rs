//! Record store for worksites, workers and machines.
//!
//! SQLite-backed; the in-memory fusion cache is loaded from it at startup and
//! written through on registration and on every local location publish.

pub mod db;
pub mod entities;
pub mod worksites;

pub use db::{init_database, Database};
