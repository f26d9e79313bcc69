//! Financial news sentiment store with duplicate detection and replica sync.
//!
//! The interesting parts live in two places:
//! - [`dedup`]: layered duplicate detection (URL, content fingerprint,
//!   similarity scoring) and batch cleanup of an article store.
//! - [`sync`]: discrepancy detection and directional reconciliation between
//!   two independently-written copies of the same logical database (a local
//!   SQLite store and a server-grade Postgres store).
//!
//! RSS polling, sentiment model internals, and the dashboard are external
//! collaborators; this crate consumes them through narrow interfaces
//! ([`sentiment::SentimentScorer`], [`storage::Database`],
//! [`sync::ReplicaConnection`]).

pub mod config;
pub mod dedup;
pub mod sentiment;
pub mod storage;
pub mod sync;
