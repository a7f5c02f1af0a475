#![forbid(unsafe_code)]
//! reef-core library.
//!
//! Git-native issue tracking: the canonical store is a line-oriented JSONL
//! snapshot inside the repository, synchronized through a dedicated git ref
//! rather than the working branch. An SQLite cache sits beside it for fast
//! reads and is rebuilt whenever the snapshot changes underneath it.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module seams, `anyhow::Result`
//!   at the application boundary.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`,
//!   `debug!`, `trace!`).

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod git;
pub mod id;
pub mod lock;
pub mod merge;
pub mod model;
pub mod sync;
pub mod workspace;
