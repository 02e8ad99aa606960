//! bugsync-core library.
//!
//! Reconciles bug-tracker query results against a remote analysis store.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern; the binary wraps them with `anyhow`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).
//! - **Collaborators**: everything that talks to the network sits behind a
//!   trait in [`client`]; the core never performs I/O itself.

pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod sync;

pub use client::{Analyzer, ClientError, RemoteStore, SecretProvider, Tracker, TrackerBugs};
pub use config::{ConfigError, Secrets, SyncConfig};
pub use sync::collect::{Collection, collect};
pub use sync::reconcile::{Decision, ReconcileOptions, SyncReport, decide, reconcile};
pub use sync::state::{BugSyncState, SyncSet};
pub use sync::{SyncError, run};
