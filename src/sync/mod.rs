//! Synchronization layer
//!
//! This module keeps the stored version history of every registered
//! artifact in step with what its source has published.
//!
//! # Modules
//!
//! - [`context`]: Per-task tracing context carried into spawned sync work
//! - [`coordinator`]: Push, backfill and sweep entry points
//! - [`dispatch`]: Selects the publisher claiming an artifact type
//! - [`error`]: Errors raised while syncing
//! - [`events`]: Inbound lifecycle/artifact events and outbound notifications
//! - [`scheduler`]: Periodic sweep task
//! - [`server`]: Process wiring, logging and lifecycle

pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod server;

pub use coordinator::{ArtifactSyncCoordinator, ArtifactSyncResult, SweepReport, SyncOutcome};
pub use dispatch::PublisherRegistry;
pub use error::{DispatchError, SyncError};
