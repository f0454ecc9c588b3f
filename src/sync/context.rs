//! Tracing context propagated into spawned sync tasks
//!
//! Every unit of sync work runs under a [`TracingContext`] identifying the
//! artifact it handles. The context is a plain value moved into the task, so
//! concurrently running tasks can never observe each other's identifiers.

use std::fmt;
use std::future::Future;

use serde::Serialize;
use tracing::instrument::Instrumented;
use tracing::{Instrument, Span, info_span};

use crate::artifact::types::ArtifactKey;

/// What started a unit of sync work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncTrigger {
    Published,
    Registered,
    Sweep,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Published => "published",
            SyncTrigger::Registered => "registered",
            SyncTrigger::Sweep => "sweep",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingContext {
    artifact_id: String,
    trigger: SyncTrigger,
}

impl TracingContext {
    pub fn for_artifact(artifact: &ArtifactKey, trigger: SyncTrigger) -> Self {
        Self {
            artifact_id: artifact.to_string(),
            trigger,
        }
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.trigger
    }

    /// Span carrying this context's identifiers on every event logged inside it
    pub fn span(&self) -> Span {
        info_span!(
            "artifact_sync",
            artifact_id = %self.artifact_id,
            trigger = %self.trigger
        )
    }

    /// Attach this context to a future
    pub fn attach<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(self.span())
    }
}
