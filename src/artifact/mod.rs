//! Artifact domain layer
//!
//! This module provides the building blocks the sync engine works with:
//! artifact and version records, the versioning strategies that order them,
//! the publishers that fetch them from their sources, and the repositories
//! that persist them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Publisher  │────▶│ Repository  │◀────│ Versioning  │
//! │  (fetch)    │     │  (storage)  │     │  (compare)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       │
//!        ▼                                       ▼
//! ┌─────────────┐                         ┌─────────────┐
//! │ Registries  │                         │ Strategies  │
//! │  (docker)   │                         │(semver,tags)│
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: Artifacts, published observations, stored versions
//! - [`versioning`]: Versioning strategy trait and the serializable strategy selector
//! - [`strategies`]: Concrete strategies (semver, docker tag conventions)
//! - [`publisher`]: Publisher trait for fetching and describing artifacts from a source
//! - [`publishers`]: Concrete publishers (docker)
//! - [`registries`]: Remote clients the publishers fetch through
//! - [`repository`]: Persistence traits for artifacts, versions and delivery configs
//! - [`repositories`]: In-memory and SQLite repositories
//! - [`error`]: Error types for repository, registry and publisher operations

pub mod error;
pub mod publisher;
pub mod publishers;
pub mod registries;
pub mod repositories;
pub mod repository;
pub mod strategies;
pub mod types;
pub mod versioning;
