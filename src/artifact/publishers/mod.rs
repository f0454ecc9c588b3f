//! Publisher implementations for each supported artifact type

pub mod docker;

pub use docker::DockerArtifactPublisher;
