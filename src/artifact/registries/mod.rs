//! Remote sources the publishers fetch artifacts from

pub mod docker;

pub use docker::{DockerImage, DockerImageSource, DockerRegistryClient};
