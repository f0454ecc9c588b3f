//! Repository implementations

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryArtifactRepository;
pub use sqlite::SqliteArtifactRepository;
