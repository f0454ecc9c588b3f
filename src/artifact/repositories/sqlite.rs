use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::artifact::error::RepositoryError;
use crate::artifact::repository::{ArtifactRepository, DeliveryConfigRepository};
use crate::artifact::types::{
    ArtifactKey, ArtifactType, ArtifactVersion, BuildMetadata, DeliveryArtifact, DeliveryConfig,
    GitMetadata, ReleaseStatus,
};

pub struct SqliteArtifactRepository {
    conn: Mutex<Connection>,
}

impl SqliteArtifactRepository {
    pub fn new(db_path: &Path) -> Result<Self, RepositoryError> {
        info!("Initializing artifact database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let repository = Self {
            conn: Mutex::new(conn),
        };

        repository.create_schema()?;
        info!("Artifact database initialized successfully");

        Ok(repository)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    fn create_schema(&self) -> Result<(), RepositoryError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS delivery_configs (
                name TEXT PRIMARY KEY,
                application TEXT NOT NULL,
                service_account TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                reference TEXT NOT NULL,
                delivery_config_name TEXT NOT NULL DEFAULT '',
                versioning TEXT NOT NULL,
                UNIQUE(name, type, reference, delivery_config_name)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_artifacts_name_type ON artifacts(name, type)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS artifact_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                version TEXT NOT NULL,
                release_status TEXT NOT NULL,
                build_number INTEGER,
                git_commit TEXT,
                stored_at INTEGER NOT NULL,
                UNIQUE(name, type, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_artifact_versions_name_type ON artifact_versions(name, type)",
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }

    fn query_artifacts(
        conn: &Connection,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<DeliveryArtifact>, RepositoryError> {
        let query = format!(
            "SELECT name, type, reference, delivery_config_name, versioning FROM artifacts {} ORDER BY id",
            filter
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
            .query_map(params, ArtifactRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ArtifactRow::into_artifact).collect()
    }
}

/// Raw `artifacts` row, versioning still serialized
struct ArtifactRow {
    name: String,
    artifact_type: String,
    reference: String,
    delivery_config_name: String,
    versioning: String,
}

impl ArtifactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            artifact_type: row.get(1)?,
            reference: row.get(2)?,
            delivery_config_name: row.get(3)?,
            versioning: row.get(4)?,
        })
    }

    fn into_artifact(self) -> Result<DeliveryArtifact, RepositoryError> {
        Ok(DeliveryArtifact {
            name: self.name,
            artifact_type: ArtifactType::new(&self.artifact_type),
            reference: self.reference,
            delivery_config_name: Some(self.delivery_config_name).filter(|n| !n.is_empty()),
            versioning_strategy: serde_json::from_str(&self.versioning)?,
        })
    }
}

impl ArtifactRepository for SqliteArtifactRepository {
    fn register(&self, artifact: &DeliveryArtifact) -> Result<bool, RepositoryError> {
        let versioning = serde_json::to_string(&artifact.versioning_strategy)?;
        let conn = self.lock_conn()?;

        let rows_inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO artifacts (name, type, reference, delivery_config_name, versioning)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            (
                &artifact.name,
                artifact.artifact_type.as_str(),
                &artifact.reference,
                artifact.delivery_config_name.as_deref().unwrap_or_default(),
                versioning,
            ),
        )?;

        if rows_inserted > 0 {
            debug!("Registered artifact {}", artifact);
        }
        Ok(rows_inserted > 0)
    }

    fn is_registered(
        &self,
        name: &str,
        artifact_type: &ArtifactType,
    ) -> Result<bool, RepositoryError> {
        let conn = self.lock_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artifacts WHERE name = ?1 AND type = ?2)",
            (name, artifact_type.as_str()),
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn store(&self, version: &ArtifactVersion) -> Result<bool, RepositoryError> {
        let key = &version.artifact;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let registered: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM artifacts WHERE name = ?1 AND type = ?2)",
            (&key.name, key.artifact_type.as_str()),
            |row| row.get(0),
        )?;
        if !registered {
            return Err(RepositoryError::NotRegistered(key.clone()));
        }

        // UNIQUE(name, type, version) makes a known version a no-op
        let rows_inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO artifact_versions
                (name, type, version, release_status, build_number, git_commit, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            (
                &key.name,
                key.artifact_type.as_str(),
                &version.version,
                version.release_status.as_str(),
                version.build.map(|b| b.id as i64),
                version.git.as_ref().map(|g| g.commit.as_str()),
                version.stored_at.timestamp_millis(),
            ),
        )?;

        tx.commit()?;
        Ok(rows_inserted > 0)
    }

    fn versions(&self, artifact: &DeliveryArtifact) -> Result<Vec<String>, RepositoryError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT version FROM artifact_versions WHERE name = ?1 AND type = ?2 ORDER BY id",
        )?;

        let versions = stmt
            .query_map((&artifact.name, artifact.artifact_type.as_str()), |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(versions)
    }

    fn get_version(
        &self,
        artifact: &ArtifactKey,
        version: &str,
    ) -> Result<Option<ArtifactVersion>, RepositoryError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT release_status, build_number, git_commit, stored_at
                FROM artifact_versions
                WHERE name = ?1 AND type = ?2 AND version = ?3
                "#,
                (&artifact.name, artifact.artifact_type.as_str(), version),
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(status, build_number, commit, stored_at)| ArtifactVersion {
            artifact: artifact.clone(),
            version: version.to_string(),
            release_status: status.parse().unwrap_or(ReleaseStatus::Unknown),
            build: build_number.map(|id| BuildMetadata { id: id as u64 }),
            git: commit.map(|commit| GitMetadata { commit }),
            stored_at: DateTime::<Utc>::from_timestamp_millis(stored_at).unwrap_or_default(),
        }))
    }

    fn get_artifacts(&self, key: &ArtifactKey) -> Result<Vec<DeliveryArtifact>, RepositoryError> {
        let conn = self.lock_conn()?;
        Self::query_artifacts(
            &conn,
            "WHERE name = ?1 AND type = ?2",
            &[&key.name, &key.artifact_type.as_str()],
        )
    }

    fn get_all_artifacts(&self) -> Result<Vec<DeliveryArtifact>, RepositoryError> {
        let conn = self.lock_conn()?;
        Self::query_artifacts(&conn, "", &[])
    }
}

impl DeliveryConfigRepository for SqliteArtifactRepository {
    fn store_delivery_config(&self, config: &DeliveryConfig) -> Result<(), RepositoryError> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO delivery_configs (name, application, service_account, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                application = excluded.application,
                service_account = excluded.service_account,
                updated_at = excluded.updated_at
            "#,
            (
                &config.name,
                &config.application,
                &config.service_account,
                Utc::now().timestamp_millis(),
            ),
        )?;
        Ok(())
    }

    fn get_delivery_config(&self, name: &str) -> Result<DeliveryConfig, RepositoryError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT application, service_account FROM delivery_configs WHERE name = ?1",
                [name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((application, service_account)) = row else {
            return Err(RepositoryError::DeliveryConfigNotFound(name.to_string()));
        };

        let artifacts =
            Self::query_artifacts(&conn, "WHERE delivery_config_name = ?1", &[&name])?;

        Ok(DeliveryConfig {
            name: name.to_string(),
            application,
            service_account,
            artifacts,
        })
    }
}
