//! SurrealDB Handle - Connection management
//!
//! Supports in-memory (`mem://`), explicit URL, and local on-disk
//! (`surrealkv://`) connections. The schema is initialised on connect.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::info;

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Default namespace and database used by Helmsman.
pub const NAMESPACE: &str = "helmsman";
pub const DATABASE: &str = "main";

/// Default on-disk location when no URL is configured.
pub const LOCAL_DB_PATH: &str = ".helmsman/db";

/// Shared SurrealDB connection.
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to an in-memory database (tests, dry runs).
    pub async fn in_memory() -> Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to the given endpoint, select the Helmsman namespace, and
    /// initialise the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!(url = %url, "SurrealHandle connected");
        Ok(Self { db })
    }

    /// Connect using `SURREALDB_URL`, falling back to local persistence in
    /// `.helmsman/db`.
    pub async fn from_env() -> Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        std::fs::create_dir_all(LOCAL_DB_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                LOCAL_DB_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", LOCAL_DB_PATH);
        info!(
            "No SURREALDB_URL found, using local persistence: {}",
            url
        );
        Self::connect(&url).await
    }

    pub fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}
