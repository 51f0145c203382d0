//! SurrealDB schema migrations and initialization
//!
//! Sets up the release run and outcome tables together with the indexes the
//! storage contract relies on.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Helmsman tables in SurrealDB.
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Helmsman SurrealDB schema");

    init_release_runs_table(db).await?;
    init_release_outcomes_table(db).await?;

    info!("Helmsman schema initialization complete");
    Ok(())
}

/// Initialize `release_runs`.
///
/// Schema:
/// ```text
/// TABLE release_runs {
///   run_id:        STRING (unique)
///   repo_path:     STRING (indexed)
///   state:         STRING
///   active:        BOOL
///   active_slot:   STRING (unique: "active:<repo>" | "closed:<run_id>")
///   revision:      INT
///   created_at:    STRING (RFC 3339)
///   updated_at:    STRING (RFC 3339)
///   created_at_us: INT
///   updated_at_us: INT (indexed with repo_path)
///   payload:       STRING (JSON aggregate)
/// }
/// ```
///
/// The unique `active_slot` index is what makes "one active run per
/// repository" hold across processes.
async fn init_release_runs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing release_runs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS release_runs SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_release_run_id ON TABLE release_runs COLUMNS run_id UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_release_active_slot ON TABLE release_runs COLUMNS active_slot UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_release_repo_updated ON TABLE release_runs COLUMNS repo_path, updated_at_us;
    "#;

    db.query(sql).await?;
    info!("✓ release_runs table initialized");
    Ok(())
}

/// Initialize `release_outcomes`.
///
/// Schema:
/// ```text
/// TABLE release_outcomes {
///   outcome_id:     STRING (unique)
///   repository:     STRING (indexed)
///   recorded_at:    STRING (RFC 3339)
///   recorded_at_us: INT (indexed with repository)
///   payload:        STRING (JSON outcome)
/// }
/// ```
///
/// Append-only: the application never issues UPDATE or DELETE against it.
async fn init_release_outcomes_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing release_outcomes table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS release_outcomes SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_release_outcome_id ON TABLE release_outcomes COLUMNS outcome_id UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_release_outcome_repo ON TABLE release_outcomes COLUMNS repository, recorded_at_us;
    "#;

    db.query(sql).await?;
    info!("✓ release_outcomes table initialized");
    Ok(())
}
