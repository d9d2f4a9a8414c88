//! Versioned schema for trajectory stores.
//!
//! The applied version lives in SQLite's `user_version` pragma. Each step
//! runs in its own transaction together with the version bump.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// `(version, summary, sql)`, ascending. New steps go at the end.
const STEPS: &[(u32, &str, &str)] = &[(
    1,
    "trajectory records with embeddings and metadata",
    "CREATE TABLE trajectories (
         id               INTEGER PRIMARY KEY AUTOINCREMENT,
         content          TEXT NOT NULL,
         embedding        BLOB NOT NULL,
         task_name        TEXT,
         task_description TEXT,
         task_trajectory  TEXT,
         created_at       INTEGER NOT NULL
     );
     CREATE INDEX idx_trajectories_created ON trajectories(created_at);",
)];

/// Bring the schema up to the newest version.
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    let start = current_version(conn)?;
    let mut version = start;
    for &(step, summary, sql) in STEPS.iter().filter(|(v, _, _)| *v > start) {
        info!(version = step, summary, "migrating trajectory store");
        let fail = |e: rusqlite::Error| StoreError::Migration {
            version: step,
            message: e.to_string(),
        };
        let tx = conn.transaction().map_err(fail)?;
        tx.execute_batch(sql).map_err(fail)?;
        tx.pragma_update(None, "user_version", step).map_err(fail)?;
        tx.commit().map_err(fail)?;
        version = step;
    }
    debug!(version, "trajectory schema ready");
    Ok(())
}

/// The applied schema version; 0 for a new database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("cannot read user_version: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_ascend() {
        assert!(STEPS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);
        run_all(&mut conn).unwrap();
        run_all(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), STEPS[STEPS.len() - 1].0);
    }

    #[test]
    fn fresh_database_gets_trajectory_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'trajectories'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
