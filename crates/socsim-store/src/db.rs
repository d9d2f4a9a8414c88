//! SQLite database setup.
//!
//! A [`Database`] is one trajectory store. The connection sits behind a
//! mutex and every statement runs on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Shared handle to one store's connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open a database at `path`, discarding whatever was there before.
    ///
    /// Any existing database file and its `-wal` / `-shm` siblings are
    /// removed first, so every store starts empty.
    pub async fn open_fresh(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || -> StoreResult<Self> {
            purge(&path)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            info!(path = %path.display(), "opening fresh database");
            let conn = Connection::open(&path)?;
            Self::apply_pragmas(&conn, true)?;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        })
        .await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database without running migrations.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn, false)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database with the full schema.
    pub async fn open_in_memory_and_migrate() -> StoreResult<Self> {
        let db = Self::open_in_memory()?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            migration::run_all(&mut conn)
        })
        .await?
    }

    /// Execute a closure against the connection on the blocking pool.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection, on_disk: bool) -> StoreResult<()> {
        if on_disk {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;
        debug!(on_disk, "database pragmas applied");
        Ok(())
    }
}

/// Remove a database file and its WAL companions if present.
fn purge(path: &Path) -> StoreResult<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        targets.push(PathBuf::from(name));
    }
    for target in targets {
        match std::fs::remove_file(&target) {
            Ok(()) => debug!(path = %target.display(), "purged existing store file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn count(db: &Database) -> i64 {
        db.execute(|conn| Ok(conn.query_row("SELECT count(*) FROM trajectories", [], |r| r.get(0))?))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn poisoned_connection_is_reported() {
        let db = Database::open_in_memory_and_migrate().await.unwrap();
        let conn = Arc::clone(&db.conn);
        let _ = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            panic!("holder died");
        })
        .join();

        let err = db.execute(|_| Ok(())).await.unwrap_err();
        assert!(matches!(err, StoreError::Poisoned(_)));
    }

    #[tokio::test]
    async fn in_memory_has_schema() {
        let db = Database::open_in_memory_and_migrate().await.unwrap();
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn open_fresh_purges_existing_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dilu").join("store.sqlite3");

        let db = Database::open_fresh(&path).await.unwrap();
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO trajectories (content, embedding, created_at) VALUES ('x', x'00000000', 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(count(&db).await, 1);
        drop(db);

        let reopened = Database::open_fresh(&path).await.unwrap();
        assert_eq!(count(&reopened).await, 0);
    }
}
