pub mod migrations;
pub mod query;
pub mod repository;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::AppError;

/// Process-wide handle to the embedded bookmark store. Opened once at
/// startup, shared by clone, and released with [`Database::close`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::run_migrations(&conn)?;
        log::info!("opened bookmark store at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Runs `f` against the connection while holding the lock.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let conn = guard.as_mut().ok_or(AppError::StoreClosed)?;
        f(conn)
    }

    /// Closes the underlying connection. Clones observe the store as closed.
    pub fn close(&self) -> Result<(), AppError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, err)| AppError::Store(err))?;
            log::info!("closed bookmark store");
        }
        Ok(())
    }
}
