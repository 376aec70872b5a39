// src/db/mod.rs

//! Install-state store
//!
//! Records which version of each package was installed into the
//! destination, so a later run can skip packages that are already current.

pub mod models;
pub mod schema;

pub use models::InstalledPackage;

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Package name to installed version store
pub trait InstallState: Send + Sync {
    /// Version currently recorded for `name`
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Record `name` as installed at `version`
    fn record_installed(&self, name: &str, version: &str) -> Result<()>;

    /// All recorded packages in name order
    fn installed(&self) -> Result<Vec<InstalledPackage>>;

    /// Whether `name` is recorded at exactly `version`
    fn is_current(&self, name: &str, version: &str) -> Result<bool> {
        Ok(self.installed_version(name)?.as_deref() == Some(version))
    }
}

/// SQLite-backed store
pub struct SqliteState {
    conn: Mutex<Connection>,
}

impl SqliteState {
    /// Open (or create) the database at `path` and apply migrations
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::DatabaseError(format!(
                    "Failed to create directory for {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        schema::migrate(&conn)?;
        debug!("Opened install-state database {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::DatabaseError("Install-state connection poisoned".to_string()))
    }
}

impl InstallState for SqliteState {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        Ok(InstalledPackage::find_by_name(&conn, name)?.map(|p| p.version))
    }

    fn record_installed(&self, name: &str, version: &str) -> Result<()> {
        let conn = self.conn()?;
        InstalledPackage::new(name, version).upsert(&conn)
    }

    fn installed(&self) -> Result<Vec<InstalledPackage>> {
        let conn = self.conn()?;
        InstalledPackage::list_all(&conn)
    }
}

/// In-memory store for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryState {
    packages: Mutex<BTreeMap<String, InstalledPackage>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn packages(&self) -> Result<MutexGuard<'_, BTreeMap<String, InstalledPackage>>> {
        self.packages
            .lock()
            .map_err(|_| Error::DatabaseError("Install-state map poisoned".to_string()))
    }
}

impl InstallState for MemoryState {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.packages()?.get(name).map(|p| p.version.clone()))
    }

    fn record_installed(&self, name: &str, version: &str) -> Result<()> {
        self.packages()?
            .insert(name.to_string(), InstalledPackage::new(name, version));
        Ok(())
    }

    fn installed(&self) -> Result<Vec<InstalledPackage>> {
        Ok(self.packages()?.values().cloned().collect())
    }
}
