// src/db/models.rs

//! Installed package records

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// A package recorded as installed in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            installed_at: Utc::now(),
        }
    }

    /// Insert or replace the row for this package
    pub fn upsert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installed_packages (name, version, installed_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                version = excluded.version,
                installed_at = excluded.installed_at",
            params![&self.name, &self.version, self.installed_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT name, version, installed_at FROM installed_packages WHERE name = ?1",
        )?;
        let package = stmt.query_row([name], Self::from_row).optional()?;
        Ok(package)
    }

    /// All rows in name order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT name, version, installed_at FROM installed_packages ORDER BY name")?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let installed_at: String = row.get(2)?;
        let installed_at = DateTime::parse_from_rfc3339(&installed_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        Ok(Self {
            name: row.get(0)?,
            version: row.get(1)?,
            installed_at,
        })
    }
}
