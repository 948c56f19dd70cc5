// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! SQLite-backed parameter registry.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_parameters, DhParameterSet, ParameterRegistry, RegistryError};
use crate::unix_millis;

/// Parameter registry persisted in a SQLite database.
pub struct SqliteParameterRegistry {
    conn: Mutex<Connection>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl SqliteParameterRegistry {
    /// Opens or creates a registry database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Creates an in-memory registry (for testing).
    pub fn in_memory() -> Result<Self, RegistryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RegistryError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS dh_parameters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parameters BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dh_parameters_created ON dh_parameters(created_at);",
        )?;
        Ok(SqliteParameterRegistry {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RegistryError> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Storage("registry connection poisoned".to_string()))
    }
}

impl ParameterRegistry for SqliteParameterRegistry {
    fn submit_parameters(&self, parameters: &[u8]) -> Result<u64, RegistryError> {
        parse_parameters(parameters)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO dh_parameters (parameters, created_at) VALUES (?1, ?2)",
            params![parameters, unix_millis() as i64],
        )?;
        Ok(conn.last_insert_rowid() as u64)
    }

    fn latest_parameters(&self) -> Result<DhParameterSet, RegistryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, parameters, created_at FROM dh_parameters
             ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| {
                Ok(DhParameterSet {
                    id: row.get::<_, i64>(0)? as u64,
                    parameters: row.get(1)?,
                    created_at: row.get::<_, i64>(2)? as u64,
                })
            },
        )
        .optional()?
        .ok_or(RegistryError::NotFound)
    }
}
