// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! SQLite-backed ledger.
//!
//! The one-pending-per-pair rule is enforced by a partial unique index on
//! the normalized pair, so it holds even across processes sharing a file.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::agreement::BackendKind;

use super::{
    check_answer, check_create, normalized_pair, Actor, ExchangeRequest, ExchangeRequestView,
    Ledger, LedgerError, RequestStatus,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS exchange_requests (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        pair_low TEXT NOT NULL,
        pair_high TEXT NOT NULL,
        backend TEXT NOT NULL,
        sender_public_key TEXT NOT NULL,
        receiver_public_key TEXT,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_exchange_requests_pending_pair
        ON exchange_requests(pair_low, pair_high) WHERE status = 'pending';
    CREATE INDEX IF NOT EXISTS idx_exchange_requests_sender ON exchange_requests(sender_id);
    CREATE INDEX IF NOT EXISTS idx_exchange_requests_receiver ON exchange_requests(receiver_id);
";

const COLUMNS: &str = "id, sender_id, receiver_id, backend, sender_public_key, \
                       receiver_public_key, status, created_at";

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger persisted in a SQLite database.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Opens or creates a ledger database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory ledger (for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, LedgerError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteLedger {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Storage("ledger connection poisoned".to_string()))
    }
}

fn conversion_error(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, err.into())
}

fn row_to_request(row: &Row<'_>) -> rusqlite::Result<ExchangeRequest> {
    let id: String = row.get(0)?;
    let backend: String = row.get(3)?;
    let status: String = row.get(6)?;

    Ok(ExchangeRequest {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        backend: backend
            .parse::<BackendKind>()
            .map_err(|e| conversion_error(3, e))?,
        sender_public_key: row.get(4)?,
        receiver_public_key: row.get(5)?,
        status: status
            .parse::<RequestStatus>()
            .map_err(|e| conversion_error(6, e))?,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Ledger for SqliteLedger {
    fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        sender_public_key: &str,
        backend: BackendKind,
    ) -> Result<Uuid, LedgerError> {
        check_create(sender_id, receiver_id, sender_public_key)?;

        let request = ExchangeRequest::new(sender_id, receiver_id, sender_public_key, backend);
        let (low, high) = normalized_pair(sender_id, receiver_id);

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO exchange_requests
             (id, sender_id, receiver_id, pair_low, pair_high, backend, sender_public_key,
              receiver_public_key, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)",
            params![
                request.id.to_string(),
                request.sender_id,
                request.receiver_id,
                low,
                high,
                request.backend.as_str(),
                request.sender_public_key,
                request.status.as_str(),
                request.created_at as i64,
            ],
        );

        match inserted {
            Ok(_) => Ok(request.id),
            Err(e) if is_constraint_violation(&e) => Err(LedgerError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn list_for(&self, identity: &str) -> Result<Vec<ExchangeRequestView>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exchange_requests
             WHERE sender_id = ?1 OR receiver_id = ?1
             ORDER BY created_at, seq",
            COLUMNS
        ))?;

        let rows = stmt.query_map(params![identity], row_to_request)?;

        let mut views = Vec::new();
        for row in rows {
            let request = row?;
            let actor = if request.sender_id == identity {
                Actor::Sender
            } else {
                Actor::Receiver
            };
            views.push(ExchangeRequestView { actor, request });
        }
        Ok(views)
    }

    fn get(&self, request_id: Uuid) -> Result<Option<ExchangeRequest>, LedgerError> {
        let conn = self.lock()?;
        let request = conn
            .query_row(
                &format!("SELECT {} FROM exchange_requests WHERE id = ?1", COLUMNS),
                params![request_id.to_string()],
                row_to_request,
            )
            .optional()?;
        Ok(request)
    }

    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        acting_identity: &str,
        confirmed: bool,
        receiver_public_key: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut request = tx
            .query_row(
                &format!("SELECT {} FROM exchange_requests WHERE id = ?1", COLUMNS),
                params![request_id.to_string()],
                row_to_request,
            )
            .optional()?
            .ok_or(LedgerError::NotFound(request_id))?;

        check_answer(&request, acting_identity, confirmed, receiver_public_key)?;
        request.resolve(confirmed, receiver_public_key);

        let updated = tx.execute(
            "UPDATE exchange_requests SET status = ?1, receiver_public_key = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![
                request.status.as_str(),
                request.receiver_public_key,
                request_id.to_string(),
            ],
        )?;
        if updated != 1 {
            return Err(LedgerError::NotPending(request_id));
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_fields() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let id = ledger
            .create("alice", "bob", "QUFB", BackendKind::Classical)
            .unwrap();

        let request = ledger.get(id).unwrap().unwrap();
        assert_eq!(request.sender_id, "alice");
        assert_eq!(request.receiver_id, "bob");
        assert_eq!(request.backend, BackendKind::Classical);
        assert_eq!(request.sender_public_key, "QUFB");
        assert_eq!(request.receiver_public_key, None);
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn test_pending_index_blocks_reverse_pair() {
        let ledger = SqliteLedger::in_memory().unwrap();
        ledger.create("alice", "bob", "QUFB", BackendKind::Ecdh).unwrap();

        assert_eq!(
            ledger.create("bob", "alice", "QkJC", BackendKind::Ecdh),
            Err(LedgerError::AlreadyExists)
        );
    }

    #[test]
    fn test_terminal_requests_do_not_block() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let first = ledger.create("alice", "bob", "QUFB", BackendKind::Ecdh).unwrap();
        ledger
            .confirm_or_decline(first, "bob", true, Some("QkJC"))
            .unwrap();

        ledger.create("alice", "bob", "Q0ND", BackendKind::Ecdh).unwrap();
        let views = ledger.list_for("bob").unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].request.id, first);
        assert_eq!(views[0].request.status, RequestStatus::Confirmed);
        assert_eq!(views[1].request.status, RequestStatus::Pending);
    }

    #[test]
    fn test_only_receiver_may_answer() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let id = ledger.create("alice", "bob", "QUFB", BackendKind::Ecdh).unwrap();

        assert_eq!(
            ledger.confirm_or_decline(id, "alice", true, Some("QUFB")),
            Err(LedgerError::NotFound(id))
        );
        assert_eq!(
            ledger.confirm_or_decline(id, "carol", false, None),
            Err(LedgerError::NotFound(id))
        );
        assert!(ledger.get(id).unwrap().unwrap().is_pending());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.db");

        let id = {
            let ledger = SqliteLedger::open(&path).unwrap();
            let id = ledger.create("alice", "bob", "QUFB", BackendKind::Ecdh).unwrap();
            ledger.confirm_or_decline(id, "bob", false, None).unwrap();
            id
        };

        let ledger = SqliteLedger::open(&path).unwrap();
        let request = ledger.get(id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Declined);
        assert_eq!(
            ledger.confirm_or_decline(id, "bob", true, Some("QkJC")),
            Err(LedgerError::NotPending(id))
        );
    }

    #[test]
    fn test_waits_for_other_writers() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let timeout: i64 = ledger
            .lock()
            .unwrap()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, BUSY_TIMEOUT.as_millis() as i64);
    }
}
