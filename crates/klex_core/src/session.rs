//! The single live connection and its manual transaction state.
//!
//! # Responsibility
//! - Own the one `rusqlite::Connection` handed over by the connect step.
//! - Expose statement primitives plus explicit `commit`/`rollback`.
//!
//! # Invariants
//! - Auto-commit is off for the lifetime of the session: the first statement
//!   executed while `Idle` opens a transaction, and only `commit()` makes it
//!   durable.
//! - The lock is held for one statement (or one query's row iteration) at a
//!   time. Two units of work running in parallel share the same open
//!   transaction and may interleave their statements.
//! - After `close()`, every statement fails with `DbError::SessionClosed`.
//! - A panic in one unit of work never locks the session for later units.
//! - Nothing here retries or reconnects.

use crate::db::{DbError, DbResult};
use log::{debug, info, warn};
use rusqlite::{Connection, Params, Row};
use std::sync::{Mutex, MutexGuard};

/// Manual transaction state of the shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No statement has run since the last commit/rollback.
    Idle,
    /// At least one statement ran; changes are pending until commit.
    Open,
}

struct SessionInner {
    conn: Option<Connection>,
    state: TransactionState,
    statements_in_tx: u64,
}

/// Shared connection session, safe to reference from every pool worker.
pub struct ConnectionSession {
    inner: Mutex<SessionInner>,
}

impl ConnectionSession {
    /// Wraps a live connection. Any transaction the connection already has
    /// open is left to the caller.
    pub fn new(conn: Connection) -> Self {
        info!("event=session_open module=session status=ok");
        Self {
            inner: Mutex::new(SessionInner {
                conn: Some(conn),
                state: TransactionState::Idle,
                statements_in_tx: 0,
            }),
        }
    }

    /// Runs one INSERT/UPDATE/DELETE and returns the affected row count.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        let mut guard = self.lock();
        let conn = begin_if_idle(&mut guard)?;
        let changed = conn.execute(sql, params)?;
        Ok(changed)
    }

    /// Runs one SELECT and maps every row.
    ///
    /// The session lock is held while rows are mapped, so `map` must not call
    /// back into the session. Nested fetches happen after this returns.
    pub fn query<T, E, P, F>(&self, sql: &str, params: P, mut map: F) -> Result<Vec<T>, E>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<T, E>,
        E: From<DbError> + From<rusqlite::Error>,
    {
        let mut guard = self.lock();
        let conn = begin_if_idle(&mut guard)?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            mapped.push(map(row)?);
        }
        Ok(mapped)
    }

    /// Runs one SELECT expected to yield at most one row.
    pub fn query_optional<T, E, P, F>(&self, sql: &str, params: P, map: F) -> Result<Option<T>, E>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<T, E>,
        E: From<DbError> + From<rusqlite::Error>,
    {
        let mut rows = self.query(sql, params, map)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.swap_remove(0)))
        }
    }

    /// Makes every pending change durable. A no-op while `Idle`.
    ///
    /// If the store rejects the commit (e.g. a deferred foreign key check),
    /// the transaction stays open and the caller must `rollback()`.
    pub fn commit(&self) -> DbResult<()> {
        let mut guard = self.lock();
        if guard.state == TransactionState::Idle {
            return Ok(());
        }
        let statements = guard.statements_in_tx;
        let conn = guard.conn.as_ref().ok_or(DbError::SessionClosed)?;
        if let Err(err) = conn.execute_batch("COMMIT;") {
            warn!(
                "event=tx_commit module=session status=error statements={} error={}",
                statements, err
            );
            return Err(err.into());
        }
        guard.state = TransactionState::Idle;
        guard.statements_in_tx = 0;
        info!("event=tx_commit module=session status=ok statements={statements}");
        Ok(())
    }

    /// Discards every pending change. A no-op while `Idle`.
    pub fn rollback(&self) -> DbResult<()> {
        let mut guard = self.lock();
        rollback_locked(&mut guard)
    }

    /// Rolls back any open transaction, then releases the connection.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> DbResult<()> {
        let mut guard = self.lock();
        if guard.conn.is_none() {
            return Ok(());
        }
        let rollback_result = rollback_locked(&mut guard);
        if let Some(conn) = guard.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("event=session_close module=session status=error error={err}");
                return Err(err.into());
            }
        }
        info!("event=session_close module=session status=ok");
        rollback_result
    }

    /// Current manual transaction state.
    pub fn transaction_state(&self) -> DbResult<TransactionState> {
        Ok(self.lock().state)
    }

    /// Whether `close()` has already released the connection.
    pub fn is_closed(&self) -> bool {
        self.lock().conn.is_none()
    }

    /// Recovers the guard after a unit panicked while holding it.
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("event=session_lock module=session status=recovered reason=poisoned");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }
}

fn begin_if_idle<'a>(inner: &'a mut SessionInner) -> DbResult<&'a Connection> {
    let conn = inner.conn.as_ref().ok_or(DbError::SessionClosed)?;
    if inner.state == TransactionState::Idle {
        conn.execute_batch("BEGIN DEFERRED;")?;
        inner.state = TransactionState::Open;
        debug!("event=tx_begin module=session status=ok");
    }
    inner.statements_in_tx += 1;
    Ok(conn)
}

fn rollback_locked(inner: &mut SessionInner) -> DbResult<()> {
    if inner.state == TransactionState::Idle {
        return Ok(());
    }
    let statements = inner.statements_in_tx;
    let conn = inner.conn.as_ref().ok_or(DbError::SessionClosed)?;
    conn.execute_batch("ROLLBACK;")?;
    inner.state = TransactionState::Idle;
    inner.statements_in_tx = 0;
    info!("event=tx_rollback module=session status=ok statements={statements}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConnectionSession, TransactionState};
    use crate::db::DbError;
    use rusqlite::Connection;

    fn scratch_session() -> ConnectionSession {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL);")
            .unwrap();
        ConnectionSession::new(conn)
    }

    fn count(session: &ConnectionSession) -> i64 {
        session
            .query::<i64, DbError, _, _>("SELECT COUNT(*) FROM t;", [], |row| {
                Ok(row.get(0)?)
            })
            .unwrap()[0]
    }

    #[test]
    fn first_statement_opens_transaction_and_commit_returns_to_idle() {
        let session = scratch_session();
        assert_eq!(session.transaction_state().unwrap(), TransactionState::Idle);

        session.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        assert_eq!(session.transaction_state().unwrap(), TransactionState::Open);

        session.commit().unwrap();
        assert_eq!(session.transaction_state().unwrap(), TransactionState::Idle);
        assert_eq!(count(&session), 1);
    }

    #[test]
    fn rollback_discards_uncommitted_statements() {
        let session = scratch_session();
        session.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        session.execute("INSERT INTO t (v) VALUES (2);", []).unwrap();
        session.rollback().unwrap();

        assert_eq!(session.transaction_state().unwrap(), TransactionState::Idle);
        assert_eq!(count(&session), 0);
    }

    #[test]
    fn commit_and_rollback_are_noops_when_idle() {
        let session = scratch_session();
        session.commit().unwrap();
        session.rollback().unwrap();
        assert_eq!(session.transaction_state().unwrap(), TransactionState::Idle);
    }

    #[test]
    fn close_rejects_later_statements() {
        let session = scratch_session();
        session.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        session.close().unwrap();
        session.close().unwrap();

        assert!(session.is_closed());
        let err = session
            .execute("INSERT INTO t (v) VALUES (2);", [])
            .unwrap_err();
        assert!(matches!(err, DbError::SessionClosed));
    }

    #[test]
    fn panicking_row_mapper_leaves_the_session_usable() {
        let session = scratch_session();
        session.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            session.query::<i64, DbError, _, _>("SELECT v FROM t;", [], |_row| {
                panic!("mapper failed")
            })
        }));
        assert!(outcome.is_err());

        assert_eq!(session.transaction_state().unwrap(), TransactionState::Open);
        session.rollback().unwrap();
        assert_eq!(count(&session), 0);
        session.close().unwrap();
    }
}
