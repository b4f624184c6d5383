//! An in-memory database connection with real transaction semantics.

use crate::db::{DbConnection, DbError};
use crate::orm::Criteria;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};

type Tables = IndexMap<String, Vec<Map<String, Value>>>;

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// One entry per nesting level; `None` for a nested level without a savepoint.
    snapshots: Vec<Option<Tables>>,
    savepoints: bool,
    connected: bool,
    next_ids: IndexMap<String, i64>,
    injected: Option<(DbError, usize)>,
    rollback_attempts: usize,
    closes: usize,
}

/// A transactional in-memory store.
///
/// `begin` snapshots the tables; rolling back the outermost level restores
/// the snapshot. Nested levels create savepoints only when savepoints are
/// enabled; without them a nested rollback just leaves the level. Any
/// statement on a closed connection reconnects it.
///
/// # Example
///
/// ```rust
/// use rehearsal_core::db::DbConnection;
/// use rehearsal_core::fixtures::MemoryConnection;
/// use serde_json::json;
///
/// let db = MemoryConnection::new();
/// db.begin().unwrap();
/// db.insert("articles", json!({"title": "draft"}).as_object().unwrap().clone());
/// db.rollback(true).unwrap();
/// assert_eq!(db.count("articles"), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryConnection {
    state: Mutex<State>,
}

impl MemoryConnection {
    /// Creates an empty connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` rollbacks fail with `error` without leaving
    /// the transaction level.
    pub fn fail_rollbacks(&self, error: DbError, times: usize) {
        self.state.lock().injected = Some((error, times));
    }

    /// Returns how many times `rollback` was called.
    #[must_use]
    pub fn rollback_attempts(&self) -> usize {
        self.state.lock().rollback_attempts
    }

    /// Returns how many times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Returns `true` while connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Returns `true` if nested transactions use savepoints.
    #[must_use]
    pub fn uses_savepoints(&self) -> bool {
        self.state.lock().savepoints
    }

    /// Inserts a row, assigning an auto-increment `id` when the row has none.
    ///
    /// Returns the row's `id`.
    pub fn insert(&self, table: &str, mut row: Map<String, Value>) -> Value {
        let mut state = self.state.lock();
        state.connected = true;

        let existing = row.get("id").filter(|id| !id.is_null()).cloned();
        let id = if let Some(id) = existing {
            id
        } else {
            let next = state.next_ids.entry(table.to_string()).or_insert(0);
            *next += 1;
            let id = Value::from(*next);
            row.insert("id".to_string(), id.clone());
            id
        };
        state.tables.entry(table.to_string()).or_default().push(row);
        id
    }

    /// Returns the rows matching `criteria`.
    #[must_use]
    pub fn select(&self, table: &str, criteria: &Criteria) -> Vec<Map<String, Value>> {
        let mut state = self.state.lock();
        state.connected = true;
        state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| criteria.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of rows in a table.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, Vec::len)
    }
}

impl DbConnection for MemoryConnection {
    fn begin(&self) -> Result<(), DbError> {
        let mut state = self.state.lock();
        state.connected = true;
        let snapshot = if state.snapshots.is_empty() || state.savepoints {
            Some(state.tables.clone())
        } else {
            None
        };
        state.snapshots.push(snapshot);
        Ok(())
    }

    fn rollback(&self, to_savepoint: bool) -> Result<(), DbError> {
        let mut state = self.state.lock();
        state.rollback_attempts += 1;

        if let Some((error, remaining)) = state.injected.take() {
            if remaining > 0 {
                state.injected = Some((error.clone(), remaining - 1));
                return Err(error);
            }
        }

        let outermost = state.snapshots.len() == 1;
        let savepoints = state.savepoints;
        let snapshot = state.snapshots.pop().ok_or(DbError::NoActiveTransaction)?;
        if outermost || (to_savepoint && savepoints) {
            if let Some(tables) = snapshot {
                state.tables = tables;
            }
        }
        Ok(())
    }

    fn is_under_transaction(&self) -> bool {
        !self.state.lock().snapshots.is_empty()
    }

    fn transaction_level(&self) -> usize {
        self.state.lock().snapshots.len()
    }

    fn set_nested_transactions_with_savepoints(&self, enabled: bool) -> Result<(), DbError> {
        let mut state = self.state.lock();
        if !state.snapshots.is_empty() {
            return Err(DbError::query(
                "Nested transaction with savepoints behavior cannot be changed while a transaction is open",
            ));
        }
        state.savepoints = enabled;
        Ok(())
    }

    fn close(&self) -> Result<(), DbError> {
        let mut state = self.state.lock();
        state.closes += 1;
        // An open transaction is discarded with the connection.
        if let Some(Some(outer)) = state.snapshots.first().cloned() {
            state.tables = outer;
        }
        state.snapshots.clear();
        state.connected = false;
        Ok(())
    }
}
