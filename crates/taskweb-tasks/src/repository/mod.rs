//! `SQLite` repositories for tasks and dependency edges.
//!
//! Repositories are stateless: every method takes a `&Connection` so it can
//! run on a pooled connection or inside a caller's transaction. Methods that
//! issue more than one statement go through [`with_write_tx`], which opens an
//! `IMMEDIATE` transaction only when the connection is not already in one.

mod dependency;
mod task;

pub use dependency::DependencyRepository;
pub use task::TaskRepository;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};

use crate::errors::Result;
use crate::types::{Task, TaskDependency, parse_timestamp};

/// Run `f` atomically.
///
/// On an autocommit connection this opens `BEGIN IMMEDIATE`, taking the write
/// lock up front so concurrent writers serialize instead of failing with
/// `SQLITE_BUSY` on lock upgrade. Inside an existing transaction `f` runs
/// as part of it and the caller owns commit/rollback.
pub(crate) fn with_write_tx<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_timestamp(&raw).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

/// Column list matching [`task_from_row`].
pub(crate) const TASK_COLUMNS: &str = "id, title, due_date, is_completed, created_at, updated_at";

/// Column list matching [`dependency_from_row`].
pub(crate) const DEPENDENCY_COLUMNS: &str = "id, task_id, depends_on_task_id, created_at";

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        due_date: optional_timestamp_col(row, 2)?,
        is_completed: row.get(3)?,
        created_at: timestamp_col(row, 4)?,
        updated_at: timestamp_col(row, 5)?,
    })
}

pub(crate) fn dependency_from_row(row: &Row<'_>) -> rusqlite::Result<TaskDependency> {
    Ok(TaskDependency {
        id: row.get(0)?,
        task_id: row.get(1)?,
        depends_on_task_id: row.get(2)?,
        created_at: timestamp_col(row, 3)?,
    })
}
