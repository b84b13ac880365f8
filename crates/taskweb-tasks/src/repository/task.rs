use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{TASK_COLUMNS, task_from_row, with_write_tx};
use crate::clock::{Clock, storage_now};
use crate::errors::{Result, TaskError};
use crate::ids::TaskId;
use crate::types::{
    Task, TaskCreateParams, TaskFilter, TaskUpdateParams, format_timestamp, parse_timestamp,
};

/// Task CRUD.
pub struct TaskRepository;

impl TaskRepository {
    /// Insert a task. Storage assigns the id; both timestamps are "now".
    ///
    /// The title is trimmed; an empty result is a [`TaskError::Validation`].
    /// So is a due date outside the storable range. The insert and the
    /// read-back commit together.
    pub fn create(conn: &Connection, clock: &dyn Clock, new: &TaskCreateParams) -> Result<Task> {
        let title = normalize_title(&new.title)?;
        let due = new.due_date.as_ref().map(storable_due_date).transpose()?;
        with_write_tx(conn, |conn| {
            let now = format_timestamp(&storage_now(clock));
            let task = conn.query_row(
                &format!(
                    "INSERT INTO tasks (title, due_date, is_completed, created_at, updated_at) \
                     VALUES (?1, ?2, 0, ?3, ?3) RETURNING {TASK_COLUMNS}"
                ),
                params![title, due, now],
                task_from_row,
            )?;
            Ok(task)
        })
    }

    /// Get a task by id, or `None` if absent.
    pub fn find(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    /// Get a task by id, failing with [`TaskError::NotFound`] if absent.
    pub fn get(conn: &Connection, id: TaskId) -> Result<Task> {
        Self::find(conn, id)?.ok_or_else(|| TaskError::task_not_found(id))
    }

    /// Whether a task with this id exists.
    pub fn exists(conn: &Connection, id: TaskId) -> Result<bool> {
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// List tasks in ascending id order.
    pub fn list(conn: &Connection, filter: TaskFilter) -> Result<Vec<Task>> {
        let predicate = match filter {
            TaskFilter::All => "",
            TaskFilter::Pending => " WHERE is_completed = 0",
            TaskFilter::Completed => " WHERE is_completed = 1",
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks{predicate} ORDER BY id ASC"
        ))?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Apply a partial update in a single write.
    ///
    /// A present title is trimmed and validated before the task is looked up,
    /// as is a present due date.
    /// `updated_at` is always bumped, even for an empty patch, and never moves
    /// backwards: if the clock reads at or before the stored value, the new
    /// value is the stored one plus a microsecond.
    pub fn update(
        conn: &Connection,
        clock: &dyn Clock,
        id: TaskId,
        patch: &TaskUpdateParams,
    ) -> Result<Task> {
        let title = patch.title.as_deref().map(normalize_title).transpose()?;
        let due = match patch.due_date {
            Some(Some(ref due)) => Some(Some(storable_due_date(due)?)),
            Some(None) => Some(None),
            None => None,
        };
        with_write_tx(conn, |conn| {
            let current = Self::get(conn, id)?;
            let updated_at = next_updated_at(current.updated_at, storage_now(clock));

            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(title) = title {
                sets.push("title = ?");
                values.push(Box::new(title));
            }
            if let Some(due) = due {
                sets.push("due_date = ?");
                values.push(Box::new(due));
            }
            if let Some(done) = patch.is_completed {
                sets.push("is_completed = ?");
                values.push(Box::new(done));
            }
            sets.push("updated_at = ?");
            values.push(Box::new(format_timestamp(&updated_at)));
            values.push(Box::new(id));

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ? RETURNING {TASK_COLUMNS}",
                sets.join(", ")
            );
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(AsRef::as_ref).collect();
            let task = conn.query_row(&sql, params_refs.as_slice(), task_from_row)?;
            Ok(task)
        })
    }

    /// Delete a task and every edge that touches it.
    ///
    /// Returns `false` if the task did not exist. The edge sweep and the row
    /// delete commit together, so no reader ever sees an edge pointing at a
    /// deleted task.
    pub fn delete(conn: &Connection, id: TaskId) -> Result<bool> {
        with_write_tx(conn, |conn| {
            let swept = conn.execute(
                "DELETE FROM task_dependencies WHERE task_id = ?1 OR depends_on_task_id = ?1",
                params![id],
            )?;
            let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            if removed > 0 {
                debug!(task_id = %id, edges = swept, "task row deleted");
            }
            Ok(removed > 0)
        })
    }
}

/// Trim a title, rejecting one that is empty afterwards.
pub(crate) fn normalize_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::Validation("title is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Storage form of a due date, rejecting one that would not parse back.
///
/// Years past 9999 (or before year 0) format with a sign and extra digits,
/// which RFC 3339 readers refuse.
fn storable_due_date(due: &DateTime<Utc>) -> Result<String> {
    let formatted = format_timestamp(due);
    if parse_timestamp(&formatted).is_err() {
        return Err(TaskError::Validation(format!(
            "due date {formatted} is outside the supported range (years 0000-9999)"
        )));
    }
    Ok(formatted)
}

/// Strictly-later timestamp for an update.
pub(crate) fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
