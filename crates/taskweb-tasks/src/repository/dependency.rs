use std::collections::{HashSet, VecDeque};

use rusqlite::{Connection, OptionalExtension, params};

use super::{DEPENDENCY_COLUMNS, TaskRepository, dependency_from_row, with_write_tx};
use crate::clock::{Clock, storage_now};
use crate::errors::{Result, TaskError};
use crate::ids::{DependencyId, TaskId};
use crate::types::{TaskDependency, format_timestamp};

/// Dependency edge CRUD and graph queries.
pub struct DependencyRepository;

impl DependencyRepository {
    /// Insert an edge `task_id -> depends_on_task_id`.
    ///
    /// Both endpoints are checked first (`task_id` before
    /// `depends_on_task_id`) so the caller gets a typed not-found. The foreign
    /// keys remain the final authority: an endpoint deleted between the check
    /// and the insert surfaces as [`TaskError::Database`]. Duplicate edges
    /// are allowed.
    pub fn create(
        conn: &Connection,
        clock: &dyn Clock,
        task_id: TaskId,
        depends_on_task_id: TaskId,
    ) -> Result<TaskDependency> {
        with_write_tx(conn, |conn| {
            if !TaskRepository::exists(conn, task_id)? {
                return Err(TaskError::task_not_found(task_id));
            }
            if !TaskRepository::exists(conn, depends_on_task_id)? {
                return Err(TaskError::task_not_found(depends_on_task_id));
            }
            let now = format_timestamp(&storage_now(clock));
            let edge = conn.query_row(
                &format!(
                    "INSERT INTO task_dependencies (task_id, depends_on_task_id, created_at) \
                     VALUES (?1, ?2, ?3) RETURNING {DEPENDENCY_COLUMNS}"
                ),
                params![task_id, depends_on_task_id, now],
                dependency_from_row,
            )?;
            Ok(edge)
        })
    }

    /// Get an edge by id, or `None` if absent.
    pub fn find(conn: &Connection, id: DependencyId) -> Result<Option<TaskDependency>> {
        let edge = conn
            .query_row(
                &format!("SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies WHERE id = ?1"),
                params![id],
                dependency_from_row,
            )
            .optional()?;
        Ok(edge)
    }

    /// Get an edge by id, failing with [`TaskError::NotFound`] if absent.
    pub fn get(conn: &Connection, id: DependencyId) -> Result<TaskDependency> {
        Self::find(conn, id)?.ok_or_else(|| TaskError::dependency_not_found(id))
    }

    /// Delete one edge. Returns `true` if a row was deleted.
    pub fn delete(conn: &Connection, id: DependencyId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM task_dependencies WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// All edges in ascending id order.
    pub fn list(conn: &Connection) -> Result<Vec<TaskDependency>> {
        Self::query(
            conn,
            &format!("SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies ORDER BY id ASC"),
            None,
        )
    }

    /// Edges where `task_id` is the dependent (its prerequisites).
    pub fn list_dependencies_of(conn: &Connection, task_id: TaskId) -> Result<Vec<TaskDependency>> {
        Self::query(
            conn,
            &format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies \
                 WHERE task_id = ?1 ORDER BY id ASC"
            ),
            Some(task_id),
        )
    }

    /// Edges where `task_id` is the prerequisite (the tasks waiting on it).
    pub fn list_dependents_of(conn: &Connection, task_id: TaskId) -> Result<Vec<TaskDependency>> {
        Self::query(
            conn,
            &format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM task_dependencies \
                 WHERE depends_on_task_id = ?1 ORDER BY id ASC"
            ),
            Some(task_id),
        )
    }

    /// Whether `target` is reachable from `start` by following
    /// dependent -> prerequisite edges.
    ///
    /// Breadth-first; each task is expanded at most once, so existing cycles
    /// in the stored graph do not loop.
    pub fn reaches(conn: &Connection, start: TaskId, target: TaskId) -> Result<bool> {
        let mut stmt = conn.prepare(
            "SELECT depends_on_task_id FROM task_dependencies WHERE task_id = ?1",
        )?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            let next = stmt
                .query_map(params![current], |row| row.get::<_, TaskId>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            queue.extend(next.into_iter().filter(|id| !visited.contains(id)));
        }

        Ok(false)
    }

    fn query(conn: &Connection, sql: &str, task_id: Option<TaskId>) -> Result<Vec<TaskDependency>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = match task_id {
            Some(id) => stmt.query_map(params![id], dependency_from_row)?,
            None => stmt.query_map([], dependency_from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
