//! SQL DDL for the task graph tables.
//!
//! Both edge endpoints reference `tasks(id)` with `ON DELETE CASCADE`, so a
//! task delete removes every incident edge even if a caller bypasses
//! [`TaskRepository::delete`](crate::repository::TaskRepository::delete).
//! Cascades only fire on connections with `PRAGMA foreign_keys = ON`.

use rusqlite::Connection;

use crate::errors::Result;

/// Run all task graph migrations.
///
/// Idempotent (uses `IF NOT EXISTS`).
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK(length(trim(title)) > 0),
    due_date TEXT,
    is_completed INTEGER NOT NULL DEFAULT 0 CHECK(is_completed IN (0, 1)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_completed
    ON tasks(is_completed);

CREATE TABLE IF NOT EXISTS task_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    depends_on_task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    CHECK(task_id != depends_on_task_id)
);

CREATE INDEX IF NOT EXISTS idx_task_deps_task
    ON task_dependencies(task_id);
CREATE INDEX IF NOT EXISTS idx_task_deps_depends_on
    ON task_dependencies(depends_on_task_id);
";
