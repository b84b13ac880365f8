//! Business logic layer for the task graph.
//!
//! Wraps the repositories with validation, transactions and logging. Key
//! rules:
//!
//! - **Titles**: trimmed by the repository; empty after trimming is a
//!   validation error.
//! - **Self-dependency**: rejected before touching storage.
//! - **Cycles**: allowed unless cycle rejection is enabled, in which case the
//!   reachability check and the insert share one `IMMEDIATE` transaction.
//! - **Snapshots**: multi-query reads (`get_task`, `list_tasks`,
//!   `status_report`) run inside one read transaction, so tasks and edges come
//!   from the same point in time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::{Result, TaskError};
use crate::ids::{DependencyId, TaskId};
use crate::repository::{DependencyRepository, TaskRepository};
use crate::status::StatusEngine;
use crate::types::{
    StatusReport, StatusSummary, Task, TaskCreateParams, TaskDependency, TaskFilter,
    TaskUpdateParams, TaskWithDependencies, TaskWithStatus,
};

/// Task graph service.
///
/// Cheap to clone; clones share the pool and clock.
#[derive(Clone)]
pub struct TaskService {
    pool: ConnectionPool,
    clock: Arc<dyn Clock>,
    reject_cycles: bool,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("pool_size", &self.pool.max_size())
            .field("reject_cycles", &self.reject_cycles)
            .finish_non_exhaustive()
    }
}

impl TaskService {
    /// Create a service over a migrated pool.
    pub fn new(pool: ConnectionPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            reject_cycles: false,
        }
    }

    /// Enable or disable rejection of edges that would close a cycle.
    #[must_use]
    pub fn with_cycle_rejection(mut self, enabled: bool) -> Self {
        self.reject_cycles = enabled;
        self
    }

    /// The clock used for timestamps and overdue evaluation.
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task. The title is trimmed and must not be empty.
    pub fn create_task(&self, title: &str, due_date: Option<DateTime<Utc>>) -> Result<Task> {
        let conn = self.conn()?;
        let new = TaskCreateParams {
            title: title.to_string(),
            due_date,
        };
        let task = TaskRepository::create(&conn, &*self.clock, &new)?;
        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Apply a partial update. Title validation runs before the lookup.
    pub fn update_task(&self, id: TaskId, patch: &TaskUpdateParams) -> Result<Task> {
        if patch.is_empty() {
            debug!(task_id = %id, "empty patch; only updated_at changes");
        }
        let conn = self.conn()?;
        let task = TaskRepository::update(&conn, &*self.clock, id, patch)?;
        debug!(task_id = %id, completed = task.is_completed, "task updated");
        Ok(task)
    }

    /// Delete a task and all of its edges. Returns `false` if it was absent.
    pub fn delete_task(&self, id: TaskId) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = TaskRepository::delete(&conn, id)?;
        if deleted {
            info!(task_id = %id, "task deleted");
        } else {
            debug!(task_id = %id, "delete of missing task");
        }
        Ok(deleted)
    }

    /// Get a task with its outgoing and incoming edges.
    pub fn get_task(&self, id: TaskId) -> Result<TaskWithDependencies> {
        self.read(|conn| {
            let task = TaskRepository::get(conn, id)?;
            let dependencies = DependencyRepository::list_dependencies_of(conn, id)?;
            let dependents = DependencyRepository::list_dependents_of(conn, id)?;
            Ok(TaskWithDependencies {
                task,
                dependencies,
                dependents,
            })
        })
    }

    /// Every task with its edges, ascending by id.
    pub fn list_tasks(&self) -> Result<Vec<TaskWithDependencies>> {
        self.list_tasks_filtered(TaskFilter::All)
    }

    /// Tasks passing `filter`, each with its edges, ascending by id.
    pub fn list_tasks_filtered(&self, filter: TaskFilter) -> Result<Vec<TaskWithDependencies>> {
        self.read(|conn| {
            let tasks = TaskRepository::list(conn, filter)?;
            let edges = DependencyRepository::list(conn)?;
            Ok(attach_edges(tasks, edges))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dependency operations
    // ─────────────────────────────────────────────────────────────────────

    /// Record that `task_id` depends on `depends_on_task_id`.
    pub fn create_dependency(
        &self,
        task_id: TaskId,
        depends_on_task_id: TaskId,
    ) -> Result<TaskDependency> {
        if task_id == depends_on_task_id {
            return Err(TaskError::Validation(format!(
                "task {task_id} cannot depend on itself"
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let edge = DependencyRepository::create(&tx, &*self.clock, task_id, depends_on_task_id)?;

        if self.reject_cycles && DependencyRepository::reaches(&tx, depends_on_task_id, task_id)? {
            warn!(
                task_id = %task_id,
                depends_on_task_id = %depends_on_task_id,
                "rejecting dependency that would create a cycle"
            );
            return Err(TaskError::CircularDependency {
                task_id,
                depends_on_task_id,
            });
        }

        tx.commit()?;
        info!(
            dependency_id = %edge.id,
            task_id = %task_id,
            depends_on_task_id = %depends_on_task_id,
            "dependency created"
        );
        Ok(edge)
    }

    /// Get one edge by id.
    pub fn get_dependency(&self, id: DependencyId) -> Result<TaskDependency> {
        let conn = self.conn()?;
        DependencyRepository::get(&conn, id)
    }

    /// Delete one edge. Returns `false` if it was absent.
    pub fn delete_dependency(&self, id: DependencyId) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = DependencyRepository::delete(&conn, id)?;
        if deleted {
            info!(dependency_id = %id, "dependency deleted");
        }
        Ok(deleted)
    }

    /// Every edge, ascending by id.
    pub fn list_dependencies(&self) -> Result<Vec<TaskDependency>> {
        let conn = self.conn()?;
        DependencyRepository::list(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────

    /// Tasks passing `filter` with derived status, plus a summary over all
    /// tasks. Everything is evaluated against a single clock reading.
    pub fn status_report(&self, filter: TaskFilter) -> Result<StatusReport> {
        let all = self.list_tasks()?;
        let now = self.clock.now();
        let engine = StatusEngine::new(all.iter().map(|t| &t.task), now);

        let evaluated: Vec<TaskWithStatus> = all
            .into_iter()
            .map(|task| {
                let status = engine.evaluate(&task);
                TaskWithStatus { task, status }
            })
            .collect();
        let summary: StatusSummary = evaluated.iter().map(|t| t.status).collect();
        let tasks = evaluated
            .into_iter()
            .filter(|t| filter.matches(&t.task.task))
            .collect();

        Ok(StatusReport {
            evaluated_at: now,
            tasks,
            summary,
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Partition edges onto their endpoints in one pass.
///
/// Edges touching tasks outside `tasks` (filtered out) are dropped for that
/// side only.
fn attach_edges(tasks: Vec<Task>, edges: Vec<TaskDependency>) -> Vec<TaskWithDependencies> {
    let mut by_id: HashMap<TaskId, (Vec<TaskDependency>, Vec<TaskDependency>)> = tasks
        .iter()
        .map(|task| (task.id, (Vec::new(), Vec::new())))
        .collect();

    for edge in edges {
        if let Some((_, dependents)) = by_id.get_mut(&edge.depends_on_task_id) {
            dependents.push(edge.clone());
        }
        if let Some((dependencies, _)) = by_id.get_mut(&edge.task_id) {
            dependencies.push(edge);
        }
    }

    tasks
        .into_iter()
        .map(|task| {
            let (dependencies, dependents) = by_id.remove(&task.id).unwrap_or_default();
            TaskWithDependencies {
                task,
                dependencies,
                dependents,
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
