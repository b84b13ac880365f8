//! Task error types.
//!
//! Validation and not-found failures are typed so callers can map them to
//! their own responses. Storage failures pass through unmodified; nothing
//! here is retried automatically.

use thiserror::Error;

use crate::ids::{DependencyId, TaskId};

/// Errors from task and dependency operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("Task" or "Dependency").
        entity: &'static str,
        /// The id that was looked up.
        id: i64,
    },

    /// Caller-supplied data violates a static rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The new edge would close a dependency cycle.
    #[error("Circular dependency: task {task_id} cannot depend on {depends_on_task_id}")]
    CircularDependency {
        /// The dependent task.
        task_id: TaskId,
        /// The prerequisite that already (transitively) depends on `task_id`.
        depends_on_task_id: TaskId,
    },
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: TaskId) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.get(),
        }
    }

    /// Create a not-found error for a dependency edge.
    pub fn dependency_not_found(id: DependencyId) -> Self {
        Self::NotFound {
            entity: "Dependency",
            id: id.get(),
        }
    }

    /// Whether this is a [`TaskError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience type alias for task results.
pub type Result<T> = std::result::Result<T, TaskError>;
