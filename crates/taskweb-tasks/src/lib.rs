//! # taskweb-tasks
//!
//! Tasks, dependency edges between them, and the status engine that derives
//! whether a task is ready, blocked, overdue or completed.
//!
//! # Architecture
//!
//! - **[`repository`]**: Stateless repositories. Each method takes a
//!   `&Connection` and translates between Rust types and SQL.
//! - **[`status`]**: Pure status derivation over materialized tasks and edges.
//! - **[`service`]**: [`TaskService`] wraps a connection pool and a [`Clock`],
//!   validates input and enforces cross-entity rules.

#![deny(unsafe_code)]

pub mod clock;
pub mod connection;
pub mod errors;
pub mod ids;
pub mod migrations;
pub mod repository;
pub mod service;
pub mod status;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, TaskError};
pub use ids::{DependencyId, TaskId};
pub use repository::{DependencyRepository, TaskRepository};
pub use service::TaskService;
pub use status::{StatusEngine, derive_status};
pub use types::*;
