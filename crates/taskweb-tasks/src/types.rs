//! Domain types for tasks, dependency edges and derived status.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{DependencyId, TaskId};

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Storage-assigned, never reused.
    pub id: TaskId,
    /// Trimmed, never empty.
    pub title: String,
    /// Absent means "no deadline"; such a task is never overdue.
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task is done.
    pub is_completed: bool,
    /// Set once on insert.
    pub created_at: DateTime<Utc>,
    /// Strictly increases on every successful update.
    pub updated_at: DateTime<Utc>,
}

/// Directed edge: `task_id` cannot start until `depends_on_task_id` is done.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    /// Storage-assigned, never reused.
    pub id: DependencyId,
    /// The dependent task.
    pub task_id: TaskId,
    /// The prerequisite.
    pub depends_on_task_id: TaskId,
    /// When the edge was recorded.
    pub created_at: DateTime<Utc>,
}

/// A task with its outgoing and incoming edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithDependencies {
    /// The task itself, flattened in JSON.
    #[serde(flatten)]
    pub task: Task,
    /// Edges where this task is the dependent.
    pub dependencies: Vec<TaskDependency>,
    /// Edges where this task is the prerequisite.
    pub dependents: Vec<TaskDependency>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for creating a task.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskCreateParams {
    /// Trimmed before storage; must not be blank.
    pub title: String,
    /// Optional deadline.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update. Absent fields are left unchanged.
///
/// `due_date` distinguishes "leave alone" (`None`) from "clear"
/// (`Some(None)`); in JSON that is a missing key versus `null`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateParams {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New due date, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// New completion flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskUpdateParams {
    /// Whether the patch carries no field changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.due_date.is_none() && self.is_completed.is_none()
    }
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Completion filter for listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    /// Every task.
    #[default]
    All,
    /// Not yet completed.
    Pending,
    /// Already completed.
    Completed,
}

impl TaskFilter {
    /// Whether `task` passes this filter.
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Pending => !task.is_completed,
            Self::Completed => task.is_completed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Derived status
// ─────────────────────────────────────────────────────────────────────────────

/// Derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Marked done; wins over everything else.
    Completed,
    /// At least one prerequisite is not completed.
    Blocked,
    /// Past its due date with nothing blocking it.
    Overdue,
    /// Nothing blocking and not past due.
    Ready,
}

impl TaskStatus {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Overdue => "overdue",
            Self::Ready => "ready",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task together with its derived status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithStatus {
    /// The task and its edges, flattened in JSON.
    #[serde(flatten)]
    pub task: TaskWithDependencies,
    /// Status at evaluation time.
    pub status: TaskStatus,
}

/// Count of tasks per derived status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Every task counted.
    pub total: usize,
    /// Tasks marked done.
    pub completed: usize,
    /// Tasks free to start.
    pub ready: usize,
    /// Tasks waiting on a prerequisite.
    pub blocked: usize,
    /// Unblocked tasks past their due date.
    pub overdue: usize,
}

impl StatusSummary {
    /// Tally one status.
    pub fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Ready => self.ready += 1,
            TaskStatus::Blocked => self.blocked += 1,
            TaskStatus::Overdue => self.overdue += 1,
        }
    }
}

impl FromIterator<TaskStatus> for StatusSummary {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut summary = Self::default();
        for status in iter {
            summary.record(status);
        }
        summary
    }
}

/// Filtered tasks with status, plus a summary over the whole graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// When the statuses were evaluated.
    pub evaluated_at: DateTime<Utc>,
    /// Tasks passing the filter, in id order.
    pub tasks: Vec<TaskWithStatus>,
    /// Computed over all tasks, regardless of filter.
    pub summary: StatusSummary,
}

// ─────────────────────────────────────────────────────────────────────────────
// Timestamps
// ─────────────────────────────────────────────────────────────────────────────

/// Storage form: RFC 3339, microsecond precision, `Z` suffix.
///
/// Fixed width, so lexicographic order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse any RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
