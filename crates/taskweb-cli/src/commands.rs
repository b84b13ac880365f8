//! Subcommands and their execution against a [`TaskService`].
//!
//! Every command produces a JSON value; `main` prints it.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use serde_json::{Value, json};
use taskweb_tasks::types::parse_timestamp;
use taskweb_tasks::{DependencyId, TaskFilter, TaskId, TaskService, TaskUpdateParams};

/// Top-level command.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, edit and inspect tasks.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Create, inspect, delete and list dependency edges.
    #[command(subcommand)]
    Dep(DepCommand),

    /// Show derived status for each task plus a summary.
    Status {
        /// Which tasks to list (the summary always covers all tasks).
        #[arg(long, value_enum, default_value_t)]
        filter: FilterArg,
    },
}

/// Task subcommands.
#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task.
    Create {
        /// Task title.
        title: String,
        /// Due date (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_due_date)]
        due: Option<DateTime<Utc>>,
    },

    /// Update fields of a task. Omitted fields are left unchanged.
    Update {
        /// Task id.
        id: TaskId,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New due date (RFC 3339 or YYYY-MM-DD).
        #[arg(long, value_parser = parse_due_date, conflicts_with = "clear_due_date")]
        due: Option<DateTime<Utc>>,
        /// Remove the due date.
        #[arg(long)]
        clear_due_date: bool,
        /// Mark the task completed.
        #[arg(long, conflicts_with = "reopen")]
        complete: bool,
        /// Mark the task not completed.
        #[arg(long)]
        reopen: bool,
    },

    /// Delete a task and every edge touching it.
    Delete {
        /// Task id.
        id: TaskId,
    },

    /// Show one task with its edges.
    Get {
        /// Task id.
        id: TaskId,
    },

    /// List tasks with their edges.
    List {
        /// Completion filter.
        #[arg(long, value_enum, default_value_t)]
        filter: FilterArg,
    },
}

/// Dependency subcommands.
#[derive(Subcommand, Debug)]
pub enum DepCommand {
    /// Record that TASK_ID cannot start until DEPENDS_ON is completed.
    Create {
        /// The dependent task.
        task_id: TaskId,
        /// The prerequisite task.
        depends_on: TaskId,
    },

    /// Show one edge.
    Get {
        /// Dependency id.
        id: DependencyId,
    },

    /// Delete one edge by its id.
    Delete {
        /// Dependency id.
        id: DependencyId,
    },

    /// List every edge.
    List,
}

/// Completion filter as a CLI value.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterArg {
    /// Every task.
    #[default]
    All,
    /// Tasks not yet completed.
    Pending,
    /// Completed tasks.
    Completed,
}

impl From<FilterArg> for TaskFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Pending => Self::Pending,
            FilterArg::Completed => Self::Completed,
        }
    }
}

/// Execute `command` and return its JSON output.
pub fn run(service: &TaskService, command: Command) -> Result<Value> {
    let output = match command {
        Command::Task(cmd) => run_task(service, cmd)?,
        Command::Dep(cmd) => run_dep(service, cmd)?,
        Command::Status { filter } => serde_json::to_value(service.status_report(filter.into())?)?,
    };
    Ok(output)
}

fn run_task(service: &TaskService, command: TaskCommand) -> Result<Value> {
    let output = match command {
        TaskCommand::Create { title, due } => serde_json::to_value(service.create_task(&title, due)?)?,
        TaskCommand::Update {
            id,
            title,
            due,
            clear_due_date,
            complete,
            reopen,
        } => {
            let patch = build_patch(title, due, clear_due_date, complete, reopen);
            serde_json::to_value(service.update_task(id, &patch)?)?
        }
        TaskCommand::Delete { id } => json!({ "success": service.delete_task(id)? }),
        TaskCommand::Get { id } => serde_json::to_value(service.get_task(id)?)?,
        TaskCommand::List { filter } => {
            serde_json::to_value(service.list_tasks_filtered(filter.into())?)?
        }
    };
    Ok(output)
}

fn run_dep(service: &TaskService, command: DepCommand) -> Result<Value> {
    let output = match command {
        DepCommand::Create {
            task_id,
            depends_on,
        } => serde_json::to_value(service.create_dependency(task_id, depends_on)?)?,
        DepCommand::Get { id } => serde_json::to_value(service.get_dependency(id)?)?,
        DepCommand::Delete { id } => {
            json!({ "success": service.delete_dependency(id)? })
        }
        DepCommand::List => serde_json::to_value(service.list_dependencies()?)?,
    };
    Ok(output)
}

fn build_patch(
    title: Option<String>,
    due: Option<DateTime<Utc>>,
    clear_due_date: bool,
    complete: bool,
    reopen: bool,
) -> TaskUpdateParams {
    let is_completed = if complete {
        Some(true)
    } else if reopen {
        Some(false)
    } else {
        None
    };
    TaskUpdateParams {
        title,
        due_date: if clear_due_date { Some(None) } else { due.map(Some) },
        is_completed,
    }
}

/// Parse an RFC 3339 timestamp, or a bare date as midnight UTC.
pub fn parse_due_date(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = parse_timestamp(s) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("invalid date `{s}`: expected RFC 3339 or YYYY-MM-DD"))
}
