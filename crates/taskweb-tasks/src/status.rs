//! Status derivation.
//!
//! Precedence, first match wins:
//!
//! 1. `completed`: the task itself is done.
//! 2. `blocked`: some prerequisite resolves to a task that is not done.
//! 3. `overdue`: the due date is strictly before "now".
//! 4. `ready`: everything else.
//!
//! Edges whose prerequisite is not in the supplied task set are ignored, so a
//! snapshot taken mid-delete degrades to "not blocked" rather than failing.
//! Only direct prerequisites count; a task whose prerequisite is itself
//! blocked but not completed is blocked for that reason alone.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ids::TaskId;
use crate::types::{Task, TaskDependency, TaskStatus, TaskWithDependencies};

/// Status evaluator over one snapshot of the task set.
///
/// Builds a completion index once so evaluating every task in a listing is
/// linear in tasks plus edges.
#[derive(Debug)]
pub struct StatusEngine {
    completed: HashMap<TaskId, bool>,
    now: DateTime<Utc>,
}

impl StatusEngine {
    /// Index `tasks` for evaluation at `now`.
    pub fn new<'a, I>(tasks: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let completed = tasks
            .into_iter()
            .map(|task| (task.id, task.is_completed))
            .collect();
        Self { completed, now }
    }

    /// The instant this engine evaluates against.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Whether any prerequisite in `dependencies` is known and not completed.
    pub fn is_blocked(&self, dependencies: &[TaskDependency]) -> bool {
        dependencies.iter().any(|dep| {
            self.completed
                .get(&dep.depends_on_task_id)
                .is_some_and(|done| !done)
        })
    }

    /// Whether `task` is past due at this engine's `now`.
    pub fn is_overdue(&self, task: &Task) -> bool {
        task.due_date.is_some_and(|due| due < self.now)
    }

    /// Derive the status of `task` given its outgoing edges.
    pub fn status_of(&self, task: &Task, dependencies: &[TaskDependency]) -> TaskStatus {
        if task.is_completed {
            TaskStatus::Completed
        } else if self.is_blocked(dependencies) {
            TaskStatus::Blocked
        } else if self.is_overdue(task) {
            TaskStatus::Overdue
        } else {
            TaskStatus::Ready
        }
    }

    /// Derive the status of a task carrying its own edges.
    pub fn evaluate(&self, task: &TaskWithDependencies) -> TaskStatus {
        self.status_of(&task.task, &task.dependencies)
    }
}

/// Derive one task's status against the full task set.
///
/// Convenience over [`StatusEngine`] for a single evaluation; listings
/// should build the engine once.
pub fn derive_status(
    task: &TaskWithDependencies,
    all_tasks: &[TaskWithDependencies],
    now: DateTime<Utc>,
) -> TaskStatus {
    StatusEngine::new(all_tasks.iter().map(|t| &t.task), now).evaluate(task)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::ids::DependencyId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn task(id: i64, completed: bool, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: TaskId::new(id),
            title: format!("task {id}"),
            due_date: due,
            is_completed: completed,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn edge(id: i64, from: i64, to: i64) -> TaskDependency {
        TaskDependency {
            id: DependencyId::new(id),
            task_id: TaskId::new(from),
            depends_on_task_id: TaskId::new(to),
            created_at: now(),
        }
    }

    fn with_deps(task: Task, dependencies: Vec<TaskDependency>) -> TaskWithDependencies {
        TaskWithDependencies {
            task,
            dependencies,
            dependents: vec![],
        }
    }

    #[test]
    fn completed_wins_over_everything() {
        let past = now() - Duration::days(1);
        let a = with_deps(task(1, true, Some(past)), vec![edge(1, 1, 2)]);
        let b = with_deps(task(2, false, None), vec![]);
        assert_eq!(
            derive_status(&a, &[a.clone(), b], now()),
            TaskStatus::Completed
        );
    }

    #[test]
    fn blocked_beats_overdue() {
        let past = now() - Duration::days(1);
        let a = with_deps(task(1, false, Some(past)), vec![edge(1, 1, 2)]);
        let b = with_deps(task(2, false, None), vec![]);
        assert_eq!(derive_status(&a, &[a.clone(), b], now()), TaskStatus::Blocked);
    }

    #[test]
    fn overdue_when_unblocked_and_past_due() {
        let past = now() - Duration::days(1);
        let a = with_deps(task(1, false, Some(past)), vec![edge(1, 1, 2)]);
        let b = with_deps(task(2, true, None), vec![]);
        assert_eq!(derive_status(&a, &[a.clone(), b], now()), TaskStatus::Overdue);
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let a = with_deps(task(1, false, Some(now())), vec![]);
        assert_eq!(derive_status(&a, &[a.clone()], now()), TaskStatus::Ready);
    }

    #[test]
    fn no_due_date_is_never_overdue() {
        let a = with_deps(task(1, false, None), vec![]);
        let far_future = now() + Duration::days(365 * 50);
        assert_eq!(derive_status(&a, &[a.clone()], far_future), TaskStatus::Ready);
    }

    #[test]
    fn dangling_prerequisite_is_ignored() {
        let a = with_deps(task(1, false, None), vec![edge(1, 1, 99)]);
        assert_eq!(derive_status(&a, &[a.clone()], now()), TaskStatus::Ready);
    }

    #[test]
    fn duplicate_edges_do_not_change_result() {
        let a = with_deps(task(1, false, None), vec![edge(1, 1, 2), edge(2, 1, 2)]);
        let b = with_deps(task(2, true, None), vec![]);
        assert_eq!(derive_status(&a, &[a.clone(), b], now()), TaskStatus::Ready);
    }

    #[test]
    fn blocking_is_not_transitive() {
        // A -> B -> C, with B completed and C pending: A is not blocked.
        let a = with_deps(task(1, false, None), vec![edge(1, 1, 2)]);
        let b = with_deps(task(2, true, None), vec![edge(2, 2, 3)]);
        let c = with_deps(task(3, false, None), vec![]);
        let all = [a.clone(), b.clone(), c];
        assert_eq!(derive_status(&a, &all, now()), TaskStatus::Ready);
        assert_eq!(derive_status(&b, &all, now()), TaskStatus::Completed);
    }

    #[test]
    fn cycle_members_block_each_other() {
        let a = with_deps(task(1, false, None), vec![edge(1, 1, 2)]);
        let b = with_deps(task(2, false, None), vec![edge(2, 2, 1)]);
        let all = [a.clone(), b.clone()];
        assert_eq!(derive_status(&a, &all, now()), TaskStatus::Blocked);
        assert_eq!(derive_status(&b, &all, now()), TaskStatus::Blocked);
    }

    #[test]
    fn engine_reports_its_instant() {
        let engine = StatusEngine::new(std::iter::empty::<&Task>(), now());
        assert_eq!(engine.now(), now());
        assert!(!engine.is_blocked(&[edge(1, 1, 2)]));
    }

    proptest! {
        #[test]
        fn completed_task_is_always_completed(
            due_offset in proptest::option::of(-1000i64..1000),
            prereq_done in proptest::collection::vec(any::<bool>(), 0..6),
        ) {
            let due = due_offset.map(|m| now() + Duration::minutes(m));
            let deps: Vec<_> = (0..prereq_done.len())
                .map(|i| edge(i as i64 + 1, 1, i as i64 + 2))
                .collect();
            let mut all = vec![with_deps(task(1, true, due), deps)];
            for (i, done) in prereq_done.iter().enumerate() {
                all.push(with_deps(task(i as i64 + 2, *done, None), vec![]));
            }
            prop_assert_eq!(derive_status(&all[0], &all, now()), TaskStatus::Completed);
        }

        #[test]
        fn blocked_iff_some_prerequisite_pending(
            due_offset in proptest::option::of(-1000i64..1000),
            prereq_done in proptest::collection::vec(any::<bool>(), 0..6),
        ) {
            let due = due_offset.map(|m| now() + Duration::minutes(m));
            let deps: Vec<_> = (0..prereq_done.len())
                .map(|i| edge(i as i64 + 1, 1, i as i64 + 2))
                .collect();
            let mut all = vec![with_deps(task(1, false, due), deps)];
            for (i, done) in prereq_done.iter().enumerate() {
                all.push(with_deps(task(i as i64 + 2, *done, None), vec![]));
            }

            let status = derive_status(&all[0], &all, now());
            let any_pending = prereq_done.iter().any(|done| !done);
            let past_due = due.is_some_and(|d| d < now());

            let expected = if any_pending {
                TaskStatus::Blocked
            } else if past_due {
                TaskStatus::Overdue
            } else {
                TaskStatus::Ready
            };
            prop_assert_eq!(status, expected);
        }
    }
}
