//! End-to-end graph behavior over a file-backed pool.

#![allow(unused_results)]

use std::sync::Arc;
use std::thread;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use taskweb_tasks::connection::{ConnectionConfig, new_file};
use taskweb_tasks::migrations::run_migrations;
use taskweb_tasks::{
    ConnectionPool, FixedClock, TaskError, TaskFilter, TaskId, TaskService, TaskStatus,
    TaskUpdateParams, derive_status,
};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    pool: ConnectionPool,
    clock: Arc<FixedClock>,
    svc: TaskService,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = new_file(&dir.path().join("tasks.db"), &ConnectionConfig::default()).unwrap();
    run_migrations(&pool.get().unwrap()).unwrap();
    let clock = Arc::new(FixedClock::new(t0()));
    let svc = TaskService::new(pool.clone(), clock.clone());
    Harness {
        dir,
        pool,
        clock,
        svc,
    }
}

fn complete(svc: &TaskService, id: TaskId) {
    svc.update_task(
        id,
        &TaskUpdateParams {
            is_completed: Some(true),
            ..Default::default()
        },
    )
    .unwrap();
}

fn status_of(svc: &TaskService, id: TaskId, now: DateTime<Utc>) -> TaskStatus {
    let all = svc.list_tasks().unwrap();
    let task = all.iter().find(|t| t.task.id == id).unwrap();
    derive_status(task, &all, now)
}

fn orphan_edges(pool: &ConnectionPool) -> i64 {
    pool.get()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM task_dependencies d \
             WHERE NOT EXISTS (SELECT 1 FROM tasks t WHERE t.id = d.task_id) \
                OR NOT EXISTS (SELECT 1 FROM tasks t WHERE t.id = d.depends_on_task_id)",
            [],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn chain_listing_and_unblocking() {
    let h = harness();
    let a = h.svc.create_task("A", None).unwrap();
    let b = h.svc.create_task("B", None).unwrap();
    let c = h.svc.create_task("C", None).unwrap();
    let b_a = h.svc.create_dependency(b.id, a.id).unwrap();
    let c_b = h.svc.create_dependency(c.id, b.id).unwrap();

    let all = h.svc.list_tasks().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].task.id, a.id);
    assert!(all[0].dependencies.is_empty());
    assert_eq!(all[0].dependents, vec![b_a.clone()]);
    assert_eq!(all[1].dependencies, vec![b_a]);
    assert_eq!(all[1].dependents, vec![c_b.clone()]);
    assert_eq!(all[2].dependencies, vec![c_b]);
    assert!(all[2].dependents.is_empty());

    assert_eq!(status_of(&h.svc, b.id, t0()), TaskStatus::Blocked);
    complete(&h.svc, a.id);
    assert_eq!(status_of(&h.svc, b.id, t0()), TaskStatus::Ready);
    assert_eq!(status_of(&h.svc, c.id, t0()), TaskStatus::Blocked);
}

#[test]
fn past_due_task_is_overdue() {
    let h = harness();
    let yesterday = t0() - Duration::days(1);
    let task = h.svc.create_task("Pay invoice", Some(yesterday)).unwrap();
    assert_eq!(status_of(&h.svc, task.id, t0()), TaskStatus::Overdue);

    complete(&h.svc, task.id);
    assert_eq!(status_of(&h.svc, task.id, t0()), TaskStatus::Completed);
}

#[test]
fn deleting_prerequisite_unblocks_dependent() {
    let h = harness();
    let a = h.svc.create_task("A", None).unwrap();
    let b = h.svc.create_task("B", None).unwrap();
    let c = h.svc.create_task("C", None).unwrap();
    h.svc.create_dependency(b.id, a.id).unwrap();
    let c_b = h.svc.create_dependency(c.id, b.id).unwrap();

    assert!(h.svc.delete_task(a.id).unwrap());

    let b_now = h.svc.get_task(b.id).unwrap();
    assert!(b_now.dependencies.is_empty());
    assert_eq!(b_now.dependents, vec![c_b.clone()]);
    assert_eq!(h.svc.list_dependencies().unwrap(), vec![c_b]);
    assert_eq!(status_of(&h.svc, b.id, t0()), TaskStatus::Ready);
    assert_eq!(orphan_edges(&h.pool), 0);
}

#[test]
fn dependency_on_missing_task_reports_task_id_first() {
    let h = harness();
    let a = h.svc.create_task("A", None).unwrap();

    assert_matches!(
        h.svc.create_dependency(TaskId::new(100), TaskId::new(200)),
        Err(TaskError::NotFound { entity: "Task", id: 100 })
    );
    assert_matches!(
        h.svc.create_dependency(a.id, TaskId::new(200)),
        Err(TaskError::NotFound { entity: "Task", id: 200 })
    );
    assert_matches!(
        h.svc.create_dependency(TaskId::new(100), a.id),
        Err(TaskError::NotFound { entity: "Task", id: 100 })
    );
}

#[test]
fn updated_at_advances_across_updates() {
    let h = harness();
    let task = h.svc.create_task("A", None).unwrap();
    let mut last = task.updated_at;
    for i in 0..5 {
        if i % 2 == 0 {
            h.clock.advance(Duration::milliseconds(10));
        }
        let updated = h
            .svc
            .update_task(
                task.id,
                &TaskUpdateParams {
                    is_completed: Some(i % 2 == 0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.updated_at > last);
        assert_eq!(updated.created_at, task.created_at);
        last = updated.updated_at;
    }
}

#[test]
fn rejected_far_future_due_date_leaves_listings_intact() {
    let h = harness();
    let ok = h.svc.create_task("ok", None).unwrap();
    let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();

    assert_matches!(
        h.svc.create_task("far", Some(far)),
        Err(TaskError::Validation(_))
    );

    let all = h.svc.list_tasks().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].task, ok);
    assert_eq!(h.svc.status_report(TaskFilter::Pending).unwrap().summary.total, 1);
}

#[test]
fn state_survives_new_pool() {
    let h = harness();
    let a = h.svc.create_task("A", None).unwrap();
    let b = h.svc.create_task("B", None).unwrap();
    h.svc.create_dependency(b.id, a.id).unwrap();

    let path = h.dir.path().join("tasks.db");
    let reopened = new_file(&path, &ConnectionConfig::default()).unwrap();
    run_migrations(&reopened.get().unwrap()).unwrap();
    let svc = TaskService::new(reopened, h.clock.clone());

    let report = svc.status_report(TaskFilter::All).unwrap();
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.blocked, 1);
    assert_eq!(report.summary.ready, 1);
}

#[test]
fn concurrent_deletes_and_inserts_leave_no_orphans() {
    let h = harness();
    let ids: Vec<TaskId> = (0..12)
        .map(|i| h.svc.create_task(&format!("T{i}"), None).unwrap().id)
        .collect();

    let mut handles = Vec::new();
    for worker in 0..4 {
        let svc = h.svc.clone();
        let ids = ids.clone();
        handles.push(thread::spawn(move || {
            for round in 0..30 {
                let from = ids[(worker * 7 + round) % ids.len()];
                let to = ids[(worker * 3 + round * 5 + 1) % ids.len()];
                match svc.create_dependency(from, to) {
                    Ok(_)
                    | Err(TaskError::Validation(_) | TaskError::NotFound { .. })
                    | Err(TaskError::Database(_)) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }));
    }

    let deleter = {
        let svc = h.svc.clone();
        let ids = ids.clone();
        thread::spawn(move || {
            for id in ids.iter().step_by(3) {
                svc.delete_task(*id).unwrap();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    deleter.join().unwrap();

    assert_eq!(orphan_edges(&h.pool), 0);
    for id in ids.iter().step_by(3) {
        assert!(h.svc.get_task(*id).unwrap_err().is_not_found());
    }
}
