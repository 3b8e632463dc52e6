//! Tests for the call-once guard.

use super::*;
use crate::error::OnceError;
use crate::events::{EventAction, RecordingSink};
use crate::locks::{HolderRecord, Liveness, LivenessProbe, LockOptions};
use serial_test::serial;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn build_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let build = temp_dir.path().join("build");
    (temp_dir, build)
}

fn fast_guard(base: &PathBuf, name: &str) -> CallOnce {
    CallOnce::new(base.clone(), name).unwrap().with_lock_options(
        LockOptions::default()
            .with_timeout(Some(Duration::from_secs(10)))
            .with_poll_interval(Duration::from_millis(5)),
    )
}

/// An operation that bumps `counter` and returns the new count.
fn counting_op(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> Result<usize, io::Error> {
    let counter = Arc::clone(counter);
    move || Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
}

struct FixedProbe(Liveness);

impl LivenessProbe for FixedProbe {
    fn probe(&self, _pid: i64) -> Liveness {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Success path
// ----------------------------------------------------------------------------

#[test]
fn test_op_called_once() {
    let (_temp_dir, build) = build_dir();
    let counter = Arc::new(AtomicUsize::new(0));
    let guard = fast_guard(&build, "test");

    let first = guard.ensure_done(counting_op(&counter)).unwrap();
    let second = guard.ensure_done(counting_op(&counter)).unwrap();

    assert_eq!(first, Outcome::Executed(1));
    assert!(first.was_executed());
    assert_eq!(second, Outcome::AlreadyDone);
    assert!(!second.was_executed());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_success_writes_done_marker_only() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();

    let paths = guard.paths();
    assert!(paths.done_file.is_file());
    assert_eq!(fs::read_to_string(&paths.done_file).unwrap(), "");
    assert!(!paths.fail_file.exists());
    assert!(!paths.lock_path.exists());
}

#[test]
fn test_creates_base_and_lock_dirs() {
    let (_temp_dir, build) = build_dir();
    let nested = build.join("deep").join("er");
    let guard = fast_guard(&nested, "compile");

    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();

    assert!(nested.join(LOCKS_DIR_NAME).is_dir());
}

#[test]
fn test_idempotent_after_done() {
    let (_temp_dir, build) = build_dir();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        // A fresh guard each time: no state is kept in memory.
        fast_guard(&build, "test")
            .ensure_done(counting_op(&counter))
            .unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_events_for_run_then_skip() {
    let (_temp_dir, build) = build_dir();
    let sink = Arc::new(RecordingSink::new());
    let guard = fast_guard(&build, "test").with_sink(sink.clone());

    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();
    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();

    assert_eq!(
        sink.actions(),
        vec![
            EventAction::Acquired,
            EventAction::OperationStarted,
            EventAction::OperationSucceeded,
            EventAction::Released,
            EventAction::Acquired,
            EventAction::AlreadyDone,
            EventAction::Released,
        ]
    );
}

// ----------------------------------------------------------------------------
// Failure path
// ----------------------------------------------------------------------------

#[test]
fn test_failure_creates_fail_marker_and_reraises() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    let err = guard
        .ensure_done(|| Err::<(), _>(io::Error::other("compile error")))
        .unwrap_err();

    assert!(matches!(err, OnceError::Operation { .. }));
    assert_eq!(err.to_string(), "compile error");
    assert_eq!(
        fs::read_to_string(&guard.paths().fail_file).unwrap(),
        "compile error"
    );
    assert!(!guard.paths().done_file.exists());
    assert!(!guard.paths().lock_path.exists());
}

#[test]
fn test_operation_error_keeps_its_type() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    let err = guard
        .ensure_done(|| {
            Err::<(), _>(io::Error::new(io::ErrorKind::PermissionDenied, "no license"))
        })
        .unwrap_err();

    let source = err.into_operation_error().unwrap();
    let io_err = source.downcast::<io::Error>().unwrap();
    assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
}

#[test]
fn test_anyhow_errors_are_accepted() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    let err = guard
        .ensure_done(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("elaboration failed")) })
        .unwrap_err();

    assert_eq!(err.to_string(), "elaboration failed");
}

#[test]
fn test_previous_failure_raises_without_rerunning() {
    // The failure is sticky and the text is preserved.
    let (_temp_dir, build) = build_dir();
    let calls = Arc::new(AtomicUsize::new(0));
    let guard = fast_guard(&build, "test");

    let op = {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("compile error")
        }
    };
    let first = guard.ensure_done(op).unwrap_err();
    assert_eq!(first.to_string(), "compile error");

    let second = guard.ensure_done(counting_op(&calls)).unwrap_err();

    assert!(second.is_prior_failure());
    assert_eq!(
        second.to_string(),
        "previous execution of 'test' failed: compile error"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match second {
        OnceError::PriorFailure { name, message } => {
            assert_eq!(name, "test");
            assert_eq!(message, "compile error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_lock_released_when_op_panics() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");
    let lock_path = guard.paths().lock_path.clone();

    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = guard.ensure_done(|| -> Result<(), io::Error> { panic!("simulator crashed") });
    }));

    assert!(unwound.is_err());
    assert!(!lock_path.exists());
    // A panic is not a recorded failure.
    assert!(!guard.paths().fail_file.exists());
    assert!(!guard.paths().done_file.exists());
}

// ----------------------------------------------------------------------------
// Clean
// ----------------------------------------------------------------------------

#[test]
fn test_clean_removes_done_and_allows_rerun() {
    let (_temp_dir, build) = build_dir();
    let counter = Arc::new(AtomicUsize::new(0));
    let guard = fast_guard(&build, "test");

    guard.ensure_done(counting_op(&counter)).unwrap();
    assert!(guard.paths().done_file.exists());

    guard.clean().unwrap();
    assert!(!guard.paths().done_file.exists());
    assert_eq!(guard.state(), OnceState::NotStarted);

    let outcome = guard.ensure_done(counting_op(&counter)).unwrap();
    assert_eq!(outcome, Outcome::Executed(2));
}

#[test]
fn test_clean_removes_failed_marker() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    let _ = guard.ensure_done(|| Err::<(), _>("boom"));
    assert!(guard.paths().fail_file.exists());

    guard.clean().unwrap();
    assert!(!guard.paths().fail_file.exists());

    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();
    assert_eq!(guard.state(), OnceState::Succeeded);
}

#[test]
fn test_clean_tolerates_missing_markers() {
    let (_temp_dir, build) = build_dir();
    fast_guard(&build, "never_ran").clean().unwrap();
    clean(&build, "never_ran").unwrap();
}

// ----------------------------------------------------------------------------
// State inspection
// ----------------------------------------------------------------------------

#[test]
fn test_state_transitions() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    assert_eq!(guard.state(), OnceState::NotStarted);

    guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();
    assert_eq!(guard.state(), OnceState::Succeeded);

    let other = fast_guard(&build, "other");
    let _ = other.ensure_done(|| Err::<(), _>("bad netlist"));
    assert_eq!(other.state(), OnceState::Failed("bad netlist".to_string()));
    assert_eq!(other.state().to_string(), "failed: bad netlist");
}

#[test]
fn test_state_running_while_locked() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");

    let observed = guard
        .ensure_done(|| Ok::<_, io::Error>(guard.state()))
        .unwrap();

    match observed {
        Outcome::Executed(OnceState::Running(Some(holder))) => {
            assert_eq!(holder.pid, i64::from(std::process::id()));
        }
        other => panic!("unexpected state: {:?}", other),
    }
}

#[test]
fn test_distinct_names_do_not_interact() {
    let (_temp_dir, build) = build_dir();

    let _ = fast_guard(&build, "a").ensure_done(|| Err::<(), _>("a failed"));
    let outcome = fast_guard(&build, "b")
        .ensure_done(|| Ok::<_, io::Error>("b ran"))
        .unwrap();

    assert_eq!(outcome, Outcome::Executed("b ran"));
}

#[test]
fn test_invalid_name_rejected() {
    let (_temp_dir, build) = build_dir();
    let err = CallOnce::new(build, "../escape").unwrap_err();
    assert!(matches!(err, OnceError::InvalidName(_)));
}

// ----------------------------------------------------------------------------
// Coordination
// ----------------------------------------------------------------------------

#[test]
#[serial]
fn test_timeout_is_distinct_from_operation_failure() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test");
    let paths = guard.paths().clone();

    // A live holder on another host.
    fs::create_dir_all(&paths.lock_path).unwrap();
    let holder = HolderRecord {
        hostname: "other".to_string(),
        pid: 999_999,
        timestamp: HolderRecord::current().timestamp,
    };
    holder.write_to(&paths.lock_path).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let err = guard
        .with_timeout(Some(Duration::from_millis(200)))
        .ensure_done(counting_op(&calls))
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(!err.is_prior_failure());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!paths.done_file.exists());
    assert!(!paths.fail_file.exists());
    assert!(paths.lock_path.is_dir());
}

#[test]
#[serial]
fn test_abandoned_local_lock_does_not_block() {
    let (_temp_dir, build) = build_dir();
    let guard = fast_guard(&build, "test").with_probe(Arc::new(FixedProbe(Liveness::Dead)));
    let paths = guard.paths().clone();

    fs::create_dir_all(&paths.lock_path).unwrap();
    HolderRecord {
        hostname: crate::locks::holder::local_hostname(),
        pid: 31337,
        timestamp: HolderRecord::current().timestamp,
    }
    .write_to(&paths.lock_path)
    .unwrap();

    let start = Instant::now();
    let outcome = guard.ensure_done(|| Ok::<_, io::Error>(())).unwrap();

    assert!(outcome.was_executed());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
#[serial]
fn test_ten_threads_run_operation_once() {
    let (_temp_dir, build) = build_dir();
    let counter = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(10));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let build = build.clone();
            let counter = counter.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                fast_guard(&build, "compile").ensure_done(move || {
                    thread::sleep(Duration::from_millis(50));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, io::Error>(())
                })
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.iter().filter(|o| o.was_executed()).count(), 1);
}

#[test]
#[serial]
fn test_concurrent_callers_all_observe_failure() {
    let (_temp_dir, build) = build_dir();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let build = build.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                fast_guard(&build, "compile").ensure_done(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Err::<(), _>("compile error")
                })
            })
        })
        .collect();

    let errors: Vec<OnceError> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap_err())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let executed = errors
        .iter()
        .filter(|e| matches!(e, OnceError::Operation { .. }))
        .count();
    let prior = errors.iter().filter(|e| e.is_prior_failure()).count();
    assert_eq!(executed, 1);
    assert_eq!(prior, 7);
    assert!(errors.iter().all(|e| e.to_string().contains("compile error")));
}

/// Set in child processes spawned by `test_separate_processes_run_operation_once`.
const CHILD_BASE_ENV: &str = "ONCEFS_TEST_CHILD_BASE";

const CHILD_TEST_NAME: &str = "once::tests::child_process_appends_once";

/// Runs inside a child process; a no-op when invoked directly.
#[test]
#[ignore]
fn child_process_appends_once() {
    let Ok(base) = std::env::var(CHILD_BASE_ENV) else {
        return;
    };
    let base = PathBuf::from(base);
    let runs = base.join("runs.log");

    fast_guard(&base, "cross_process")
        .ensure_done(|| -> Result<(), io::Error> {
            use std::io::Write;
            thread::sleep(Duration::from_millis(50));
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&runs)?;
            writeln!(file, "{}", std::process::id())
        })
        .unwrap();
}

#[test]
#[serial]
fn test_separate_processes_run_operation_once() {
    let (_temp_dir, build) = build_dir();
    fs::create_dir_all(&build).unwrap();
    let exe = std::env::current_exe().unwrap();

    let children: Vec<_> = (0..6)
        .map(|_| {
            Command::new(&exe)
                .args([CHILD_TEST_NAME, "--exact", "--ignored", "--test-threads=1"])
                .env(CHILD_BASE_ENV, &build)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .unwrap()
        })
        .collect();

    for mut child in children {
        let status = child.wait().unwrap();
        assert!(status.success(), "child exited with {}", status);
    }

    let runs = fs::read_to_string(build.join("runs.log")).unwrap();
    assert_eq!(runs.lines().count(), 1, "runs.log: {:?}", runs);
    let runner: u32 = runs.trim().parse().unwrap();
    assert_ne!(runner, std::process::id());
    assert!(fast_guard(&build, "cross_process").paths().done_file.is_file());
}

#[test]
fn test_free_functions() {
    let (_temp_dir, build) = build_dir();
    let counter = Arc::new(AtomicUsize::new(0));

    let first = ensure_done(&build, "step", counting_op(&counter), Some(Duration::from_secs(5)));
    let second = ensure_done(&build, "step", counting_op(&counter), None);

    assert!(first.unwrap().was_executed());
    assert_eq!(second.unwrap(), Outcome::AlreadyDone);

    clean(&build, "step").unwrap();
    assert!(ensure_done(&build, "step", counting_op(&counter), None)
        .unwrap()
        .was_executed());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
