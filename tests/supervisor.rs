//! End-to-end supervisor tests against real processes.
//!
//! These drive the supervisor with small `sh` scripts and assert the event
//! contract: ordered output, a single completion event, cancellation, and
//! the single-active-job invariant.

#![cfg(unix)]

use smiffer_cli::model::{Invocation, JobEvent, JobStatus};
use smiffer_cli::supervisor::{JobSupervisor, SupervisorError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn sh(script: &str) -> Invocation {
    Invocation {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
        working_dir: PathBuf::from("/tmp"),
    }
}

/// Collect every event until the supervisor closes the channel.
async fn drain(mut rx: mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

fn output_texts(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            JobEvent::OutputLine(line) => Some(line.text.clone()),
            _ => None,
        })
        .collect()
}

fn completions(events: &[JobEvent]) -> Vec<JobStatus> {
    events
        .iter()
        .filter_map(|ev| match ev {
            JobEvent::Completed { status } => Some(*status),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn successful_job_delivers_all_lines_in_order_before_completion() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor
        .start(&sh("printf 'one\\ntwo\\nthree\\n'"), tx)
        .unwrap();

    let status = supervisor.wait().await.unwrap();
    assert_eq!(status, JobStatus::Succeeded);

    let events = drain(rx).await;
    assert!(matches!(events.first(), Some(JobEvent::Started { .. })));
    assert_eq!(output_texts(&events), vec!["one", "two", "three"]);
    assert_eq!(completions(&events), vec![JobStatus::Succeeded]);
    // Completion is the final event, after every output line.
    assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));
}

#[tokio::test]
async fn starting_while_running_fails_with_already_running() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor.start(&sh("sleep 5"), tx).unwrap();
    assert!(supervisor.is_running());

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let err = supervisor.start(&sh("true"), tx2).unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning));

    let status = supervisor.cancel().await.unwrap();
    assert_eq!(status, JobStatus::Cancelled);
}

#[tokio::test]
async fn supervisor_is_reusable_after_completion() {
    let mut supervisor = JobSupervisor::new();

    let (tx, _rx) = mpsc::unbounded_channel();
    supervisor.start(&sh("true"), tx).unwrap();
    assert_eq!(supervisor.wait().await, Some(JobStatus::Succeeded));
    assert!(!supervisor.is_running());

    let (tx, _rx) = mpsc::unbounded_channel();
    supervisor.start(&sh("true"), tx).unwrap();
    assert_eq!(supervisor.wait().await, Some(JobStatus::Succeeded));
}

#[tokio::test]
async fn nonzero_exit_reports_failed_with_code() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor.start(&sh("echo boom; exit 3"), tx).unwrap();

    let status = supervisor.wait().await.unwrap();
    assert_eq!(status, JobStatus::Failed { exit_code: 3 });

    let events = drain(rx).await;
    assert_eq!(completions(&events), vec![JobStatus::Failed { exit_code: 3 }]);
    assert_eq!(output_texts(&events), vec!["boom"]);
}

#[tokio::test]
async fn cancel_mid_run_reports_cancelled_promptly() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor.start(&sh("sleep 30"), tx).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    let status = supervisor.cancel().await.unwrap();
    assert_eq!(status, JobStatus::Cancelled);
    // cancel() resolves once the monitor observed termination, not after the
    // sleep ran its course.
    assert!(started.elapsed() < Duration::from_secs(5));

    let events = drain(rx).await;
    assert_eq!(completions(&events), vec![JobStatus::Cancelled]);
}

#[tokio::test]
async fn cancel_without_active_job_is_a_no_op() {
    let mut supervisor = JobSupervisor::new();
    assert_eq!(supervisor.cancel().await, None);
    assert_eq!(supervisor.wait().await, None);
}

#[tokio::test]
async fn launch_failure_is_synchronous_and_leaves_supervisor_idle() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    let invocation = Invocation {
        program: PathBuf::from("/no/such/binary"),
        args: vec!["prot".to_string()],
        working_dir: PathBuf::from("/tmp"),
    };
    let err = supervisor.start(&invocation, tx).unwrap_err();
    assert!(matches!(err, SupervisorError::Launch { .. }));
    assert!(!supervisor.is_running());

    // A fresh job can still be started afterwards.
    let (tx, _rx) = mpsc::unbounded_channel();
    supervisor.start(&sh("true"), tx).unwrap();
    assert_eq!(supervisor.wait().await, Some(JobStatus::Succeeded));
}

#[tokio::test]
async fn progress_events_mirror_only_keyword_lines() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor
        .start(
            &sh("echo 'Processing frame 1 of 10'; echo 'wrote log'; echo 'Saving grid'"),
            tx,
        )
        .unwrap();
    supervisor.wait().await.unwrap();

    let events = drain(rx).await;
    let progress: Vec<String> = events
        .iter()
        .filter_map(|ev| match ev {
            JobEvent::Progress(line) => Some(line.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec!["Processing frame 1 of 10", "Saving grid"]);
    // Progress lines also appear in the full output stream.
    assert_eq!(output_texts(&events).len(), 3);
}

#[tokio::test]
async fn stderr_lines_are_relayed_too() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor
        .start(&sh("echo out; echo err 1>&2"), tx)
        .unwrap();
    supervisor.wait().await.unwrap();

    let events = drain(rx).await;
    let mut texts = output_texts(&events);
    texts.sort();
    assert_eq!(texts, vec!["err", "out"]);
}

#[tokio::test]
async fn working_directory_is_honored() {
    let tmp = tempfile::tempdir().unwrap();
    let invocation = Invocation {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), "pwd".to_string()],
        working_dir: tmp.path().to_path_buf(),
    };
    let (tx, rx) = mpsc::unbounded_channel();
    let mut supervisor = JobSupervisor::new();
    supervisor.start(&invocation, tx).unwrap();
    supervisor.wait().await.unwrap();

    let events = drain(rx).await;
    let texts = output_texts(&events);
    assert_eq!(texts.len(), 1);
    // Compare canonicalized paths; the temp dir may be behind a symlink.
    assert_eq!(
        std::fs::canonicalize(&texts[0]).unwrap(),
        std::fs::canonicalize(tmp.path()).unwrap()
    );
}
