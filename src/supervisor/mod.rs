//! External-job supervisor.
//!
//! Owns the lifecycle of one Smiffer process at a time: launches it off the
//! caller's execution context, relays its combined stdout/stderr line by
//! line as events, and supports cancellation that kills the process and
//! resolves only once the monitor has observed termination. Completion is
//! reported exactly once per job, after the final output line.

pub mod progress;

use crate::model::{Invocation, JobEvent, JobStatus, LogLine};
use log::{debug, warn};
use std::process::Stdio;
use thiserror::Error;
use time::macros::format_description;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Errors surfaced synchronously by [`JobSupervisor::start`]. Everything
/// that happens after a successful launch is reported through the event
/// channel instead.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("a Smiffer job is already running")]
    AlreadyRunning,
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Control messages sent to the monitor task.
#[derive(Debug, Clone)]
enum JobControl {
    Cancel,
}

/// Handle for a live job: the control channel plus the monitor task that
/// owns the child process.
struct ActiveJob {
    control_tx: UnboundedSender<JobControl>,
    monitor: JoinHandle<JobStatus>,
}

/// Supervises at most one external job at a time.
pub struct JobSupervisor {
    active: Option<ActiveJob>,
}

impl JobSupervisor {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Whether a job is currently being monitored.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|job| !job.monitor.is_finished())
    }

    /// Launch `invocation` and start monitoring it in the background.
    ///
    /// Returns immediately. Spawn failures (missing binary, bad working
    /// directory) are reported here; a job that is still running makes this
    /// fail with [`SupervisorError::AlreadyRunning`] regardless of the new
    /// invocation.
    pub fn start(
        &mut self,
        invocation: &Invocation,
        event_tx: UnboundedSender<JobEvent>,
    ) -> Result<(), SupervisorError> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning);
        }

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| SupervisorError::Launch {
            program: invocation.program.display().to_string(),
            source,
        })?;
        debug!(
            "spawned {} (pid {:?}) in {}",
            invocation.program.display(),
            child.id(),
            invocation.working_dir.display()
        );
        let _ = event_tx.send(JobEvent::Started { pid: child.id() });

        let (control_tx, control_rx) = mpsc::unbounded_channel::<JobControl>();
        let monitor = tokio::spawn(run_monitor(child, control_rx, event_tx));
        self.active = Some(ActiveJob {
            control_tx,
            monitor,
        });
        Ok(())
    }

    /// Cancel the running job: kill the process and wait until the monitor
    /// has observed termination. Returns the final status, or `None` when no
    /// job is active. A job cancelled mid-run finishes as
    /// [`JobStatus::Cancelled`], never `Failed`.
    pub async fn cancel(&mut self) -> Option<JobStatus> {
        let job = self.active.take()?;
        let _ = job.control_tx.send(JobControl::Cancel);
        match job.monitor.await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("monitor task join failed during cancel: {e}");
                Some(JobStatus::Cancelled)
            }
        }
    }

    /// Wait for the running job to finish without cancelling it. Returns
    /// `None` when no job is active.
    pub async fn wait(&mut self) -> Option<JobStatus> {
        let job = self.active.take()?;
        match job.monitor.await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("monitor task join failed: {e}");
                Some(JobStatus::Failed { exit_code: -1 })
            }
        }
    }
}

impl Default for JobSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// `HH:MM:SS` stamp for relayed log lines.
fn now_stamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into())
}

/// Relay lines from one pipe into the shared line channel until EOF.
fn spawn_line_reader<R>(reader: R, tx: UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Read errors end the stream; the exit status still
                    // reaches the consumer through the completion event.
                    warn!("error reading job output: {e}");
                    break;
                }
            }
        }
    })
}

/// Background monitor: relays output, handles cancellation, reaps the child,
/// and emits exactly one `Completed` event on every path.
async fn run_monitor(
    mut child: Child,
    mut control_rx: UnboundedReceiver<JobControl>,
    event_tx: UnboundedSender<JobEvent>,
) -> JobStatus {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, line_tx.clone());
    }
    // The readers hold the only remaining senders; the relay loop ends once
    // both pipes close.
    drop(line_tx);

    let mut cancel_requested = false;
    let mut control_open = true;

    // Phase 1: drain output to exhaustion so completion is delivered
    // strictly after the last line.
    loop {
        tokio::select! {
            maybe_line = line_rx.recv() => match maybe_line {
                Some(line) => {
                    let text = line.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    let entry = LogLine {
                        timestamp: now_stamp(),
                        text,
                    };
                    let is_progress = progress::is_progress_line(&entry.text);
                    let _ = event_tx.send(JobEvent::OutputLine(entry.clone()));
                    if is_progress {
                        let _ = event_tx.send(JobEvent::Progress(entry));
                    }
                }
                None => break,
            },
            ctrl = control_rx.recv(), if control_open => match ctrl {
                Some(JobControl::Cancel) => {
                    cancel_requested = true;
                    if let Err(e) = child.start_kill() {
                        warn!("failed to signal job process: {e}");
                    }
                }
                None => control_open = false,
            },
        }
    }

    // Phase 2: reap the child. Cancellation must stay live here: a job can
    // close its pipes and keep running.
    let exit_res = loop {
        tokio::select! {
            res = child.wait() => break res,
            ctrl = control_rx.recv(), if control_open => match ctrl {
                Some(JobControl::Cancel) => {
                    cancel_requested = true;
                    if let Err(e) = child.start_kill() {
                        warn!("failed to signal job process: {e}");
                    }
                }
                None => control_open = false,
            },
        }
    };

    let status = match exit_res {
        Ok(_) if cancel_requested => JobStatus::Cancelled,
        Ok(exit) if exit.success() => JobStatus::Succeeded,
        Ok(exit) => JobStatus::Failed {
            exit_code: exit.code().unwrap_or(-1),
        },
        Err(e) => {
            warn!("failed waiting for job process: {e}");
            if cancel_requested {
                JobStatus::Cancelled
            } else {
                JobStatus::Failed { exit_code: -1 }
            }
        }
    };

    let _ = event_tx.send(JobEvent::Completed { status });
    status
}
