use crate::coloring;
use crate::model::{JobEvent, JobMode, JobSpec, JobStatus, PocketSphere, ResultFile, RunReport};
use crate::orientations::{CameraTransform, OrientationStore};
use crate::report;
use crate::results::{discover_results, DirSnapshot};
use crate::supervisor::JobSupervisor;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::RngCore;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for the stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "smiffer-cli",
    version,
    about = "Launch Smiffer volumetric field jobs and manage viewer orientations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a Smiffer job and report its result files
    Run(RunArgs),
    /// Manage saved camera orientations
    Orientations(OrientationArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Computation mode
    #[arg(value_enum)]
    pub mode: JobMode,

    /// Input structure file (.pdb, .cif)
    pub input: PathBuf,

    /// Path to the Smiffer executable (falls back to $SMIFFER_PATH, then ./smiffer.py)
    #[arg(long)]
    pub smiffer_path: Option<PathBuf>,

    /// Output directory for result grids (defaults to the input's directory)
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Molecular-dynamics trajectory file
    #[arg(long, short = 't')]
    pub trajectory: Option<PathBuf>,

    /// Precomputed APBS field file (.dx)
    #[arg(long, short = 'a')]
    pub apbs_file: Option<PathBuf>,

    /// Pocket-sphere restriction: radius and center
    #[arg(long, num_args = 4, value_names = ["RADIUS", "X", "Y", "Z"], allow_negative_numbers = true)]
    pub pocket_sphere: Option<Vec<f64>>,

    /// Chemical table file (.chem), ligand mode only
    #[arg(long, short = 'b')]
    pub chem_table: Option<PathBuf>,

    /// Smiffer configuration file (.ini)
    #[arg(long, short = 'c')]
    pub config_file: Option<PathBuf>,

    /// Cancel the job after this long (e.g. "90s", "10m")
    #[arg(long)]
    pub cancel_after: Option<humantime::Duration>,

    /// Discover new result files once the job finishes
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub discover: bool,

    /// Assign field-type colors to discovered results
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub autocolor: bool,

    /// Print the run report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct OrientationArgs {
    /// Store file (defaults to ~/.smiffer_orientations.json)
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub action: OrientationAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum OrientationAction {
    /// List saved orientation names
    List,
    /// Save a camera transform (12 comma-separated floats, row-major)
    Save { name: String, matrix: String },
    /// Print the stored transform for a name
    Show { name: String },
    /// Delete a saved orientation
    Delete { name: String },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => run_job(args).await,
        Command::Orientations(args) => run_orientations(args),
    }
}

/// Generate a random id for this run, for log correlation.
fn gen_job_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Locate the Smiffer tool: explicit flag, then $SMIFFER_PATH, then a
/// `smiffer.py` in the current directory.
fn locate_smiffer(flag: Option<&PathBuf>) -> PathBuf {
    if let Some(p) = flag {
        return p.clone();
    }
    if let Ok(p) = std::env::var("SMIFFER_PATH") {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    PathBuf::from("smiffer.py")
}

/// Build a validated `JobSpec` from CLI arguments.
pub fn build_spec(args: &RunArgs) -> Result<JobSpec> {
    if !args.input.exists() {
        anyhow::bail!(
            "input structure file {} does not exist",
            args.input.display()
        );
    }
    if args.chem_table.is_some() && args.mode != JobMode::Ligand {
        anyhow::bail!("--chem-table only applies to ligand mode");
    }
    let pocket_sphere = match &args.pocket_sphere {
        Some(vals) if vals.len() == 4 => Some(PocketSphere {
            radius: vals[0],
            center: [vals[1], vals[2], vals[3]],
        }),
        Some(vals) => anyhow::bail!("--pocket-sphere needs 4 values, got {}", vals.len()),
        None => None,
    };
    Ok(JobSpec {
        program: locate_smiffer(args.smiffer_path.as_ref()),
        mode: args.mode,
        input: args.input.clone(),
        output_dir: args.output_dir.clone(),
        trajectory: args.trajectory.clone(),
        apbs_file: args.apbs_file.clone(),
        pocket_sphere,
        chem_table: args.chem_table.clone(),
        config_file: args.config_file.clone(),
    })
}

/// Run one Smiffer job end to end: snapshot the output directory, stream the
/// job's log, honor Ctrl-C / `--cancel-after`, then discover and color
/// results and emit the report.
async fn run_job(args: RunArgs) -> Result<()> {
    let spec = build_spec(&args)?;
    let out_dir = spec.effective_output_dir();
    // Snapshot before launch so anything the job writes counts as new.
    let snapshot = DirSnapshot::capture(&out_dir).with_context(|| {
        format!("output directory {} is not readable", out_dir.display())
    })?;

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<JobEvent>();

    let invocation = spec.invocation();
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Running: {} {}",
        invocation.program.display(),
        invocation.args.join(" ")
    )));
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Working directory: {}",
        invocation.working_dir.display()
    )));

    let mut supervisor = JobSupervisor::new();
    supervisor
        .start(&invocation, evt_tx)
        .context("failed to start Smiffer")?;

    let job_id = gen_job_id();
    let started = std::time::Instant::now();
    let cancel_at = args
        .cancel_after
        .map(|d| tokio::time::Instant::now() + Duration::from(d));
    let mut cancel_sent = false;
    let mut final_status: Option<JobStatus> = None;

    loop {
        tokio::select! {
            ev = evt_rx.recv() => match ev {
                Some(JobEvent::Started { pid }) => {
                    if let Some(pid) = pid {
                        let _ = out_tx.send(OutputLine::Stderr(format!("Smiffer started (pid {pid})")));
                    }
                }
                Some(JobEvent::OutputLine(line)) => {
                    let _ = out_tx.send(OutputLine::Stderr(format!("[{}] {}", line.timestamp, line.text)));
                }
                Some(JobEvent::Progress(line)) => {
                    log::debug!("progress: {}", line.text);
                }
                Some(JobEvent::Completed { status }) => {
                    final_status = Some(status);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                let _ = out_tx.send(OutputLine::Stderr("Cancelling…".to_string()));
                cancel_sent = true;
                if let Some(status) = supervisor.cancel().await {
                    final_status = Some(status);
                }
            }
            _ = async {
                match cancel_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => futures::future::pending().await,
                }
            }, if cancel_at.is_some() && !cancel_sent => {
                let _ = out_tx.send(OutputLine::Stderr("Time limit reached, cancelling…".to_string()));
                cancel_sent = true;
                if let Some(status) = supervisor.cancel().await {
                    final_status = Some(status);
                }
            }
        }
    }

    let status = final_status.unwrap_or(JobStatus::Failed { exit_code: -1 });
    let duration_ms = started.elapsed().as_millis() as u64;

    let mut results = Vec::new();
    if args.discover {
        match discover_results(&out_dir, &snapshot) {
            Ok(paths) => {
                for path in paths {
                    let (field, color) = if args.autocolor {
                        match coloring::color_for(&path.to_string_lossy()) {
                            Some(c) => (
                                Some(c.field.to_string()),
                                Some(format!("{} {}", c.name, c.hex)),
                            ),
                            None => (None, None),
                        }
                    } else {
                        (None, None)
                    };
                    results.push(ResultFile { path, field, color });
                }
            }
            Err(e) => {
                let _ = out_tx.send(OutputLine::Stderr(format!("Result discovery failed: {e:#}")));
            }
        }
    }

    let report = RunReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        job_id,
        mode: spec.mode,
        input: spec.input.clone(),
        output_dir: out_dir,
        status,
        duration_ms,
        results,
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in report::build_report_lines(&report).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;

    if let JobStatus::Failed { exit_code } = status {
        anyhow::bail!("Smiffer failed with exit code {exit_code}");
    }
    Ok(())
}

fn run_orientations(args: OrientationArgs) -> Result<()> {
    let mut store = match &args.file {
        Some(path) => OrientationStore::open(path)?,
        None => OrientationStore::open_default()?,
    };
    match args.action {
        OrientationAction::List => {
            if store.is_empty() {
                println!("No saved orientations ({})", store.path().display());
            } else {
                for name in store.names() {
                    println!("{name}");
                }
            }
        }
        OrientationAction::Save { name, matrix } => {
            let transform =
                CameraTransform::from_csv(&matrix).context("invalid camera transform")?;
            let saved = store.save(&name, &transform)?;
            println!("Saved orientation '{saved}'");
        }
        OrientationAction::Show { name } => match store.get(&name) {
            Some(csv) => println!("{csv}"),
            None => anyhow::bail!("no orientation named '{name}'"),
        },
        OrientationAction::Delete { name } => {
            if store.delete(&name)? {
                println!("Deleted orientation '{name}'");
            } else {
                anyhow::bail!("no orientation named '{name}'");
            }
        }
    }
    Ok(())
}
