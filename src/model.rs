use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Computation mode accepted by the Smiffer tool. Closed set; the first
/// positional argument of every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Prot,
    Rna,
    Ligand,
}

impl JobMode {
    /// Argument spelling expected by the external tool.
    pub fn as_arg(self) -> &'static str {
        match self {
            JobMode::Prot => "prot",
            JobMode::Rna => "rna",
            JobMode::Ligand => "ligand",
        }
    }
}

/// Pocket-sphere restriction: radius plus center, passed as `-ps r x y z`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PocketSphere {
    pub radius: f64,
    pub center: [f64; 3],
}

/// Everything needed to launch one Smiffer job. Immutable once the job
/// starts; the optional fields map 1:1 to the tool's flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Path to the Smiffer executable (or script).
    pub program: PathBuf,
    pub mode: JobMode,
    pub input: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub trajectory: Option<PathBuf>,
    /// Precomputed electrostatics field (`.dx`), passed as `-a`.
    #[serde(default)]
    pub apbs_file: Option<PathBuf>,
    #[serde(default)]
    pub pocket_sphere: Option<PocketSphere>,
    #[serde(default)]
    pub chem_table: Option<PathBuf>,
    #[serde(default)]
    pub config_file: Option<PathBuf>,
}

impl JobSpec {
    /// Build the exact argument list for the tool:
    /// `<mode> <input> [-o <dir>] [-t <traj>] [-a <field>] [-ps r x y z]
    /// [-b <chem>] [-c <config>]`. Flag order is fixed.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            self.mode.as_arg().to_string(),
            self.input.display().to_string(),
        ];
        if let Some(dir) = &self.output_dir {
            args.push("-o".into());
            args.push(dir.display().to_string());
        }
        if let Some(traj) = &self.trajectory {
            args.push("-t".into());
            args.push(traj.display().to_string());
        }
        if let Some(apbs) = &self.apbs_file {
            args.push("-a".into());
            args.push(apbs.display().to_string());
        }
        if let Some(ps) = &self.pocket_sphere {
            args.push("-ps".into());
            args.push(ps.radius.to_string());
            args.push(ps.center[0].to_string());
            args.push(ps.center[1].to_string());
            args.push(ps.center[2].to_string());
        }
        if let Some(chem) = &self.chem_table {
            args.push("-b".into());
            args.push(chem.display().to_string());
        }
        if let Some(cfg) = &self.config_file {
            args.push("-c".into());
            args.push(cfg.display().to_string());
        }
        args
    }

    /// The tool runs from its own directory so it can find bundled data.
    pub fn working_dir(&self) -> PathBuf {
        match self.program.parent() {
            Some(p) if p != Path::new("") => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Where result files land: the `-o` directory, else next to the input.
    pub fn effective_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        match self.input.parent() {
            Some(p) if p != Path::new("") => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Resolve the spec into a concrete invocation for the supervisor.
    pub fn invocation(&self) -> Invocation {
        Invocation {
            program: self.program.clone(),
            args: self.to_args(),
            working_dir: self.working_dir(),
        }
    }
}

/// A concrete command line: program, ordered arguments, working directory.
/// This is what the supervisor launches; tests build these directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Succeeded,
    Failed { exit_code: i32 },
    Cancelled,
}

/// One timestamped line of job output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    /// Wall-clock `HH:MM:SS` stamp taken at relay time.
    pub timestamp: String,
    pub text: String,
}

/// Events emitted by the supervisor and consumed by presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Started {
        pid: Option<u32>,
    },
    /// Every non-empty output line, in stream order.
    OutputLine(LogLine),
    /// Subset of output lines that match the progress vocabulary.
    Progress(LogLine),
    /// Exactly once per job, after the last output line.
    Completed {
        status: JobStatus,
    },
}

/// A discovered result file and the color assigned to it, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub path: PathBuf,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Outcome of one CLI run: job identity, final status, and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub timestamp_utc: String,
    pub job_id: String,
    pub mode: JobMode,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub duration_ms: u64,
    pub results: Vec<ResultFile>,
}
