//! Slurm adapter: submits rendered commands with `sbatch --parsable`.
//!
//! Resource flags are derived from the job kind's capabilities. A kind that
//! cannot use GPUs never gets `--gres`, and a kind that cannot use MPI runs
//! as a single task regardless of configuration.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::submission::{ClusterSubmitter, SubmissionRequest, SubmitterError};
use crate::subprocess::{run_command, SubprocessError};

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct SbatchConfig {
    /// Program to execute (default: `sbatch`).
    pub program: String,
    /// Arguments placed before every generated flag. Lets a wrapper script
    /// stand in for `sbatch`.
    pub program_args: Vec<String>,
    /// Target partition; omitted from the command when `None`.
    pub partition: Option<String>,
    /// GPUs requested for GPU-capable kinds. `0` disables `--gres`.
    pub gpus: u32,
    /// MPI ranks for MPI-capable kinds.
    pub mpi_tasks: u32,
    /// Limit on how long `sbatch` itself may take.
    pub timeout: Duration,
}

impl Default for SbatchConfig {
    fn default() -> Self {
        Self {
            program: "sbatch".into(),
            program_args: Vec::new(),
            partition: None,
            gpus: 1,
            mpi_tasks: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SbatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default  |
    /// |-----------------------|----------|
    /// | `SBATCH_PROGRAM`      | `sbatch` |
    /// | `SBATCH_PARTITION`    | unset    |
    /// | `SBATCH_GPUS`         | `1`      |
    /// | `SBATCH_MPI_TASKS`    | `1`      |
    /// | `SBATCH_TIMEOUT_SECS` | `30`     |
    pub fn from_env() -> Self {
        let program = std::env::var("SBATCH_PROGRAM").unwrap_or_else(|_| "sbatch".into());

        let partition = std::env::var("SBATCH_PARTITION")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let gpus: u32 = std::env::var("SBATCH_GPUS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("SBATCH_GPUS must be a valid u32");

        let mpi_tasks: u32 = std::env::var("SBATCH_MPI_TASKS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("SBATCH_MPI_TASKS must be a valid u32");

        let timeout_secs: u64 = std::env::var("SBATCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SBATCH_TIMEOUT_SECS must be a valid u64");

        Self {
            program,
            program_args: Vec::new(),
            partition,
            gpus,
            mpi_tasks,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

pub struct SbatchSubmitter {
    config: SbatchConfig,
}

impl SbatchSubmitter {
    pub fn new(config: SbatchConfig) -> Self {
        Self { config }
    }

    /// Full argument list passed to the configured program.
    pub fn sbatch_args(&self, request: &SubmissionRequest) -> Vec<String> {
        let build = &request.build;
        let rel = &build.relative_output_path;

        let mut args = self.config.program_args.clone();
        args.push("--parsable".into());
        args.push(format!("--job-name={}", build.job_name));
        args.push(format!("--chdir={}", request.project.root.display()));
        args.push(format!("--output={rel}/run.out"));
        args.push(format!("--error={rel}/run.err"));

        if let Some(partition) = &self.config.partition {
            args.push(format!("--partition={partition}"));
        }
        if build.supports_gpu && self.config.gpus > 0 {
            args.push(format!("--gres=gpu:{}", self.config.gpus));
        }

        let mpi = build.supports_mpi && self.config.mpi_tasks > 1;
        if mpi {
            args.push(format!("--ntasks={}", self.config.mpi_tasks));
        }

        let mut command = Vec::with_capacity(build.argv.len() + 1);
        if mpi {
            command.push("srun".to_string());
        }
        command.extend(build.argv.iter().map(|a| shell_quote(a)));

        args.push("--wrap".into());
        args.push(command.join(" "));
        args
    }
}

#[async_trait]
impl ClusterSubmitter for SbatchSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<String, SubmitterError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.sbatch_args(request));

        let root = request.project.root.as_path();
        let output = run_command(&mut cmd, Some(root), self.config.timeout)
            .await
            .map_err(|e| match e {
                SubprocessError::Io(source) => SubmitterError::Spawn {
                    program: self.config.program.clone(),
                    source,
                },
                SubprocessError::Timeout { elapsed_ms } => SubmitterError::Timeout { elapsed_ms },
            })?;

        if !output.success() {
            return Err(SubmitterError::Rejected {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let job_id = parse_job_id(&output.stdout)
            .ok_or_else(|| SubmitterError::UnparsableResponse(output.stdout.clone()))?;

        tracing::debug!(
            job_id = %job_id,
            duration_ms = output.duration_ms,
            root = %request.project.root.display(),
            "sbatch accepted job",
        );
        Ok(job_id)
    }
}

/// Extract the job id from `sbatch --parsable` output: `<id>` or
/// `<id>;<cluster>` on the last non-empty line.
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let line = stdout.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let id = line.split(';').next()?.trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit() || c == '_') {
        Some(id.to_string())
    } else {
        None
    }
}

/// Quote one token for `/bin/sh`. Plain tokens are left as they are.
fn shell_quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@+%".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
