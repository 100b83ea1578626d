//! Job command builders.
//!
//! Every job kind implements [`JobCommandBuilder`]: it validates its own
//! parameter set, declares static GPU/MPI capabilities, and renders its
//! kind-specific arguments. The parts of a command line that every kind
//! shares (program token first, project-relative output directory, trailing
//! `--pipeline_control` marker) are added by [`ValidatedJob::build_command`],
//! so no variant can drift from that convention.
//!
//! A command can only be built from a [`ValidatedJob`], and one can only be
//! obtained by passing `validate()`.

pub mod args;
pub mod class2d;
pub mod ctf_find;
pub mod import;
pub mod join_star;
pub mod kind;
pub mod motion_corr;
pub mod refine3d;
pub mod registry;

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::params::ParamBag;
use crate::types::{ActingUser, ProjectContext};

pub use kind::JobKind;
pub use registry::BuilderRegistry;

/// Flag appended to every command so the scheduler can find the job's
/// pipeline control files.
pub const PIPELINE_CONTROL_FLAG: &str = "--pipeline_control";

/// Static per-kind resource eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_gpu: bool,
    pub supports_mpi: bool,
}

/// Outcome of a builder's business-rule checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The human-readable reason, if invalid.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(message) => Some(message),
        }
    }
}

/// A rendered, cluster-submittable command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Program followed by its arguments. Never empty.
    pub argv: Vec<String>,
    pub supports_gpu: bool,
    pub supports_mpi: bool,
    /// Output directory relative to the project root, without a trailing slash.
    pub relative_output_path: String,
    pub job_name: String,
}

/// Everything a builder is constructed from.
#[derive(Debug, Clone)]
pub struct BuilderContext {
    pub params: ParamBag,
    pub project: ProjectContext,
    pub user: ActingUser,
}

impl BuilderContext {
    pub fn new(params: ParamBag, project: ProjectContext, user: ActingUser) -> Self {
        Self {
            params,
            project,
            user,
        }
    }
}

/// The contract every job kind implements.
pub trait JobCommandBuilder: Send + Sync {
    fn kind(&self) -> JobKind;

    /// The context the builder was constructed from.
    fn context(&self) -> &BuilderContext;

    fn capabilities(&self) -> Capabilities;

    /// Kind-specific precondition checks over the parameter bag.
    fn validate(&self) -> ValidationResult;

    /// Executable placed at `argv[0]`.
    fn program(&self) -> &'static str;

    /// Kind-specific arguments, given the project-relative output directory.
    ///
    /// Only called on a builder that passed [`validate`](Self::validate).
    fn arguments(&self, output_dir: &str) -> Vec<String>;
}

/// A builder whose parameters passed validation.
pub struct ValidatedJob {
    builder: Box<dyn JobCommandBuilder>,
}

impl std::fmt::Debug for ValidatedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedJob")
            .field("kind", &self.builder.kind())
            .field("project", self.project())
            .finish()
    }
}

impl ValidatedJob {
    /// Run `validate()` and keep the builder only if it passes.
    pub fn new(builder: Box<dyn JobCommandBuilder>) -> Result<Self, CoreError> {
        match builder.validate() {
            ValidationResult::Valid => Ok(Self { builder }),
            ValidationResult::Invalid(message) => Err(CoreError::Validation(message)),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.builder.kind()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.builder.capabilities()
    }

    pub fn project(&self) -> &ProjectContext {
        &self.builder.context().project
    }

    /// Render the full command line.
    ///
    /// Deterministic for a fixed parameter set and output directory. Fails
    /// only when `output_directory` is not inside the project root.
    pub fn build_command(
        &self,
        output_directory: &str,
        job_name: &str,
    ) -> Result<BuildResult, CoreError> {
        let relative = make_relative(&self.project().root, output_directory)?;
        let capabilities = self.capabilities();

        let mut argv = vec![self.builder.program().to_string()];
        argv.extend(self.builder.arguments(&relative));
        argv.push(PIPELINE_CONTROL_FLAG.to_string());
        argv.push(format!("{relative}/"));

        Ok(BuildResult {
            argv,
            supports_gpu: capabilities.supports_gpu,
            supports_mpi: capabilities.supports_mpi,
            relative_output_path: relative,
            job_name: job_name.to_string(),
        })
    }
}

/// Express `output_directory` relative to `project_root`.
///
/// Absolute paths must lie inside the root; relative paths are taken as
/// already relative to it. Both are normalised lexically (`.` and `..`
/// resolved, separators collapsed) and rendered with `/` separators and no
/// trailing slash. A path that escapes the root or names the root itself is
/// rejected, as is everything when the root itself is not absolute.
pub fn make_relative(project_root: &Path, output_directory: &str) -> Result<String, CoreError> {
    let outside = || CoreError::OutputOutsideProject {
        path: output_directory.to_string(),
        root: project_root.display().to_string(),
    };
    if !project_root.is_absolute() {
        return Err(outside());
    }

    let output = Path::new(output_directory.trim());
    let parts = if output.is_absolute() {
        let root = normalize(project_root).ok_or_else(outside)?;
        let full = normalize(output).ok_or_else(outside)?;
        if full.len() <= root.len() || full[..root.len()] != root[..] {
            return Err(outside());
        }
        full[root.len()..].to_vec()
    } else {
        normalize(output).ok_or_else(outside)?
    };

    if parts.is_empty() {
        return Err(outside());
    }
    Ok(parts.join("/"))
}

/// Lexically normalise a path into its named components.
///
/// Returns `None` when `..` would climb above the starting point.
fn normalize(path: &Path) -> Option<Vec<String>> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
