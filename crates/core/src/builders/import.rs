//! Import raw movies or micrographs into the project.

use std::sync::LazyLock;

use regex::Regex;

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_import";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: false,
    supports_mpi: false,
};

/// Optics group names end up as STAR table values; no whitespace allowed.
static OPTICS_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"));

const NODE_MOVIES: &str = "movies";
const NODE_MICROGRAPHS: &str = "micrographs";

pub struct ImportBuilder {
    ctx: BuilderContext,
}

impl ImportBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    fn node_type(&self) -> String {
        self.ctx
            .params
            .get_str("nodeType", NODE_MOVIES)
            .trim()
            .to_ascii_lowercase()
    }

    fn input_pattern(&self) -> String {
        self.ctx
            .params
            .get_str(["inputFiles", "fn_in_raw"], "")
            .trim()
            .to_string()
    }
}

impl JobCommandBuilder for ImportBuilder {
    fn kind(&self) -> JobKind {
        JobKind::Import
    }

    fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn validate(&self) -> ValidationResult {
        let p = &self.ctx.params;

        if self.input_pattern().is_empty() {
            return ValidationResult::invalid("An input file pattern is required");
        }
        let node = self.node_type();
        if node != NODE_MOVIES && node != NODE_MICROGRAPHS {
            return ValidationResult::invalid(format!(
                "Unsupported node type '{node}': expected movies or micrographs"
            ));
        }
        if p.get_f64("angpix", 0.0) <= 0.0 {
            return ValidationResult::invalid("Pixel size (angpix) must be positive");
        }
        if p.get_f64("kV", 300.0) <= 0.0 {
            return ValidationResult::invalid("Acceleration voltage (kV) must be positive");
        }
        let group = p.get_str("opticsGroupName", "opticsGroup1");
        if !OPTICS_GROUP_RE.is_match(&group) {
            return ValidationResult::invalid(format!(
                "Optics group name '{group}' may only contain letters, digits, '.', '-' and '_'"
            ));
        }
        ValidationResult::Valid
    }

    fn program(&self) -> &'static str {
        PROGRAM
    }

    fn arguments(&self, output_dir: &str) -> Vec<String> {
        let p = &self.ctx.params;
        let movies = self.node_type() == NODE_MOVIES;

        let mut args = ArgList::new();
        args.flag(if movies { "--do_movies" } else { "--do_micrographs" })
            .value(
                "--optics_group_name",
                p.get_str("opticsGroupName", "opticsGroup1"),
            )
            .non_empty("--optics_group_mtf", &p.get_str("mtfFile", ""))
            .value("--angpix", p.get_f64("angpix", 0.0))
            .value("--kV", p.get_f64("kV", 300.0))
            .value("--Cs", p.get_f64("Cs", 2.7))
            .value("--Q0", p.get_f64("Q0", 0.1))
            .value("--beamtilt_x", p.get_f64("beamtiltX", 0.0))
            .value("--beamtilt_y", p.get_f64("beamtiltY", 0.0))
            .value("--i", self.input_pattern())
            .value("--odir", format!("{output_dir}/"))
            .value(
                "--ofile",
                if movies { "movies.star" } else { "micrographs.star" },
            );
        args.into_vec()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
