//! Combine STAR files.
//!
//! Three independent groups (particles, micrographs, movies) may each be
//! joined. A group renders as one `--combine` segment only when its
//! `combine*` switch is on; the input slots of a disabled group are ignored
//! even if filled in.

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_star_handler";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: false,
    supports_mpi: false,
};

/// Numbered input slots per group (`particlesStarFile1` .. `particlesStarFile4`).
const SLOTS_PER_GROUP: usize = 4;

/// A join needs something to join.
const MIN_FILES_PER_GROUP: usize = 2;

struct StarGroup {
    label: &'static str,
    switch: &'static str,
    slot_prefix: &'static str,
    output_file: &'static str,
    duplicate_column: &'static str,
}

static GROUPS: [StarGroup; 3] = [
    StarGroup {
        label: "particles",
        switch: "combineParticles",
        slot_prefix: "particlesStarFile",
        output_file: "join_particles.star",
        duplicate_column: "rlnImageName",
    },
    StarGroup {
        label: "micrographs",
        switch: "combineMicrographs",
        slot_prefix: "micrographsStarFile",
        output_file: "join_mics.star",
        duplicate_column: "rlnMicrographName",
    },
    StarGroup {
        label: "movies",
        switch: "combineMovies",
        slot_prefix: "moviesStarFile",
        output_file: "join_movies.star",
        duplicate_column: "rlnMicrographMovieName",
    },
];

pub struct JoinStarBuilder {
    ctx: BuilderContext,
}

impl JoinStarBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    fn enabled(&self, group: &StarGroup) -> bool {
        self.ctx.params.get_bool(group.switch, false)
    }

    fn files(&self, group: &StarGroup) -> Vec<String> {
        let slots = (1..=SLOTS_PER_GROUP).map(|i| format!("{}{i}", group.slot_prefix));
        self.ctx.params.populated(slots)
    }

    fn enabled_groups(&self) -> impl Iterator<Item = &'static StarGroup> + '_ {
        GROUPS.iter().filter(|group| self.enabled(group))
    }
}

impl JobCommandBuilder for JoinStarBuilder {
    fn kind(&self) -> JobKind {
        JobKind::JoinStar
    }

    fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn validate(&self) -> ValidationResult {
        let mut any_enabled = false;
        for group in self.enabled_groups() {
            any_enabled = true;
            let files = self.files(group);
            if files.len() < MIN_FILES_PER_GROUP {
                return ValidationResult::invalid(format!(
                    "Combining {} requires at least {MIN_FILES_PER_GROUP} STAR files",
                    group.label
                ));
            }
            if let Some(bad) = files.iter().find(|f| !f.ends_with(".star")) {
                return ValidationResult::invalid(format!(
                    "{bad} is not a STAR file ({} input)",
                    group.label
                ));
            }
        }

        if !any_enabled {
            return ValidationResult::invalid(
                "Select at least one of particles, micrographs or movies to combine",
            );
        }
        ValidationResult::Valid
    }

    fn program(&self) -> &'static str {
        PROGRAM
    }

    fn arguments(&self, output_dir: &str) -> Vec<String> {
        let mut args = ArgList::new();
        for group in self.enabled_groups() {
            let files = self.files(group);
            if files.is_empty() {
                continue;
            }
            args.flag("--combine")
                .value("--i", files.join(" "))
                .value("--check_duplicates", group.duplicate_column)
                .value("--o", format!("{output_dir}/{}", group.output_file));
        }
        args.into_vec()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::builders::{ValidatedJob, PIPELINE_CONTROL_FLAG};
    use crate::params::ParamBag;
    use crate::types::{ActingUser, ProjectContext};

    fn project() -> ProjectContext {
        ProjectContext::new("P1", "/data/p1")
    }

    fn builder(params: serde_json::Value) -> JoinStarBuilder {
        JoinStarBuilder::new(BuilderContext::new(
            ParamBag::from_value(params),
            project(),
            ActingUser::new("u1", "alice"),
        ))
    }

    fn build(params: serde_json::Value) -> Vec<String> {
        let job = ValidatedJob::new(Box::new(builder(params))).expect("valid");
        job.build_command("/data/p1/JoinStar/job004", "join")
            .expect("builds")
            .argv
    }

    #[test]
    fn particles_only_renders_single_group() {
        let argv = build(json!({
            "combineParticles": true,
            "particlesStarFile1": "a.star",
            "particlesStarFile2": "b.star"
        }));

        assert_eq!(argv[0], "relion_star_handler");
        assert!(argv.contains(&"a.star b.star".to_string()));
        let output = argv
            .windows(2)
            .find(|w| w[0] == "--o")
            .map(|w| w[1].clone())
            .expect("output token");
        assert!(output.ends_with("join_particles.star"));
        assert!(!argv.iter().any(|a| a.contains("join_mics") || a.contains("join_movies")));
        assert!(!argv.iter().any(|a| a.contains("rlnMicrograph")));
    }

    #[test]
    fn all_switches_off_is_invalid() {
        let result = builder(json!({
            "combineParticles": false,
            "combineMicrographs": false,
            "combineMovies": false,
            "particlesStarFile1": "a.star",
            "particlesStarFile2": "b.star"
        }))
        .validate();
        assert!(!result.is_valid());
        assert!(!result.error().unwrap_or_default().is_empty());
    }

    #[test]
    fn enabled_group_needs_two_files() {
        let result = builder(json!({
            "combineMovies": true,
            "moviesStarFile1": "m1.star"
        }))
        .validate();
        assert_eq!(
            result.error(),
            Some("Combining movies requires at least 2 STAR files")
        );
    }

    #[test]
    fn non_star_input_is_invalid() {
        let result = builder(json!({
            "combineMicrographs": "Yes",
            "micrographsStarFile1": "mics.star",
            "micrographsStarFile3": "mics.txt"
        }))
        .validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn sparse_slots_and_two_groups_render_without_gaps() {
        let argv = build(json!({
            "combineParticles": true,
            "particlesStarFile1": "a.star",
            "particlesStarFile2": "",
            "particlesStarFile4": "d.star",
            "combineMovies": true,
            "moviesStarFile2": "m2.star",
            "moviesStarFile3": "m3.star"
        }));

        assert_eq!(
            argv,
            vec![
                "relion_star_handler",
                "--combine",
                "--i",
                "a.star d.star",
                "--check_duplicates",
                "rlnImageName",
                "--o",
                "JoinStar/job004/join_particles.star",
                "--combine",
                "--i",
                "m2.star m3.star",
                "--check_duplicates",
                "rlnMicrographMovieName",
                "--o",
                "JoinStar/job004/join_movies.star",
                PIPELINE_CONTROL_FLAG,
                "JoinStar/job004/",
            ]
        );
        assert!(argv.iter().all(|a| !a.is_empty()));
    }

    #[test]
    fn rendering_is_deterministic() {
        let params = json!({
            "combineParticles": true,
            "particlesStarFile1": "a.star",
            "particlesStarFile2": "b.star",
            "combineMicrographs": true,
            "micrographsStarFile1": "x.star",
            "micrographsStarFile2": "y.star"
        });
        let job = ValidatedJob::new(Box::new(builder(params))).expect("valid");
        let first = job.build_command("JoinStar/job009", "j").expect("builds");
        let second = job.build_command("JoinStar/job009", "j").expect("builds");
        assert_eq!(first, second);
        assert_eq!(first.relative_output_path, "JoinStar/job009");
        assert!(!first.supports_gpu);
        assert!(!first.supports_mpi);
    }
}
