//! Beam-induced motion correction of raw movies.
//!
//! Runs either the bundled CPU implementation (`--use_own`) or an external
//! MotionCor2 binary on GPUs. Gain reference, defect file and dose
//! weighting are independent optional groups.

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_run_motioncorr";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: true,
    supports_mpi: true,
};

pub struct MotionCorrBuilder {
    ctx: BuilderContext,
}

impl MotionCorrBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    fn use_own(&self) -> bool {
        self.ctx.params.get_bool("useOwnImplementation", true)
    }
}

impl JobCommandBuilder for MotionCorrBuilder {
    fn kind(&self) -> JobKind {
        JobKind::MotionCorr
    }

    fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn validate(&self) -> ValidationResult {
        let p = &self.ctx.params;

        if p.get_str(["inputMovies", "fn_in"], "").trim().is_empty() {
            return ValidationResult::invalid("An input movies STAR file is required");
        }
        if p.get_i64("binFactor", 1) < 1 {
            return ValidationResult::invalid("Binning factor must be at least 1");
        }
        let first = p.get_i64("firstFrame", 1);
        let last = p.get_i64("lastFrame", -1);
        if first < 1 {
            return ValidationResult::invalid("First frame must be 1 or greater");
        }
        if last != -1 && last < first {
            return ValidationResult::invalid("Last frame must be -1 or not before the first frame");
        }
        if p.get_i64("patchX", 1) < 1 || p.get_i64("patchY", 1) < 1 {
            return ValidationResult::invalid("Patch counts must be at least 1");
        }
        if p.get_bool("doseWeighting", true) && p.get_f64("dosePerFrame", 1.0) <= 0.0 {
            return ValidationResult::invalid("Dose per frame must be positive when dose weighting");
        }
        if !self.use_own() && p.get_str("motioncor2Exe", "").trim().is_empty() {
            return ValidationResult::invalid(
                "A MotionCor2 executable is required when not using the bundled implementation",
            );
        }
        ValidationResult::Valid
    }

    fn program(&self) -> &'static str {
        PROGRAM
    }

    fn arguments(&self, output_dir: &str) -> Vec<String> {
        let p = &self.ctx.params;
        let mut args = ArgList::new();

        args.value("--i", p.get_str(["inputMovies", "fn_in"], "").trim())
            .value("--o", format!("{output_dir}/"))
            .value("--first_frame_sum", p.get_i64("firstFrame", 1))
            .value("--last_frame_sum", p.get_i64("lastFrame", -1));

        if self.use_own() {
            args.flag("--use_own").value("--j", p.get_i64("threads", 1));
        } else {
            let ids = p.get_str("gpuIds", "");
            let ids = match ids.trim() {
                "" => "0",
                ids => ids,
            };
            args.flag("--use_motioncor2")
                .value("--motioncor2_exe", p.get_str("motioncor2Exe", "").trim())
                .value("--gpu", ids);
        }

        args.value("--bin_factor", p.get_i64("binFactor", 1))
            .value("--bfactor", p.get_i64("bfactor", 150))
            .value("--dose_per_frame", p.get_f64("dosePerFrame", 1.0))
            .value("--preexposure", p.get_f64("preExposure", 0.0))
            .value("--patch_x", p.get_i64("patchX", 1))
            .value("--patch_y", p.get_i64("patchY", 1));

        let gain = p.get_str("gainRef", "");
        if !gain.trim().is_empty() {
            args.value("--gainref", gain.trim())
                .value("--gain_rot", p.get_i64("gainRot", 0))
                .value("--gain_flip", p.get_i64("gainFlip", 0));
        }

        args.non_empty("--defect_file", &p.get_str("defectFile", ""));

        if p.get_bool("doseWeighting", true) {
            args.flag("--dose_weighting")
                .flag_if(p.get_bool("saveNoDW", false), "--save_noDW");
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
    use crate::params::ParamBag;
    use crate::types::{ActingUser, ProjectContext};

    fn builder(params: serde_json::Value) -> MotionCorrBuilder {
        MotionCorrBuilder::new(BuilderContext::new(
            ParamBag::from_value(params),
            ProjectContext::new("P1", "/data/p1"),
            ActingUser::default(),
        ))
    }

    #[test]
    fn own_implementation_defaults() {
        let b = builder(json!({"inputMovies": "Import/job001/movies.star"}));
        assert!(b.validate().is_valid());

        let args = b.arguments("MotionCorr/job002");
        assert!(args.windows(2).any(|w| w == ["--o", "MotionCorr/job002/"]));
        assert!(args.contains(&"--use_own".to_string()));
        assert!(args.contains(&"--dose_weighting".to_string()));
        assert!(!args.contains(&"--gpu".to_string()));
        assert!(!args.contains(&"--gainref".to_string()));
    }

    #[test]
    fn motioncor2_with_gain_group() {
        let args = builder(json!({
            "inputMovies": "Import/job001/movies.star",
            "useOwnImplementation": false,
            "motioncor2Exe": "/opt/MotionCor2",
            "gpuIds": "0:1",
            "gainRef": "gain.mrc",
            "gainRot": 1,
            "doseWeighting": false
        }))
        .arguments("MotionCorr/job002");

        assert!(args.windows(2).any(|w| w == ["--motioncor2_exe", "/opt/MotionCor2"]));
        assert!(args.windows(2).any(|w| w == ["--gpu", "0:1"]));
        assert!(args.windows(2).any(|w| w == ["--gainref", "gain.mrc"]));
        assert!(args.windows(2).any(|w| w == ["--gain_rot", "1"]));
        assert!(!args.contains(&"--use_own".to_string()));
        assert!(!args.contains(&"--dose_weighting".to_string()));
    }

    #[test]
    fn blank_gpu_ids_fall_back_to_first_device() {
        let b = builder(json!({
            "inputMovies": "Import/job001/movies.star",
            "useOwnImplementation": false,
            "motioncor2Exe": "/bin/mc2",
            "gpuIds": "  "
        }));
        assert!(b.validate().is_valid());

        let args = b.arguments("MotionCorr/job002");
        assert!(args.windows(2).any(|w| w == ["--gpu", "0"]));
        assert!(args.iter().all(|a| !a.is_empty()));
    }

    #[test]
    fn validation_rules() {
        assert!(!builder(json!({})).validate().is_valid());
        assert!(!builder(json!({"inputMovies": "m.star", "binFactor": 0}))
            .validate()
            .is_valid());
        assert!(!builder(json!({"inputMovies": "m.star", "firstFrame": 5, "lastFrame": 3}))
            .validate()
            .is_valid());
        assert!(!builder(json!({"inputMovies": "m.star", "dosePerFrame": 0}))
            .validate()
            .is_valid());
        assert!(!builder(json!({"inputMovies": "m.star", "useOwnImplementation": "No"}))
            .validate()
            .is_valid());
    }
}
