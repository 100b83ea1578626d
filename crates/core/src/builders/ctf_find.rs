//! CTF estimation on motion-corrected micrographs via CTFFIND-4.

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_run_ctffind";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: false,
    supports_mpi: true,
};

pub struct CtfFindBuilder {
    ctx: BuilderContext,
}

impl CtfFindBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }
}

impl JobCommandBuilder for CtfFindBuilder {
    fn kind(&self) -> JobKind {
        JobKind::CtfFind
    }

    fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn validate(&self) -> ValidationResult {
        let p = &self.ctx.params;

        if p.get_str(["inputMicrographs", "input_star_mics"], "").trim().is_empty() {
            return ValidationResult::invalid("An input micrographs STAR file is required");
        }
        if p.get_str("ctffindExe", "").trim().is_empty() {
            return ValidationResult::invalid("A CTFFIND-4 executable is required");
        }
        if p.get_i64("boxSize", 512) <= 0 {
            return ValidationResult::invalid("FFT box size must be positive");
        }
        let res_min = p.get_f64("minResolution", 30.0);
        let res_max = p.get_f64("maxResolution", 5.0);
        if res_max <= 0.0 || res_min <= res_max {
            return ValidationResult::invalid(
                "Minimum resolution must be a larger value (in Å) than maximum resolution",
            );
        }
        if p.get_f64("minDefocus", 5000.0) >= p.get_f64("maxDefocus", 50000.0) {
            return ValidationResult::invalid("Minimum defocus must be below maximum defocus");
        }
        if p.get_f64("defocusStep", 500.0) <= 0.0 {
            return ValidationResult::invalid("Defocus step must be positive");
        }
        if p.get_bool("estimatePhaseShift", false)
            && p.get_f64("phaseShiftStep", 10.0) <= 0.0
        {
            return ValidationResult::invalid("Phase shift step must be positive");
        }
        ValidationResult::Valid
    }

    fn program(&self) -> &'static str {
        PROGRAM
    }

    fn arguments(&self, output_dir: &str) -> Vec<String> {
        let p = &self.ctx.params;
        let mut args = ArgList::new();

        args.value(
            "--i",
            p.get_str(["inputMicrographs", "input_star_mics"], "").trim(),
        )
        .value("--o", format!("{output_dir}/"))
        .value("--Box", p.get_i64("boxSize", 512))
        .value("--ResMin", p.get_f64("minResolution", 30.0))
        .value("--ResMax", p.get_f64("maxResolution", 5.0))
        .value("--dFMin", p.get_f64("minDefocus", 5000.0))
        .value("--dFMax", p.get_f64("maxDefocus", 50000.0))
        .value("--FStep", p.get_f64("defocusStep", 500.0))
        .value("--dAst", p.get_f64("astigmatism", 100.0))
        .flag_if(p.get_bool("useMicrographWithoutDW", false), "--use_noDW")
        .flag_if(p.get_bool("usePowerSpectra", true), "--use_given_ps")
        .value("--ctffind_exe", p.get_str("ctffindExe", "").trim())
        .flag("--is_ctffind4")
        .flag_if(!p.get_bool("exhaustiveSearch", false), "--fast_search");

        if p.get_bool("estimatePhaseShift", false) {
            args.flag("--do_phaseshift")
                .value("--phase_min", p.get_f64("phaseShiftMin", 0.0))
                .value("--phase_max", p.get_f64("phaseShiftMax", 180.0))
                .value("--phase_step", p.get_f64("phaseShiftStep", 10.0));
        }

        args.into_vec()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
