//! Gold-standard 3D auto-refinement against an initial reference.
//!
//! Always splits the data into random halves and runs `--auto_refine`.
//! Reference processing (absolute greyscale, low-pass) and masking are
//! optional groups.

use std::sync::LazyLock;

use regex::Regex;

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_refine";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: true,
    supports_mpi: true,
};

/// Point-group symbols accepted by relion: C1, D7, T, O, I, I2 and so on.
static SYMMETRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(c\d+|d\d+|ci|cs|s\d+|t|o|i[1-5]?)$").expect("valid regex")
});

/// Angular sampling choices, in degrees, indexed by relion's healpix order.
const HEALPIX_STEPS: [&str; 8] = ["30", "15", "7.5", "3.7", "1.8", "0.9", "0.5", "0.2"];

pub struct Refine3DBuilder {
    ctx: BuilderContext,
}

impl Refine3DBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    fn healpix_order(&self) -> Option<usize> {
        let step = self.ctx.params.get_str("initialAngularSampling", "7.5");
        HEALPIX_STEPS.iter().position(|s| *s == step.trim())
    }
}

impl JobCommandBuilder for Refine3DBuilder {
    fn kind(&self) -> JobKind {
        JobKind::Refine3D
    }

    fn context(&self) -> &BuilderContext {
        &self.ctx
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    fn validate(&self) -> ValidationResult {
        let p = &self.ctx.params;

        if p.get_str(["inputParticles", "fn_img"], "").trim().is_empty() {
            return ValidationResult::invalid("An input particles STAR file is required");
        }
        if p.get_str(["referenceMap", "fn_ref"], "").trim().is_empty() {
            return ValidationResult::invalid("A reference map is required");
        }
        let symmetry = p.get_str("symmetry", "C1");
        if !SYMMETRY_RE.is_match(symmetry.trim()) {
            return ValidationResult::invalid(format!("Unrecognised symmetry group '{symmetry}'"));
        }
        if p.get_f64("maskDiameter", 200.0) <= 0.0 {
            return ValidationResult::invalid("Mask diameter must be positive");
        }
        if p.get_f64("initialLowPassFilter", 60.0) <= 0.0 {
            return ValidationResult::invalid("Initial low-pass filter must be positive");
        }
        if self.healpix_order().is_none() {
            return ValidationResult::invalid(format!(
                "Initial angular sampling must be one of {}",
                HEALPIX_STEPS.join(", ")
            ));
        }
        ValidationResult::Valid
    }

    fn program(&self) -> &'static str {
        PROGRAM
    }

    fn arguments(&self, output_dir: &str) -> Vec<String> {
        let p = &self.ctx.params;
        let mut args = ArgList::new();

        args.value("--i", p.get_str(["inputParticles", "fn_img"], "").trim())
            .value("--o", format!("{output_dir}/run"))
            .flag("--auto_refine")
            .flag("--split_random_halves")
            .value("--ref", p.get_str(["referenceMap", "fn_ref"], "").trim())
            .flag_if(!p.get_bool("referenceOnAbsoluteGreyscale", false), "--firstiter_cc")
            .value("--ini_high", p.get_f64("initialLowPassFilter", 60.0))
            .non_empty("--solvent_mask", &p.get_str("referenceMask", ""))
            .flag_if(p.get_bool("solventFlattenFsc", false), "--solvent_correct_fsc")
            .value("--sym", p.get_str("symmetry", "C1").trim().to_ascii_uppercase())
            .value("--particle_diameter", p.get_f64("maskDiameter", 200.0))
            .flag_if(p.get_bool("doCtf", true), "--ctf")
            .flag_if(p.get_bool("ignoreCtfFirstPeak", false), "--ctf_intact_first_peak")
            .flag_if(p.get_bool("zeroMask", true), "--zero_mask")
            .value("--healpix_order", self.healpix_order().unwrap_or(2))
            .value("--auto_local_healpix_order", p.get_i64("localSearchesFrom", 4))
            .value("--offset_range", p.get_f64("offsetRange", 5.0))
            .value("--offset_step", p.get_f64("offsetStep", 1.0) * 2.0)
            .flag_if(p.get_bool("useBlush", false), "--blush")
            .value("--low_resol_join_halves", 40)
            .flag("--norm")
            .flag("--scale")
            .value("--pool", p.get_i64("pool", 3))
            .value("--pad", if p.get_bool("skipPadding", false) { 1 } else { 2 })
            .flag_if(!p.get_bool("useParallelIO", true), "--no_parallel_disc_io")
            .flag_if(p.get_bool("preReadAllParticles", false), "--preread_images")
            .non_empty("--scratch_dir", &p.get_str("scratchDir", ""))
            .value("--j", p.get_i64("threads", 1));

        if p.get_bool("useGpu", false) {
            let ids = p.get_str("gpuIds", "");
            if ids.trim().is_empty() {
                args.flag("--gpu");
            } else {
                args.value("--gpu", ids.trim());
            }
        }

        args.into_vec()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
