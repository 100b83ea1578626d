//! Reference-free 2D classification.

use super::args::ArgList;
use super::{BuilderContext, Capabilities, JobCommandBuilder, JobKind, ValidationResult};

const PROGRAM: &str = "relion_refine";

const CAPABILITIES: Capabilities = Capabilities {
    supports_gpu: true,
    supports_mpi: true,
};

const MAX_CLASSES: i64 = 500;

pub struct Class2DBuilder {
    ctx: BuilderContext,
}

impl Class2DBuilder {
    pub fn new(ctx: BuilderContext) -> Self {
        Self { ctx }
    }

    fn use_em(&self) -> bool {
        !self.ctx.params.get_bool("useVdam", false)
    }
}

impl JobCommandBuilder for Class2DBuilder {
    fn kind(&self) -> JobKind {
        JobKind::Class2D
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
        let classes = p.get_i64("numberOfClasses", 50);
        if !(1..=MAX_CLASSES).contains(&classes) {
            return ValidationResult::invalid(format!(
                "Number of classes must be between 1 and {MAX_CLASSES}"
            ));
        }
        if p.get_f64("maskDiameter", 200.0) <= 0.0 {
            return ValidationResult::invalid("Mask diameter must be positive");
        }
        if self.use_em() && p.get_i64("iterations", 25) < 1 {
            return ValidationResult::invalid("At least one EM iteration is required");
        }
        if !self.use_em() && p.get_i64("vdamMiniBatches", 200) < 1 {
            return ValidationResult::invalid("At least one VDAM mini-batch is required");
        }
        if p.get_f64("regularisation", 2.0) <= 0.0 {
            return ValidationResult::invalid("Regularisation parameter T must be positive");
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
            .value("--K", p.get_i64("numberOfClasses", 50))
            .value("--particle_diameter", p.get_f64("maskDiameter", 200.0))
            .value("--tau2_fudge", p.get_f64("regularisation", 2.0))
            .flag_if(p.get_bool("doCtf", true), "--ctf")
            .flag_if(p.get_bool("ignoreCtfFirstPeak", false), "--ctf_intact_first_peak")
            .flag_if(p.get_bool("zeroMask", true), "--zero_mask")
            .flag_if(p.get_bool("centerClasses", true), "--center_classes")
            .value("--psi_step", p.get_f64("inPlaneAngularSampling", 6.0) * 2.0)
            .value("--offset_range", p.get_f64("offsetRange", 5.0))
            .value("--offset_step", p.get_f64("offsetStep", 1.0) * 2.0);

        if self.use_em() {
            args.value("--iter", p.get_i64("iterations", 25));
        } else {
            args.flag("--grad")
                .flag("--class_inactivity_threshold")
                .value("--grad_write_iter", 10)
                .value("--iter", p.get_i64("vdamMiniBatches", 200));
        }

        if let limit @ 1.. = p.get_i64("limitResolutionE", -1) {
            args.value("--strict_highres_exp", limit);
        }

        args.flag("--norm")
            .flag("--scale")
            .value("--pool", p.get_i64("pool", 3))
            .value("--pad", if p.get_bool("skipPadding", false) { 1 } else { 2 })
            .flag_if(!p.get_bool("useParallelIO", true), "--no_parallel_disc_io")
            .flag_if(p.get_bool("preReadAllParticles", false), "--preread_images")
            .non_empty("--scratch_dir", &p.get_str("scratchDir", ""))
            .value("--j", p.get_i64("threads", 1));

        if p.get_bool("useGpu", false) {
            // A bare --gpu lets relion_refine spread over every visible device.
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
