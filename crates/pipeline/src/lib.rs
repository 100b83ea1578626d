pub mod sbatch;
pub mod submission;
pub mod subprocess;

pub use sbatch::{SbatchConfig, SbatchSubmitter};
pub use submission::{
    ClusterSubmitter, JobSpec, SubmissionCoordinator, SubmissionError, SubmissionRequest,
    SubmissionResult, SubmitterError,
};
