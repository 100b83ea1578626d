use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The closed set of job kinds the builder registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobKind {
    Import,
    MotionCorr,
    CtfFind,
    JoinStar,
    Class2D,
    Refine3D,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::Import,
        JobKind::MotionCorr,
        JobKind::CtfFind,
        JobKind::JoinStar,
        JobKind::Class2D,
        JobKind::Refine3D,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "Import",
            Self::MotionCorr => "MotionCorr",
            Self::CtfFind => "CtfFind",
            Self::JoinStar => "JoinStar",
            Self::Class2D => "Class2D",
            Self::Refine3D => "Refine3D",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    /// Case-insensitive; underscores and dashes are ignored, so `join_star`
    /// and `joinstar` both name [`JobKind::JoinStar`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| CoreError::UnknownJobKind(s.to_string()))
    }
}
