//! Mapping from job kind to builder factory.
//!
//! Adding a kind means adding one variant module and one `register` call in
//! [`BuilderRegistry::with_default_kinds`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::params::ParamBag;
use crate::types::{ActingUser, ProjectContext};

use super::{
    class2d, ctf_find, import, join_star, motion_corr, refine3d, BuilderContext, Capabilities,
    JobCommandBuilder, JobKind,
};

/// Constructs a builder for one kind from its inputs.
pub type BuilderFactory = Arc<dyn Fn(BuilderContext) -> Box<dyn JobCommandBuilder> + Send + Sync>;

/// Kind-indexed table of builder factories.
#[derive(Clone)]
pub struct BuilderRegistry {
    factories: HashMap<JobKind, BuilderFactory>,
}

impl BuilderRegistry {
    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with every built-in kind.
    pub fn with_default_kinds() -> Self {
        let mut registry = Self::empty();
        registry
            .register(JobKind::Import, |ctx| Box::new(import::ImportBuilder::new(ctx)))
            .register(JobKind::MotionCorr, |ctx| {
                Box::new(motion_corr::MotionCorrBuilder::new(ctx))
            })
            .register(JobKind::CtfFind, |ctx| {
                Box::new(ctf_find::CtfFindBuilder::new(ctx))
            })
            .register(JobKind::JoinStar, |ctx| {
                Box::new(join_star::JoinStarBuilder::new(ctx))
            })
            .register(JobKind::Class2D, |ctx| Box::new(class2d::Class2DBuilder::new(ctx)))
            .register(JobKind::Refine3D, |ctx| {
                Box::new(refine3d::Refine3DBuilder::new(ctx))
            });
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: JobKind, factory: F) -> &mut Self
    where
        F: Fn(BuilderContext) -> Box<dyn JobCommandBuilder> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: JobKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Resolve `kind` and construct its builder.
    ///
    /// Fails with [`CoreError::UnknownJobKind`] when the name does not parse
    /// or no factory is registered for it.
    pub fn resolve(
        &self,
        kind: &str,
        ctx: BuilderContext,
    ) -> Result<Box<dyn JobCommandBuilder>, CoreError> {
        let parsed: JobKind = kind.parse()?;
        let factory = self
            .factories
            .get(&parsed)
            .ok_or_else(|| CoreError::UnknownJobKind(kind.to_string()))?;
        Ok(factory(ctx))
    }

    /// Registered kinds with their capability flags, in pipeline order.
    pub fn capabilities(&self) -> Vec<(JobKind, Capabilities)> {
        let blank = BuilderContext::new(
            ParamBag::new(),
            ProjectContext::new("", "/"),
            ActingUser::default(),
        );
        JobKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.factories
                    .get(&kind)
                    .map(|factory| (kind, factory(blank.clone()).capabilities()))
            })
            .collect()
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::with_default_kinds()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
