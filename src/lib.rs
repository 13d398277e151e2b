//! Deep-copy method generator for Go types.
//!
//! Given a declaration universe (named Go types with their method sets) and a
//! list of requested type names, synthesizes a `DeepCopy` method per type:
//! a shallow baseline copy followed by the minimal set of corrective
//! statements that give the copy its own pointer targets, slices, maps and
//! channels.
//!
//! ```text
//! Universe + GenerationRequest
//!   → SelfCopyRegistry (once per run)
//!   → Classifier → TypeShape      (per type, in parallel)
//!   → synthesize → CopyPlan       (per type, in parallel)
//!   → render → Go source          (request order)
//! ```
pub mod delegate;
pub mod error;
pub mod load;
pub mod plan;
pub mod render;
pub mod shape;
pub mod skip;
pub mod synth;
pub mod types;

use rayon::prelude::*;

pub use error::{Error, Result};
pub use plan::CopyPlan;
pub use render::{is_generated, HEADER};
pub use skip::{SkipPath, SkipSet};
pub use types::{Universe, TypeDecl, TypeExpr, MethodDecl};

use delegate::SelfCopyRegistry;
use shape::Classifier;

pub const DEFAULT_METHOD: &str = "DeepCopy";

/// One generation run's parameters. Not mutated once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub type_names: Vec<String>,
    /// Positionally paired with `type_names`; may be shorter.
    pub skip_sets: Vec<SkipSet>,
    pub pointer_receiver: bool,
    pub method: String,
}

impl GenerationRequest {
    pub fn new<I, S>(type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_names: type_names.into_iter().map(Into::into).collect(),
            skip_sets: Vec::new(),
            pointer_receiver: false,
            method: DEFAULT_METHOD.to_string(),
        }
    }

    pub fn with_skips(mut self, skip_sets: Vec<SkipSet>) -> Self {
        self.skip_sets = skip_sets;
        self
    }

    pub fn pointer_receiver(mut self, pointer_receiver: bool) -> Self {
        self.pointer_receiver = pointer_receiver;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.type_names.is_empty() {
            return Err(Error::EmptyRequest);
        }
        if self.skip_sets.len() > self.type_names.len() {
            return Err(Error::TooManySkipSets { sets: self.skip_sets.len(), types: self.type_names.len() });
        }
        Ok(())
    }
}

/// Classifies and synthesizes every requested type, in request order.
pub fn plan(universe: &Universe, request: &GenerationRequest) -> Result<Vec<CopyPlan>> {
    request.validate()?;
    let registry = SelfCopyRegistry::build(universe, &request.method, &request.type_names, request.pointer_receiver);
    let empty = SkipSet::default();

    let results: Vec<Result<CopyPlan>> = request
        .type_names
        .par_iter()
        .enumerate()
        .map(|(i, name)| {
            let skips = request.skip_sets.get(i).unwrap_or(&empty);
            plan_one(universe, &registry, name, skips, request)
        })
        .collect();
    // rayon's own Result collect reports an arbitrary error; fold
    // sequentially so the first failure in request order wins
    results.into_iter().collect()
}

fn plan_one(
    universe: &Universe,
    registry: &SelfCopyRegistry,
    name: &str,
    skips: &SkipSet,
    request: &GenerationRequest,
) -> Result<CopyPlan> {
    if name.contains('.') {
        return Err(Error::UnsupportedShape {
            type_name: name.to_string(),
            path: "<self>".to_string(),
            reason: format!("methods can only be declared on types of package `{}`", universe.package),
        });
    }
    let decl = universe.get(name).ok_or_else(|| Error::UnknownType {
        type_name: name.to_string(),
        name: name.to_string(),
        path: "<self>".to_string(),
    })?;
    let shape = Classifier::new(universe, registry, name).classify_decl(decl)?;
    Ok(synth::synthesize(name, &shape, skips, request.pointer_receiver, &request.method))
}

/// Full run: plans every requested type and renders a single Go file.
#[tracing::instrument(level = "debug", skip_all, fields(package = %universe.package, types = request.type_names.len()))]
pub fn generate(universe: &Universe, request: &GenerationRequest) -> Result<String> {
    let plans = plan(universe, request)?;
    Ok(render::render(&plans, universe))
}
