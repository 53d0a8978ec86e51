//! Injected capabilities.
//!
//! The engine does no language understanding itself. Callers may install a
//! [`MoralClassifier`] to tag outcomes that arrive without a moral
//! dimension, and a [`SupportWeightEstimator`] to suggest SUPPORTS edge
//! weights. Both are synchronous and must be cheap; anything slow belongs in
//! the caller before the engine is invoked.

use crate::{belief::Belief, event::Outcome};

/// Tags an outcome with a moral dimension, if it has one.
pub trait MoralClassifier: Send + Sync {
  /// Returns the moral dimension (e.g. `"honesty"`) or `None` for a
  /// morally neutral outcome.
  fn classify(&self, belief: &Belief, outcome: Outcome, severity: f64)
  -> Option<String>;
}

/// Estimates how strongly `source` supports `target`, in `[0, 1]`.
pub trait SupportWeightEstimator: Send + Sync {
  fn estimate(&self, source: &Belief, target: &Belief) -> f64;
}

/// Tags every failure of an ethical belief with a fixed dimension. Useful
/// as a default and in tests.
#[derive(Debug, Clone)]
pub struct EthicalFailureClassifier {
  pub dimension: String,
}

impl MoralClassifier for EthicalFailureClassifier {
  fn classify(
    &self,
    belief: &Belief,
    outcome: Outcome,
    _severity: f64,
  ) -> Option<String> {
    (belief.category == crate::belief::BeliefCategory::Ethical
      && outcome == Outcome::Failure)
      .then(|| self.dimension.clone())
  }
}

/// Always returns the same weight.
#[derive(Debug, Clone, Copy)]
pub struct FixedWeight(pub f64);

impl SupportWeightEstimator for FixedWeight {
  fn estimate(&self, _source: &Belief, _target: &Belief) -> f64 { self.0 }
}
