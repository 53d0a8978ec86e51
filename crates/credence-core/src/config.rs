//! Engine configuration.
//!
//! Every field has a default, so a partial TOML table (or none at all)
//! deserialises into a usable [`EngineConfig`].

use serde::{Deserialize, Serialize};

use crate::{Error, Result, belief::BeliefCategory};

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Context dimension names, most significant first. Every context key
  /// must have exactly this many values.
  pub dimensions:       Vec<String>,
  /// Starting strength of a belief's global default entry.
  pub default_strength: f64,
  pub resolution:       ResolutionStrategy,
  pub decay:            DecayConfig,
  pub admission:        AdmissionConfig,
  pub update:           UpdateConfig,
  pub categories:       CategoryTable,
  /// How long a memoised effective strength may be served, in seconds.
  /// Decay is time-dependent, so cached values must eventually expire.
  pub cache_ttl_secs:   u64,
  /// Compare-and-swap attempts on a context entry before giving up.
  pub cas_retries:      u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      dimensions:       vec![
        "counterparty".to_owned(),
        "period".to_owned(),
        "magnitude".to_owned(),
        "subject_category".to_owned(),
      ],
      default_strength: 0.5,
      resolution:       ResolutionStrategy::default(),
      decay:            DecayConfig::default(),
      admission:        AdmissionConfig::default(),
      update:           UpdateConfig::default(),
      categories:       CategoryTable::default(),
      cache_ttl_secs:   60,
      cas_retries:      8,
    }
  }
}

impl EngineConfig {
  pub fn arity(&self) -> usize { self.dimensions.len() }

  /// Check numeric bounds across all sections.
  pub fn validate(&self) -> Result<()> {
    if self.dimensions.is_empty() {
      return Err(Error::Configuration(
        "at least one context dimension is required".to_owned(),
      ));
    }
    if self.dimensions.len() > 16 {
      return Err(Error::Configuration(
        "at most 16 context dimensions are supported".to_owned(),
      ));
    }
    if self.cas_retries == 0 {
      return Err(Error::Configuration("cas_retries must be >= 1".to_owned()));
    }

    for (name, value) in [
      ("default_strength", self.default_strength),
      ("decay.lambda_per_day", self.decay.lambda_per_day),
      ("decay.floor", self.decay.floor),
      ("decay.same_domain_gamma", self.decay.same_domain_gamma),
      ("decay.related_domain_gamma", self.decay.related_domain_gamma),
      ("decay.unrelated_gamma", self.decay.unrelated_gamma),
      ("decay.spacing_bonus", self.decay.spacing_bonus),
      ("admission.improvement_threshold", self.admission.improvement_threshold),
      ("admission.convergence_epsilon", self.admission.convergence_epsilon),
      ("update.alpha", self.update.alpha),
    ] {
      if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::Configuration(format!(
          "{name} must be in [0.0, 1.0]"
        )));
      }
    }

    for (name, value) in [
      ("update.moral_confirmation", self.update.moral_confirmation),
      ("update.moral_violation", self.update.moral_violation),
      ("update.peak_salience", self.update.peak_salience),
      ("update.end_salience", self.update.end_salience),
    ] {
      if !value.is_finite() || value < 1.0 {
        return Err(Error::Configuration(format!("{name} must be >= 1.0")));
      }
    }

    for category in BeliefCategory::ALL {
      let policy = self.categories.policy(category);
      for (name, value) in [
        ("invalidation_threshold", policy.invalidation_threshold),
        ("moral_sensitivity", policy.moral_sensitivity),
      ] {
        if !(0.0..=1.0).contains(&value) {
          return Err(Error::Configuration(format!(
            "categories.{}.{name} must be in [0.0, 1.0]",
            category.as_str()
          )));
        }
      }
    }

    Ok(())
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
  /// Generalize one dimension at a time, last dimension first.
  Ladder,
  /// Consider every generalization; the most specific live entry wins,
  /// ties broken by recency.
  #[default]
  Lattice,
}

// ─── Decay ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
  /// Linear time-decay rate per unused day.
  pub lambda_per_day:         f64,
  /// Lower bound of the decay factor.
  pub floor:                  f64,
  pub same_domain_gamma:      f64,
  pub related_domain_gamma:   f64,
  pub unrelated_gamma:        f64,
  /// Domain pairs treated as related (order-insensitive).
  pub related_domains:        Vec<(String, String)>,
  pub spacing_bonus:          f64,
  pub spacing_interval_hours: f64,
}

impl Default for DecayConfig {
  fn default() -> Self {
    Self {
      lambda_per_day:         0.001,
      floor:                  0.15,
      same_domain_gamma:      0.995,
      related_domain_gamma:   0.998,
      unrelated_gamma:        1.0,
      related_domains:        Vec::new(),
      spacing_bonus:          0.01,
      spacing_interval_hours: 24.0,
    }
  }
}

// ─── Admission & pruning ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
  pub min_observations:      u64,
  /// Minimum accuracy difference from the parent entry for admission.
  pub improvement_threshold: f64,
  /// Entries untouched for longer than this become prunable.
  pub prune_stale_days:      i64,
  /// Entries whose accuracy is this close to their parent's are prunable.
  pub convergence_epsilon:   f64,
}

impl Default for AdmissionConfig {
  fn default() -> Self {
    Self {
      min_observations:      5,
      improvement_threshold: 0.10,
      prune_stale_days:      90,
      convergence_epsilon:   0.05,
    }
  }
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
  /// Base learning rate.
  pub alpha:              f64,
  /// Multiplier for a success carrying a moral tag.
  pub moral_confirmation: f64,
  /// Multiplier for a failure carrying a moral tag.
  pub moral_violation:    f64,
  /// Salience of the highest-severity event of a batch.
  pub peak_salience:      f64,
  /// Salience of the most recent event of a batch.
  pub end_salience:       f64,
}

impl Default for UpdateConfig {
  fn default() -> Self {
    Self {
      alpha:              0.15,
      moral_confirmation: 3.0,
      moral_violation:    10.0,
      peak_salience:      2.0,
      end_salience:       1.5,
    }
  }
}

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryPolicy {
  /// Effective strength below which a context entry is invalidated.
  pub invalidation_threshold: f64,
  /// Scales the moral multiplier: `1 + (m - 1) * sensitivity`.
  pub moral_sensitivity:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
  pub aesthetic:  CategoryPolicy,
  pub contextual: CategoryPolicy,
  pub relational: CategoryPolicy,
  pub ethical:    CategoryPolicy,
}

impl Default for CategoryTable {
  fn default() -> Self {
    Self {
      aesthetic:  CategoryPolicy {
        invalidation_threshold: 0.60,
        moral_sensitivity:      0.25,
      },
      contextual: CategoryPolicy {
        invalidation_threshold: 0.75,
        moral_sensitivity:      0.50,
      },
      relational: CategoryPolicy {
        invalidation_threshold: 0.85,
        moral_sensitivity:      0.75,
      },
      ethical:    CategoryPolicy {
        invalidation_threshold: 0.95,
        moral_sensitivity:      1.0,
      },
    }
  }
}

impl CategoryTable {
  pub fn policy(&self, category: BeliefCategory) -> CategoryPolicy {
    match category {
      BeliefCategory::Aesthetic => self.aesthetic,
      BeliefCategory::Contextual => self.contextual,
      BeliefCategory::Relational => self.relational,
      BeliefCategory::Ethical => self.ethical,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    EngineConfig::default().validate().unwrap();
  }

  #[test]
  fn partial_json_fills_defaults() {
    let config: EngineConfig = serde_json::from_str(
      r#"{"dimensions":["vendor","period"],"update":{"alpha":0.2}}"#,
    )
    .unwrap();
    assert_eq!(config.arity(), 2);
    assert_eq!(config.update.alpha, 0.2);
    assert_eq!(config.update.moral_violation, 10.0);
    assert_eq!(config.admission.min_observations, 5);
  }

  #[test]
  fn out_of_range_alpha_is_rejected() {
    let mut config = EngineConfig::default();
    config.update.alpha = 1.5;
    assert!(matches!(config.validate(), Err(Error::Configuration(_))));
  }

  #[test]
  fn ethical_threshold_matches_table() {
    let table = CategoryTable::default();
    assert_eq!(table.policy(BeliefCategory::Ethical).invalidation_threshold, 0.95);
    assert_eq!(table.policy(BeliefCategory::Aesthetic).invalidation_threshold, 0.60);
  }
}
