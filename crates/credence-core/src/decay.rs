//! Read-time decay.
//!
//! Decay is a pure function of elapsed time and intervening related activity.
//! It is applied lazily when a strength is read and never written back, so
//! the event log stays the single source of truth and decay parameters can
//! change retroactively.
//!
//! ```text
//! factor = clamp(time × γ_same^n_same × γ_related^n_related, floor, 1)
//! time   = max(floor, 1 − λ · days_unused)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DecayConfig;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the domain of intervening activity relates to the belief's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainRelatedness {
  Same,
  Related,
  Unrelated,
}

impl DomainRelatedness {
  /// Classify `other` relative to `own`. Beliefs without a domain see all
  /// activity as unrelated.
  pub fn classify(
    config: &DecayConfig,
    own: Option<&str>,
    other: Option<&str>,
  ) -> Self {
    let (Some(own), Some(other)) = (own, other) else {
      return Self::Unrelated;
    };
    if own == other {
      return Self::Same;
    }
    let related = config.related_domains.iter().any(|(a, b)| {
      (a == own && b == other) || (a == other && b == own)
    });
    if related { Self::Related } else { Self::Unrelated }
  }

  pub fn gamma(self, config: &DecayConfig) -> f64 {
    match self {
      Self::Same => config.same_domain_gamma,
      Self::Related => config.related_domain_gamma,
      Self::Unrelated => config.unrelated_gamma,
    }
  }
}

/// `max(floor, 1 − λ · days_unused)`.
pub fn time_factor(config: &DecayConfig, days_unused: f64) -> f64 {
  (1.0 - config.lambda_per_day * days_unused.max(0.0)).max(config.floor)
}

/// `γ_domain ^ related_task_count`.
pub fn interference_factor(
  config: &DecayConfig,
  related_task_count: u64,
  relatedness: DomainRelatedness,
) -> f64 {
  let exponent = i32::try_from(related_task_count).unwrap_or(i32::MAX);
  relatedness.gamma(config).powi(exponent)
}

/// The single-class decay factor, in `[floor, 1.0]`.
pub fn decay_factor(
  config: &DecayConfig,
  days_unused: f64,
  related_task_count: u64,
  relatedness: DomainRelatedness,
) -> f64 {
  let combined = time_factor(config, days_unused)
    * interference_factor(config, related_task_count, relatedness);
  combined.clamp(config.floor, 1.0)
}

// ─── Entry-level inputs ──────────────────────────────────────────────────────

/// Everything needed to decay one context entry at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecayInputs {
  pub days_unused:     f64,
  /// Events on other beliefs of the same domain since the entry was updated.
  pub same_domain:     u64,
  /// Events on other beliefs of a related domain since then.
  pub related_domain:  u64,
}

impl DecayInputs {
  pub fn since(last_updated: DateTime<Utc>, now: DateTime<Utc>) -> Self {
    Self { days_unused: days_between(last_updated, now), ..Self::default() }
  }

  /// Time decay combined with both interference classes, in `[floor, 1.0]`.
  pub fn factor(&self, config: &DecayConfig) -> f64 {
    let combined = time_factor(config, self.days_unused)
      * interference_factor(config, self.same_domain, DomainRelatedness::Same)
      * interference_factor(
        config,
        self.related_domain,
        DomainRelatedness::Related,
      );
    combined.clamp(config.floor, 1.0)
  }
}

/// Apply a decay factor to an intrinsic strength.
pub fn decayed_strength(strength: f64, factor: f64) -> f64 {
  (strength * factor).clamp(0.0, 1.0)
}

/// Strength as read at `now`: decayed, then topped up by the spacing bonus
/// if the entry has rested longer than the spacing interval. Never stored.
pub fn rested_strength(
  config: &DecayConfig,
  strength: f64,
  factor: f64,
  last_updated: DateTime<Utc>,
  now: DateTime<Utc>,
) -> f64 {
  (decayed_strength(strength, factor) + spacing_bonus(config, last_updated, now))
    .clamp(0.0, 1.0)
}

/// The additive spacing bonus earned when more than the configured interval
/// separates two touches of the same entry.
pub fn spacing_bonus(
  config: &DecayConfig,
  previous: DateTime<Utc>,
  current: DateTime<Utc>,
) -> f64 {
  let hours = (current - previous).num_seconds() as f64 / 3600.0;
  if hours > config.spacing_interval_hours {
    config.spacing_bonus
  } else {
    0.0
  }
}

/// Fractional days from `earlier` to `later`, zero if `later` is not after.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
  if later <= earlier {
    return 0.0;
  }
  (later - earlier).num_seconds() as f64 / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn config() -> DecayConfig { DecayConfig::default() }

  #[test]
  fn fresh_entry_does_not_decay() {
    assert_eq!(decay_factor(&config(), 0.0, 0, DomainRelatedness::Same), 1.0);
  }

  #[test]
  fn time_factor_is_linear_then_floored() {
    let c = config();
    assert!((time_factor(&c, 100.0) - 0.9).abs() < 1e-12);
    assert_eq!(time_factor(&c, 10_000.0), 0.15);
  }

  #[test]
  fn interference_by_domain() {
    let c = config();
    let same = decay_factor(&c, 0.0, 10, DomainRelatedness::Same);
    let related = decay_factor(&c, 0.0, 10, DomainRelatedness::Related);
    let unrelated = decay_factor(&c, 0.0, 10, DomainRelatedness::Unrelated);
    assert!((same - 0.995f64.powi(10)).abs() < 1e-12);
    assert!(same < related);
    assert_eq!(unrelated, 1.0);
  }

  #[test]
  fn combined_factor_never_leaves_bounds() {
    let c = config();
    let inputs = DecayInputs {
      days_unused:    5_000.0,
      same_domain:    10_000,
      related_domain: 10_000,
    };
    assert_eq!(inputs.factor(&c), 0.15);
  }

  #[test]
  fn related_domains_are_symmetric() {
    let mut c = config();
    c.related_domains.push(("ap".to_owned(), "ar".to_owned()));
    assert_eq!(
      DomainRelatedness::classify(&c, Some("ar"), Some("ap")),
      DomainRelatedness::Related
    );
    assert_eq!(
      DomainRelatedness::classify(&c, Some("ap"), Some("ap")),
      DomainRelatedness::Same
    );
    assert_eq!(
      DomainRelatedness::classify(&c, None, Some("ap")),
      DomainRelatedness::Unrelated
    );
  }

  #[test]
  fn spacing_bonus_after_a_day() {
    let c = config();
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(spacing_bonus(&c, t0, t0 + Duration::hours(23)), 0.0);
    assert_eq!(spacing_bonus(&c, t0, t0 + Duration::hours(25)), 0.01);
  }

  #[test]
  fn spacing_bonus_lands_after_decay() {
    let c = config();
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let rested = rested_strength(&c, 0.5, 0.8, t0, t0 + Duration::hours(25));
    assert!((rested - (0.5 * 0.8 + 0.01)).abs() < 1e-12);
    assert_eq!(rested_strength(&c, 0.5, 0.8, t0, t0 + Duration::hours(2)), 0.4);
    assert_eq!(rested_strength(&c, 1.0, 1.0, t0, t0 + Duration::days(3)), 1.0);
  }
}
