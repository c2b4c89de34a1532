//! Health score: a weighted 0-100 composite of seven normalized sub-scores.

use serde::Serialize;

use crate::config::TargetConfig;
use crate::derive::{self, SprintMetric};
use crate::types::TeamMonth;

/// Sub-score weights. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthWeights {
  pub coverage: f64,
  pub pass_rate: f64,
  pub test_coverage: f64,
  pub non_prod_bugs: f64,
  pub prod_bugs: f64,
  pub lead_time_tests: f64,
  pub lead_time_bugs: f64,
}

pub const WEIGHTS: HealthWeights = HealthWeights {
  coverage: 0.20,
  pass_rate: 0.20,
  test_coverage: 0.15,
  non_prod_bugs: 0.15,
  prod_bugs: 0.15,
  lead_time_tests: 0.075,
  lead_time_bugs: 0.075,
};

/// `min(100, value / target * 100)`. A non-positive target is trivially met.
pub fn higher_is_better(value: f64, target: f64) -> f64 {
  if target <= 0.0 {
    return 100.0;
  }
  (value / target * 100.0).min(100.0)
}

/// `max(0, (1 - value / ceiling) * 100)`. Values at or above the ceiling score 0.
pub fn lower_is_better(value: f64, ceiling: f64) -> f64 {
  if ceiling <= 0.0 {
    return if value > 0.0 { 0.0 } else { 100.0 };
  }
  ((1.0 - value / ceiling) * 100.0).max(0.0)
}

/// Each sub-score on 0-100, plus the weighted total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HealthBreakdown {
  pub coverage: f64,
  pub pass_rate: f64,
  pub test_coverage: f64,
  pub non_prod_bugs: f64,
  pub prod_bugs: f64,
  pub lead_time_tests: f64,
  pub lead_time_bugs: f64,
  pub score: f64,
}

impl HealthBreakdown {
  fn weighted(mut self, w: &HealthWeights) -> Self {
    self.score = self.coverage * w.coverage
      + self.pass_rate * w.pass_rate
      + self.test_coverage * w.test_coverage
      + self.non_prod_bugs * w.non_prod_bugs
      + self.prod_bugs * w.prod_bugs
      + self.lead_time_tests * w.lead_time_tests
      + self.lead_time_bugs * w.lead_time_bugs;
    self
  }
}

/// Health breakdown for a team-month. A missing team-month scores 0 everywhere.
pub fn health_breakdown(tm: Option<&TeamMonth>, targets: &TargetConfig) -> HealthBreakdown {
  if tm.is_none() {
    return HealthBreakdown::default();
  }
  let limits = &targets.health.limits;

  let coverage = derive::month_code_coverage(tm);
  let pass_rate = derive::average_sprint_metric(tm, SprintMetric::PassRate);
  let test_coverage = derive::month_test_coverage(tm, targets.cases_per_story);
  let non_prod = derive::month_non_prod_bugs(tm) as f64;
  let prod = derive::total_production_bugs(tm) as f64;
  let lt_tests = derive::average_sprint_metric(tm, SprintMetric::LeadTimeTests);
  let lt_bugs = derive::average_sprint_metric(tm, SprintMetric::LeadTimeBugs);

  HealthBreakdown {
    coverage: higher_is_better(coverage, targets.code_coverage.overall.value),
    pass_rate: higher_is_better(pass_rate, targets.pass_rate.value),
    test_coverage: higher_is_better(test_coverage, targets.test_coverage.value),
    non_prod_bugs: lower_is_better(non_prod, limits.non_prod_bugs),
    prod_bugs: lower_is_better(prod, limits.prod_bugs),
    lead_time_tests: lower_is_better(lt_tests, limits.lead_time),
    lead_time_bugs: lower_is_better(lt_bugs, limits.lead_time),
    score: 0.0,
  }
  .weighted(&WEIGHTS)
}

/// Weighted health score in [0, 100]; callers rescale for display.
pub fn health_score(tm: Option<&TeamMonth>, targets: &TargetConfig) -> f64 {
  health_breakdown(tm, targets).score
}
