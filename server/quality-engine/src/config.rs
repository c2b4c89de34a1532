//! Target configuration with built-in defaults and goal overrides.
//!
//! A `TargetConfig` is built once (defaults merged with an optional goals
//! object) and passed by reference to every engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lenient;
use crate::roi::RateCard;
use crate::types::{CoverageKind, MonthKey, Severity};

/// Goal value plus direction. Direction is fixed by the defaults; goals only move the value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
  pub value: f64,
  pub higher_is_better: bool,
}

impl Target {
  pub const fn higher(value: f64) -> Self {
    Self {
      value,
      higher_is_better: true,
    }
  }

  pub const fn lower(value: f64) -> Self {
    Self {
      value,
      higher_is_better: false,
    }
  }

  pub fn is_met(&self, value: f64) -> bool {
    if self.higher_is_better {
      value >= self.value
    } else {
      value <= self.value
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageTargets {
  /// Target for the averaged coverage figure.
  pub overall: Target,
  pub lines: Target,
  pub classes: Target,
  pub methods: Target,
  pub branches: Target,
}

impl CoverageTargets {
  pub fn get(&self, kind: CoverageKind) -> Target {
    match kind {
      CoverageKind::Lines => self.lines,
      CoverageKind::Classes => self.classes,
      CoverageKind::Methods => self.methods,
      CoverageKind::Branches => self.branches,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityTargets {
  pub total: Target,
  pub low: Target,
  pub medium: Target,
  pub high: Target,
}

impl SeverityTargets {
  pub fn get(&self, severity: Severity) -> Target {
    match severity {
      Severity::Low => self.low,
      Severity::Medium => self.medium,
      Severity::High => self.high,
    }
  }
}

/// Ceilings at or above which a lower-is-better health sub-score is 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthLimits {
  pub non_prod_bugs: f64,
  pub prod_bugs: f64,
  pub lead_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthTargets {
  /// Target on the 0-10 display scale.
  pub target: f64,
  pub limits: HealthLimits,
}

/// Multipliers bounding the "near" attainment band.
///
/// Higher-is-better values within `[target * higher_is_better, target)` are near;
/// lower-is-better values within `(target, target * lower_is_better]` are near.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tolerance {
  pub higher_is_better: f64,
  pub lower_is_better: f64,
}

pub const NEAR_TOLERANCE: Tolerance = Tolerance {
  higher_is_better: 0.9,
  lower_is_better: 1.1,
};

/// ROI percentage bands: `>= met` is met, `>= near` is near, below is missed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiBands {
  pub met: f64,
  pub near: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetConfig {
  pub code_coverage: CoverageTargets,
  pub pass_rate: Target,
  pub test_coverage: Target,
  pub lead_time_tests: Target,
  pub lead_time_bugs: Target,
  pub lead_time_prod_bugs: Target,
  pub non_prod_bugs: SeverityTargets,
  pub prod_bugs: SeverityTargets,
  pub health: HealthTargets,
  pub new_scenarios: Target,
  /// Expected test cases per user story for full test coverage.
  pub cases_per_story: f64,
  pub tolerance: Tolerance,
  pub roi_bands: RoiBands,
  #[serde(skip)]
  pub monthly: MonthlyGoals,
}

impl Default for TargetConfig {
  fn default() -> Self {
    Self {
      code_coverage: CoverageTargets {
        overall: Target::higher(50.0),
        lines: Target::higher(50.0),
        classes: Target::higher(50.0),
        methods: Target::higher(50.0),
        branches: Target::higher(50.0),
      },
      pass_rate: Target::higher(90.0),
      test_coverage: Target::higher(100.0),
      lead_time_tests: Target::lower(2.5),
      lead_time_bugs: Target::lower(2.0),
      lead_time_prod_bugs: Target::lower(2.0),
      non_prod_bugs: SeverityTargets {
        total: Target::lower(10.0),
        low: Target::lower(5.0),
        medium: Target::lower(3.0),
        high: Target::lower(1.0),
      },
      prod_bugs: SeverityTargets {
        total: Target::lower(2.0),
        low: Target::lower(5.0),
        medium: Target::lower(2.0),
        high: Target::lower(0.0),
      },
      health: HealthTargets {
        target: 8.0,
        limits: HealthLimits {
          non_prod_bugs: 20.0,
          prod_bugs: 10.0,
          lead_time: 10.0,
        },
      },
      new_scenarios: Target::higher(5.0),
      cases_per_story: 3.0,
      tolerance: NEAR_TOLERANCE,
      roi_bands: RoiBands {
        met: 50.0,
        near: 0.0,
      },
      monthly: MonthlyGoals::default(),
    }
  }
}

fn apply(slot: &mut f64, value: Option<f64>, name: &str) {
  if let Some(v) = value {
    debug!(goal = name, from = *slot, to = v, "goal override applied");
    *slot = v;
  }
}

impl TargetConfig {
  /// Defaults merged with an optional goals object.
  pub fn from_goals(goals: Option<&GoalsOverride>) -> Self {
    match goals {
      Some(g) => Self::default().merged(g),
      None => Self::default(),
    }
  }

  /// Apply a partial override. Fields the override leaves unset keep their current value.
  pub fn merged(&self, goals: &GoalsOverride) -> Self {
    let mut out = self.clone();

    if let Some(cov) = &goals.code_coverage {
      apply(&mut out.code_coverage.overall.value, cov.overall, "codeCoverage.overall");
      apply(&mut out.code_coverage.lines.value, cov.lines, "codeCoverage.lines");
      apply(&mut out.code_coverage.classes.value, cov.classes, "codeCoverage.classes");
      apply(&mut out.code_coverage.methods.value, cov.methods, "codeCoverage.methods");
      apply(&mut out.code_coverage.branches.value, cov.branches, "codeCoverage.branches");
    }
    apply(&mut out.pass_rate.value, goals.pass_rate, "passRate");
    apply(&mut out.test_coverage.value, goals.test_coverage, "testCoverage");
    apply(&mut out.lead_time_tests.value, goals.lead_time_tests, "leadTimeTests");
    apply(&mut out.lead_time_bugs.value, goals.lead_time_bugs, "leadTimeBugs");
    apply(&mut out.lead_time_prod_bugs.value, goals.lead_time_prod_bugs, "leadTimeProdBugs");

    if let Some(bugs) = &goals.non_prod_bugs {
      bugs.apply_to(&mut out.non_prod_bugs, "nonProdBugs");
    }
    if let Some(bugs) = &goals.prod_bugs {
      bugs.apply_to(&mut out.prod_bugs, "prodBugs");
    }

    if let Some(health) = &goals.health_score {
      apply(&mut out.health.target, health.target, "healthScore.target");
      if let Some(limits) = &health.limits {
        apply(&mut out.health.limits.non_prod_bugs, limits.non_prod_bugs, "healthScore.limits.nonProdBugs");
        apply(&mut out.health.limits.prod_bugs, limits.prod_bugs, "healthScore.limits.prodBugs");
        apply(&mut out.health.limits.lead_time, limits.lead_time, "healthScore.limits.leadTime");
      }
    }

    if let Some(automation) = &goals.automation {
      apply(&mut out.new_scenarios.value, automation.new_scenarios, "automation.newScenarios");
    }
    apply(&mut out.cases_per_story, goals.cases_per_story, "casesPerStory");

    if let Some(tol) = &goals.tolerance {
      apply(&mut out.tolerance.higher_is_better, tol.higher_is_better, "tolerance.higherIsBetter");
      apply(&mut out.tolerance.lower_is_better, tol.lower_is_better, "tolerance.lowerIsBetter");
    }
    if let Some(roi) = &goals.roi {
      apply(&mut out.roi_bands.met, roi.met, "roi.met");
      apply(&mut out.roi_bands.near, roi.near, "roi.near");
    }

    if let Some(monthly) = &goals.monthly {
      out.monthly = out.monthly.merged(monthly);
    }

    out
  }

  /// Targets in effect for `month`, with monthly plans resolved over the base values.
  pub fn for_month(&self, month: MonthKey) -> Self {
    let mut out = self.clone();
    let m = &self.monthly;
    apply(&mut out.code_coverage.overall.value, plan_value(&m.code_coverage, month), "monthly.codeCoverage");
    apply(&mut out.pass_rate.value, plan_value(&m.pass_rate, month), "monthly.passRate");
    apply(&mut out.test_coverage.value, plan_value(&m.test_coverage, month), "monthly.testCoverage");
    apply(&mut out.lead_time_tests.value, plan_value(&m.lead_time_tests, month), "monthly.leadTimeTests");
    apply(&mut out.lead_time_bugs.value, plan_value(&m.lead_time_bugs, month), "monthly.leadTimeBugs");
    apply(&mut out.non_prod_bugs.total.value, plan_value(&m.non_prod_bugs, month), "monthly.nonProdBugs");
    apply(&mut out.prod_bugs.total.value, plan_value(&m.prod_bugs, month), "monthly.prodBugs");
    apply(&mut out.new_scenarios.value, plan_value(&m.new_scenarios, month), "monthly.newScenarios");
    out
  }
}

/// `healthScore` as a record, or a bare number taken as the target.
fn health_goals<'de, D>(d: D) -> Result<Option<HealthGoals>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let raw = Option::<serde_json::Value>::deserialize(d)?;
  Ok(match raw {
    Some(serde_json::Value::Number(n)) => n.as_f64().map(|target| HealthGoals {
      target: Some(target),
      limits: None,
    }),
    Some(other) => serde_json::from_value(other).ok(),
    None => None,
  })
}

/// Plan entry for the month, or the nearest earlier defined entry.
fn plan_value(plan: &[Option<f64>], month: MonthKey) -> Option<f64> {
  if plan.is_empty() {
    return None;
  }
  let idx = (month.month() as usize - 1).min(plan.len() - 1);
  plan[..=idx].iter().rev().find_map(|v| *v)
}

// ---------------------------------------------------------------------------
// Goals object (partial overrides)
// ---------------------------------------------------------------------------

/// Partial goals. Keys are camelCase; the dashboard's Portuguese keys
/// (`coberturaCodigo.geral`, `bugsNaoProdutivos.total`, `metasMensais`, ...) are
/// accepted as aliases. A nested block with the wrong shape is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalsOverride {
  #[serde(default, alias = "coberturaCodigo", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub code_coverage: Option<CoverageGoals>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub pass_rate: Option<f64>,
  #[serde(default, alias = "coberturaTestesPercentual", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub test_coverage: Option<f64>,
  #[serde(default, alias = "leadTimeTestes", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_tests: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_bugs: Option<f64>,
  #[serde(default, alias = "leadTimeBugsProd", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_prod_bugs: Option<f64>,
  #[serde(default, alias = "bugsNaoProdutivos", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub non_prod_bugs: Option<SeverityGoals>,
  #[serde(default, alias = "bugsProducao", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub prod_bugs: Option<SeverityGoals>,
  #[serde(default, deserialize_with = "health_goals", skip_serializing_if = "Option::is_none")]
  pub health_score: Option<HealthGoals>,
  #[serde(default, alias = "automacao", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub automation: Option<AutomationGoals>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub cases_per_story: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub tolerance: Option<ToleranceGoals>,
  #[serde(default, deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub roi: Option<RoiGoals>,
  #[serde(default, alias = "metasMensais", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub monthly: Option<MonthlyGoals>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGoals {
  #[serde(default, alias = "geral", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub overall: Option<f64>,
  #[serde(default, alias = "linhas", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lines: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub classes: Option<f64>,
  #[serde(default, alias = "metodos", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub methods: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub branches: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityGoals {
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub total: Option<f64>,
  #[serde(default, alias = "baixa", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub low: Option<f64>,
  #[serde(default, alias = "media", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub medium: Option<f64>,
  #[serde(default, alias = "alta", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub high: Option<f64>,
}

impl SeverityGoals {
  fn apply_to(&self, targets: &mut SeverityTargets, prefix: &str) {
    apply(&mut targets.total.value, self.total, &format!("{}.total", prefix));
    apply(&mut targets.low.value, self.low, &format!("{}.low", prefix));
    apply(&mut targets.medium.value, self.medium, &format!("{}.medium", prefix));
    apply(&mut targets.high.value, self.high, &format!("{}.high", prefix));
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthGoals {
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub target: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub limits: Option<LimitGoals>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitGoals {
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub non_prod_bugs: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub prod_bugs: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationGoals {
  #[serde(default, alias = "cenariosNovos", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub new_scenarios: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceGoals {
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub higher_is_better: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lower_is_better: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiGoals {
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub met: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub near: Option<f64>,
}

/// Per-calendar-month plans (index 0 = January). Blank entries inherit the
/// nearest earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGoals {
  #[serde(default, alias = "coberturaCodigo", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub code_coverage: Vec<Option<f64>>,
  #[serde(default, deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub pass_rate: Vec<Option<f64>>,
  #[serde(default, alias = "coberturaTestes", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub test_coverage: Vec<Option<f64>>,
  #[serde(default, alias = "leadTimeTestes", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub lead_time_tests: Vec<Option<f64>>,
  #[serde(default, deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub lead_time_bugs: Vec<Option<f64>>,
  #[serde(default, alias = "bugsNaoProd", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub non_prod_bugs: Vec<Option<f64>>,
  #[serde(default, alias = "bugsProducao", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub prod_bugs: Vec<Option<f64>>,
  #[serde(default, alias = "automacao", deserialize_with = "lenient::plan", skip_serializing_if = "Vec::is_empty")]
  pub new_scenarios: Vec<Option<f64>>,
}

impl MonthlyGoals {
  /// Plans present in `other` replace ours; absent plans are kept.
  fn merged(&self, other: &MonthlyGoals) -> MonthlyGoals {
    let pick = |ours: &Vec<Option<f64>>, theirs: &Vec<Option<f64>>| {
      if theirs.is_empty() {
        ours.clone()
      } else {
        theirs.clone()
      }
    };
    MonthlyGoals {
      code_coverage: pick(&self.code_coverage, &other.code_coverage),
      pass_rate: pick(&self.pass_rate, &other.pass_rate),
      test_coverage: pick(&self.test_coverage, &other.test_coverage),
      lead_time_tests: pick(&self.lead_time_tests, &other.lead_time_tests),
      lead_time_bugs: pick(&self.lead_time_bugs, &other.lead_time_bugs),
      non_prod_bugs: pick(&self.non_prod_bugs, &other.non_prod_bugs),
      prod_bugs: pick(&self.prod_bugs, &other.prod_bugs),
      new_scenarios: pick(&self.new_scenarios, &other.new_scenarios),
    }
  }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Everything the engine needs besides the dataset.
#[derive(Debug, Clone, Default)]
pub struct Config {
  pub targets: TargetConfig,
  pub rate_card: RateCard,
}

impl Config {
  pub fn with_goals(goals: Option<&GoalsOverride>) -> Self {
    Self {
      targets: TargetConfig::from_goals(goals),
      ..Self::default()
    }
  }
}
