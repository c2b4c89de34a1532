//! Month-over-month deltas, target attainment and the sortable trend table.

use serde::Serialize;
use std::cmp::Ordering;

use crate::config::{Target, TargetConfig, Tolerance};
use crate::derive::{self, SprintMetric};
use crate::health;
use crate::types::TeamMonth;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Where a value sits against its target. Display labels live with the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attainment {
  Met,
  Near,
  Missed,
}

impl Attainment {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Met => "met",
      Self::Near => "near",
      Self::Missed => "missed",
    }
  }
}

/// Met at or beyond target; near within the tolerance band on the unfavorable side.
pub fn classify(value: f64, target: f64, higher_is_better: bool, tolerance: &Tolerance) -> Attainment {
  if higher_is_better {
    if value >= target {
      Attainment::Met
    } else if value >= target * tolerance.higher_is_better {
      Attainment::Near
    } else {
      Attainment::Missed
    }
  } else if value <= target {
    Attainment::Met
  } else if value <= target * tolerance.lower_is_better {
    Attainment::Near
  } else {
    Attainment::Missed
  }
}

pub fn classify_target(value: f64, target: &Target, tolerance: &Tolerance) -> Attainment {
  classify(value, target.value, target.higher_is_better, tolerance)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  Positive,
  Negative,
  Neutral,
}

/// Sign of the change read through the metric's direction.
pub fn direction(difference: f64, higher_is_better: bool) -> Direction {
  let improving = if higher_is_better {
    difference > 0.0
  } else {
    difference < 0.0
  };
  if difference == 0.0 {
    Direction::Neutral
  } else if improving {
    Direction::Positive
  } else {
    Direction::Negative
  }
}

/// Percent change; growth from a zero baseline reads as a flat +100%.
pub fn percent_change(current: f64, previous: f64) -> f64 {
  if previous != 0.0 {
    (current - previous) / previous * 100.0
  } else if current > 0.0 {
    100.0
  } else {
    0.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta {
  pub previous: f64,
  pub current: f64,
  pub difference: f64,
  pub percent_change: f64,
  pub direction: Direction,
}

pub fn delta(current: f64, previous: f64, higher_is_better: bool) -> Delta {
  let difference = current - previous;
  Delta {
    previous,
    current,
    difference,
    percent_change: percent_change(current, previous),
    direction: direction(difference, higher_is_better),
  }
}

/// Delta of any metric extracted from two snapshots.
pub fn compare<F>(
  current: Option<&TeamMonth>,
  previous: Option<&TeamMonth>,
  higher_is_better: bool,
  extract: F,
) -> Delta
where
  F: Fn(Option<&TeamMonth>) -> f64,
{
  delta(extract(current), extract(previous), higher_is_better)
}

// ---------------------------------------------------------------------------
// Trend metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
  /// Health score on the 0-10 display scale.
  HealthScore,
  CodeCoverage,
  PassRate,
  NonProdBugs,
  ProdBugs,
  TestCoverage,
  LeadTimeTests,
  LeadTimeBugs,
  Rework,
  NewAutomatedScenarios,
}

impl TrendMetric {
  pub const ALL: [TrendMetric; 10] = [
    TrendMetric::HealthScore,
    TrendMetric::CodeCoverage,
    TrendMetric::PassRate,
    TrendMetric::NonProdBugs,
    TrendMetric::ProdBugs,
    TrendMetric::TestCoverage,
    TrendMetric::LeadTimeTests,
    TrendMetric::LeadTimeBugs,
    TrendMetric::Rework,
    TrendMetric::NewAutomatedScenarios,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::HealthScore => "Quality index",
      Self::CodeCoverage => "Code coverage (mean)",
      Self::PassRate => "Pass rate (mean)",
      Self::NonProdBugs => "Non-production bugs (total)",
      Self::ProdBugs => "Production bugs (total)",
      Self::TestCoverage => "Test coverage",
      Self::LeadTimeTests => "Test lead time (mean)",
      Self::LeadTimeBugs => "Bug lead time (mean)",
      Self::Rework => "Rework (bug re-executions)",
      Self::NewAutomatedScenarios => "New automated scenarios",
    }
  }

  pub fn higher_is_better(self) -> bool {
    matches!(
      self,
      Self::HealthScore
        | Self::CodeCoverage
        | Self::PassRate
        | Self::TestCoverage
        | Self::NewAutomatedScenarios
    )
  }

  pub fn target(self, targets: &TargetConfig) -> f64 {
    match self {
      Self::HealthScore => targets.health.target,
      Self::CodeCoverage => targets.code_coverage.overall.value,
      Self::PassRate => targets.pass_rate.value,
      Self::NonProdBugs => targets.non_prod_bugs.total.value,
      Self::ProdBugs => targets.prod_bugs.total.value,
      Self::TestCoverage => targets.test_coverage.value,
      Self::LeadTimeTests => targets.lead_time_tests.value,
      Self::LeadTimeBugs => targets.lead_time_bugs.value,
      Self::Rework => 0.0,
      Self::NewAutomatedScenarios => targets.new_scenarios.value,
    }
  }

  pub fn extract(self, tm: Option<&TeamMonth>, targets: &TargetConfig) -> f64 {
    match self {
      Self::HealthScore => health::health_score(tm, targets) / 10.0,
      Self::CodeCoverage => derive::month_code_coverage(tm),
      Self::PassRate => derive::average_sprint_metric(tm, SprintMetric::PassRate),
      Self::NonProdBugs => derive::month_non_prod_bugs(tm) as f64,
      Self::ProdBugs => derive::total_production_bugs(tm) as f64,
      Self::TestCoverage => derive::month_test_coverage(tm, targets.cases_per_story),
      Self::LeadTimeTests => derive::average_sprint_metric(tm, SprintMetric::LeadTimeTests),
      Self::LeadTimeBugs => derive::average_sprint_metric(tm, SprintMetric::LeadTimeBugs),
      Self::Rework => derive::rework_totals(tm).total() as f64,
      Self::NewAutomatedScenarios => derive::automation_totals(tm).new_scenarios as f64,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
  pub metric: TrendMetric,
  pub name: String,
  pub previous: f64,
  pub current: f64,
  pub difference: f64,
  pub percent_change: f64,
  pub direction: Direction,
  pub target: f64,
  pub status: Attainment,
}

impl TrendRow {
  pub fn build(
    metric: TrendMetric,
    current: Option<&TeamMonth>,
    previous: Option<&TeamMonth>,
    targets: &TargetConfig,
  ) -> Self {
    let higher = metric.higher_is_better();
    let d = compare(current, previous, higher, |tm| metric.extract(tm, targets));
    let target = metric.target(targets);
    Self {
      metric,
      name: metric.name().to_string(),
      previous: d.previous,
      current: d.current,
      difference: d.difference,
      percent_change: d.percent_change,
      direction: d.direction,
      target,
      status: classify(d.current, target, higher, &targets.tolerance),
    }
  }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
  Name,
  Previous,
  Current,
  Change,
  Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn toggled(self) -> Self {
    match self {
      Self::Asc => Self::Desc,
      Self::Desc => Self::Asc,
    }
  }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
  a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl SortKey {
  fn compare(self, a: &TrendRow, b: &TrendRow) -> Ordering {
    match self {
      Self::Name => a.name.cmp(&b.name),
      Self::Previous => cmp_f64(a.previous, b.previous),
      Self::Current => cmp_f64(a.current, b.current),
      Self::Change => cmp_f64(a.percent_change, b.percent_change),
      Self::Status => a.status.as_str().cmp(b.status.as_str()),
    }
  }
}

/// Trend rows plus the current sort selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendTable {
  pub rows: Vec<TrendRow>,
  pub sort: Option<(SortKey, SortOrder)>,
}

impl TrendTable {
  /// One row per [`TrendMetric`], current against previous month.
  pub fn build(current: Option<&TeamMonth>, previous: Option<&TeamMonth>, targets: &TargetConfig) -> Self {
    let rows = TrendMetric::ALL
      .iter()
      .map(|m| TrendRow::build(*m, current, previous, targets))
      .collect();
    Self { rows, sort: None }
  }

  /// Selecting the active key flips the order; a new key starts ascending.
  pub fn select_sort(&mut self, key: SortKey) {
    self.sort = match self.sort {
      Some((active, order)) if active == key => Some((key, order.toggled())),
      _ => Some((key, SortOrder::Asc)),
    };
  }

  /// Rows in display order. Sorting is stable; ties keep build order.
  pub fn sorted(&self) -> Vec<&TrendRow> {
    let mut rows: Vec<&TrendRow> = self.rows.iter().collect();
    if let Some((key, order)) = self.sort {
      rows.sort_by(|a, b| {
        let ord = key.compare(a, b);
        match order {
          SortOrder::Asc => ord,
          SortOrder::Desc => ord.reverse(),
        }
      });
    }
    rows
  }
}
