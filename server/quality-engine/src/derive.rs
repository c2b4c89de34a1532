//! Metric derivation: pure functions from raw sprint records to scalars.
//!
//! Every function tolerates a missing sprint or team-month and resolves
//! absent fields to 0; none of them fail or return NaN. Counts saturate at
//! `u32::MAX` instead of overflowing.

use serde::Serialize;

use crate::config::TargetConfig;
use crate::health;
use crate::roi::{self, ActivityValuation, RoiSummary};
use crate::types::{BugCounts, CoverageKind, SprintRecord, SprintSlot, TeamMonth};

/// Expected test cases per user story when no target is configured.
pub const CASES_PER_STORY: f64 = 3.0;

fn sprints(tm: Option<&TeamMonth>) -> [Option<&SprintRecord>; 2] {
  match tm {
    Some(tm) => [tm.sprint(SprintSlot::Sprint1), tm.sprint(SprintSlot::Sprint2)],
    None => [None, None],
  }
}

/// Mean of the coverage sub-metrics that are present; 0 when none are.
///
/// A present 0 counts as a measurement.
pub fn code_coverage_average(sprint: Option<&SprintRecord>) -> f64 {
  let Some(cov) = sprint.and_then(|s| s.code_coverage.as_ref()) else {
    return 0.0;
  };
  let values: Vec<f64> = CoverageKind::ALL.iter().filter_map(|k| cov.get(*k)).collect();
  if values.is_empty() {
    return 0.0;
  }
  values.iter().sum::<f64>() / values.len() as f64
}

/// Test coverage against [`CASES_PER_STORY`] cases per story.
pub fn test_coverage(user_stories: u32, test_cases: u32) -> f64 {
  test_coverage_with_target(user_stories, test_cases, CASES_PER_STORY)
}

/// `min(100, round(test_cases / (user_stories * cases_per_story) * 100))`, 0 without stories.
pub fn test_coverage_with_target(user_stories: u32, test_cases: u32, cases_per_story: f64) -> f64 {
  let expected = user_stories as f64 * cases_per_story;
  if user_stories == 0 || expected <= 0.0 {
    return 0.0;
  }
  (test_cases as f64 / expected * 100.0).round().min(100.0)
}

pub fn total_non_prod_bugs(sprint: Option<&SprintRecord>) -> u32 {
  sprint
    .and_then(|s| s.non_prod_bugs.as_ref())
    .map(BugCounts::total)
    .unwrap_or(0)
}

/// Consolidated production bugs, falling back to the sum of the legacy per-sprint counts.
pub fn production_bugs(tm: Option<&TeamMonth>) -> BugCounts {
  if let Some(bugs) = tm.and_then(|t| t.production_bugs.as_ref()) {
    return bugs.clone();
  }
  let empty = BugCounts::default();
  let [s1, s2] = sprints(tm);
  let b1 = s1.and_then(|s| s.production_bugs.as_ref()).unwrap_or(&empty);
  let b2 = s2.and_then(|s| s.production_bugs.as_ref()).unwrap_or(&empty);
  b1.sum(b2)
}

pub fn total_production_bugs(tm: Option<&TeamMonth>) -> u32 {
  production_bugs(tm).total()
}

/// Mean of two sprint values where 0 means "not measured".
///
/// Both positive: the mean. Exactly one positive: that one. Neither: 0.
pub fn average_positive(a: f64, b: f64) -> f64 {
  match (a > 0.0, b > 0.0) {
    (true, true) => (a + b) / 2.0,
    (true, false) => a,
    (false, true) => b,
    (false, false) => 0.0,
  }
}

/// Scalar sprint metrics that average across the month with [`average_positive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SprintMetric {
  PassRate,
  LeadTimeTests,
  LeadTimeBugs,
  LeadTimeProdBugs,
  /// The per-sprint [`code_coverage_average`].
  CodeCoverage,
  Coverage(CoverageKind),
}

impl SprintMetric {
  pub fn read(self, sprint: Option<&SprintRecord>) -> f64 {
    let Some(s) = sprint else {
      return 0.0;
    };
    let value = match self {
      Self::PassRate => s.pass_rate,
      Self::LeadTimeTests => s.lead_time_tests,
      Self::LeadTimeBugs => s.lead_time_bugs,
      Self::LeadTimeProdBugs => s.lead_time_prod_bugs,
      Self::CodeCoverage => Some(code_coverage_average(sprint)),
      Self::Coverage(kind) => s.code_coverage.as_ref().and_then(|c| c.get(kind)),
    };
    value.unwrap_or(0.0)
  }
}

pub fn average_sprint_metric(tm: Option<&TeamMonth>, metric: SprintMetric) -> f64 {
  let [s1, s2] = sprints(tm);
  average_positive(metric.read(s1), metric.read(s2))
}

/// Month code coverage: per-sprint averages combined with [`average_positive`].
pub fn month_code_coverage(tm: Option<&TeamMonth>) -> f64 {
  average_sprint_metric(tm, SprintMetric::CodeCoverage)
}

/// Month test coverage from user stories and test cases summed over both sprints.
pub fn month_test_coverage(tm: Option<&TeamMonth>, cases_per_story: f64) -> f64 {
  let totals = test_case_totals(tm);
  test_coverage_with_target(totals.user_stories, totals.test_cases, cases_per_story)
}

pub fn month_non_prod_bugs(tm: Option<&TeamMonth>) -> u32 {
  let [s1, s2] = sprints(tm);
  total_non_prod_bugs(s1).saturating_add(total_non_prod_bugs(s2))
}

/// Non-production bugs of both sprints by severity.
pub fn month_non_prod_bug_counts(tm: Option<&TeamMonth>) -> BugCounts {
  let empty = BugCounts::default();
  let [s1, s2] = sprints(tm);
  let b1 = s1.and_then(|s| s.non_prod_bugs.as_ref()).unwrap_or(&empty);
  let b2 = s2.and_then(|s| s.non_prod_bugs.as_ref()).unwrap_or(&empty);
  b1.sum(b2)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReworkTotals {
  pub prod: u32,
  pub non_prod: u32,
}

impl ReworkTotals {
  pub fn total(&self) -> u32 {
    self.prod.saturating_add(self.non_prod)
  }
}

/// Bug re-executions over both sprints.
pub fn rework_totals(tm: Option<&TeamMonth>) -> ReworkTotals {
  sprints(tm).iter().flatten().fold(ReworkTotals::default(), |acc, s| ReworkTotals {
    prod: acc.prod.saturating_add(s.rework_prod_bugs.unwrap_or(0)),
    non_prod: acc.non_prod.saturating_add(s.rework_non_prod_bugs.unwrap_or(0)),
  })
}

/// Rework summed over several team-months (the accumulated rework volume).
pub fn rework_over<'a>(months: impl IntoIterator<Item = Option<&'a TeamMonth>>) -> ReworkTotals {
  months.into_iter().map(rework_totals).fold(ReworkTotals::default(), |acc, r| ReworkTotals {
    prod: acc.prod.saturating_add(r.prod),
    non_prod: acc.non_prod.saturating_add(r.non_prod),
  })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AutomationTotals {
  pub new_scenarios: u32,
  pub manual_minutes: f64,
  pub automated_minutes: f64,
}

impl AutomationTotals {
  /// Execution minutes saved by running automated instead of manually (never negative).
  pub fn minutes_saved(&self) -> f64 {
    (self.manual_minutes - self.automated_minutes).max(0.0)
  }
}

pub fn sprint_automation(sprint: Option<&SprintRecord>) -> AutomationTotals {
  match sprint.and_then(|s| s.automated_tests.as_ref()) {
    Some(a) => AutomationTotals {
      new_scenarios: a.scenarios.unwrap_or(0),
      manual_minutes: a.manual_minutes.unwrap_or(0.0),
      automated_minutes: a.automated_minutes.unwrap_or(0.0),
    },
    None => AutomationTotals::default(),
  }
}

pub fn automation_totals(tm: Option<&TeamMonth>) -> AutomationTotals {
  let [s1, s2] = sprints(tm);
  let (a, b) = (sprint_automation(s1), sprint_automation(s2));
  AutomationTotals {
    new_scenarios: a.new_scenarios.saturating_add(b.new_scenarios),
    manual_minutes: a.manual_minutes + b.manual_minutes,
    automated_minutes: a.automated_minutes + b.automated_minutes,
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EfficiencyAverages {
  pub writing: f64,
  pub execution: f64,
  pub reexecution: f64,
}

/// Plain mean over both sprints; a missing sprint contributes 0.
pub fn efficiency_averages(tm: Option<&TeamMonth>) -> EfficiencyAverages {
  let [s1, s2] = sprints(tm);
  let read = |s: Option<&SprintRecord>| {
    s.and_then(|s| s.efficiency.as_ref())
      .map(|e| {
        (
          e.writing.unwrap_or(0.0),
          e.execution.unwrap_or(0.0),
          e.reexecution.unwrap_or(0.0),
        )
      })
      .unwrap_or((0.0, 0.0, 0.0))
  };
  let (w1, x1, r1) = read(s1);
  let (w2, x2, r2) = read(s2);
  EfficiencyAverages {
    writing: (w1 + w2) / 2.0,
    execution: (x1 + x2) / 2.0,
    reexecution: (r1 + r2) / 2.0,
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TestCaseTotals {
  pub user_stories: u32,
  pub test_cases: u32,
  pub written: u32,
  pub executed: u32,
}

pub fn test_case_totals(tm: Option<&TeamMonth>) -> TestCaseTotals {
  sprints(tm).iter().flatten().fold(TestCaseTotals::default(), |acc, s| TestCaseTotals {
    user_stories: acc.user_stories.saturating_add(s.user_stories.unwrap_or(0)),
    test_cases: acc.test_cases.saturating_add(s.test_cases.unwrap_or(0)),
    written: acc.written.saturating_add(s.cases_written.unwrap_or(0)),
    executed: acc.executed.saturating_add(s.cases_executed.unwrap_or(0)),
  })
}

/// All derived figures for one team-month. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
  pub code_coverage: f64,
  pub pass_rate: f64,
  pub test_coverage: f64,
  pub non_prod_bugs: BugCounts,
  pub non_prod_bugs_total: u32,
  pub prod_bugs: BugCounts,
  pub prod_bugs_total: u32,
  pub lead_time_tests: f64,
  pub lead_time_bugs: f64,
  pub lead_time_prod_bugs: f64,
  pub automation: AutomationTotals,
  pub rework: ReworkTotals,
  pub efficiency: EfficiencyAverages,
  pub test_cases: TestCaseTotals,
  pub roi: RoiSummary,
  pub health_score: f64,
}

impl DerivedMetrics {
  pub fn compute(
    tm: Option<&TeamMonth>,
    targets: &TargetConfig,
    valuation: &dyn ActivityValuation,
  ) -> Self {
    let non_prod_bugs = month_non_prod_bug_counts(tm);
    let prod_bugs = production_bugs(tm);
    Self {
      code_coverage: month_code_coverage(tm),
      pass_rate: average_sprint_metric(tm, SprintMetric::PassRate),
      test_coverage: month_test_coverage(tm, targets.cases_per_story),
      non_prod_bugs_total: non_prod_bugs.total(),
      non_prod_bugs,
      prod_bugs_total: prod_bugs.total(),
      prod_bugs,
      lead_time_tests: average_sprint_metric(tm, SprintMetric::LeadTimeTests),
      lead_time_bugs: average_sprint_metric(tm, SprintMetric::LeadTimeBugs),
      lead_time_prod_bugs: average_sprint_metric(tm, SprintMetric::LeadTimeProdBugs),
      automation: automation_totals(tm),
      rework: rework_totals(tm),
      efficiency: efficiency_averages(tm),
      test_cases: test_case_totals(tm),
      roi: roi::summarize(tm, valuation),
      health_score: health::health_score(tm, targets),
    }
  }
}
