//! Report assembly: everything the dashboard shows for one (month, team).

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::config::{Config, Target, TargetConfig, Tolerance};
use crate::dataset::Dataset;
use crate::derive::{self, DerivedMetrics, SprintMetric};
use crate::error::EngineError;
use crate::health::{self, HealthBreakdown};
use crate::notes::{self, MissedMetric};
use crate::roi::{self, ActivityValuation, Roi};
use crate::trend::{self, Attainment, TrendRow, TrendTable};
use crate::types::{MonthKey, SprintSlot, TeamMonth};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One figure next to its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricStatus {
  pub metric: String,
  pub value: f64,
  pub target: f64,
  pub higher_is_better: bool,
  pub status: Attainment,
}

impl MetricStatus {
  pub fn new(metric: &str, value: f64, target: Target, tolerance: &Tolerance) -> Self {
    Self {
      metric: metric.to_string(),
      value,
      target: target.value,
      higher_is_better: target.higher_is_better,
      status: trend::classify_target(value, &target, tolerance),
    }
  }
}

/// Running totals of new automated scenarios at the end of each sprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CumulativeScenarios {
  pub sprint1: u32,
  pub sprint2: u32,
}

/// One team's headline figures for a month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOverview {
  pub team: String,
  pub health_score: f64,
  pub roi: Roi,
  pub roi_status: Attainment,
  pub metrics: Vec<MetricStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
  pub report_id: String,
  pub month: MonthKey,
  /// The team's closest earlier month, which may skip months it has no data in.
  pub previous_month: Option<MonthKey>,
  pub team: String,
  pub derived: DerivedMetrics,
  /// Sub-scores and weighted total, 0-100.
  pub health: HealthBreakdown,
  /// Health on the 0-10 display scale.
  pub health_display: f64,
  pub health_status: Attainment,
  pub roi_status: Attainment,
  pub cards: Vec<MetricStatus>,
  /// Empty unless the team has an earlier month.
  pub trend: Vec<TrendRow>,
  pub missed_metrics: Vec<MissedMetric>,
  pub action_plan_key: String,
  pub cumulative_scenarios: CumulativeScenarios,
  pub team_overview: Vec<TeamOverview>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Headline cards: pass rate, test coverage, total bugs and code coverage.
///
/// Total bugs (production plus non-production) are held against the non-production total target.
pub fn summary_cards(tm: Option<&TeamMonth>, targets: &TargetConfig) -> Vec<MetricStatus> {
  let tol = &targets.tolerance;
  let total_bugs = derive::month_non_prod_bugs(tm).saturating_add(derive::total_production_bugs(tm));
  let bug_ceiling = targets.non_prod_bugs.total;
  vec![
    MetricStatus::new(
      "pass_rate",
      derive::average_sprint_metric(tm, SprintMetric::PassRate),
      targets.pass_rate,
      tol,
    ),
    MetricStatus::new(
      "test_coverage",
      derive::month_test_coverage(tm, targets.cases_per_story),
      targets.test_coverage,
      tol,
    ),
    MetricStatus::new("total_bugs", total_bugs as f64, bug_ceiling, tol),
    MetricStatus::new(
      "code_coverage",
      derive::month_code_coverage(tm),
      targets.code_coverage.overall,
      tol,
    ),
  ]
}

/// Every team present in `month`, sorted by name.
pub fn team_overview(
  dataset: &Dataset,
  month: MonthKey,
  targets: &TargetConfig,
  valuation: &dyn ActivityValuation,
) -> Vec<TeamOverview> {
  let tol = &targets.tolerance;
  dataset
    .teams(month)
    .into_iter()
    .map(|team| {
      let tm = dataset.team_month(month, team);
      let roi = roi::summarize(tm, valuation).roi;
      TeamOverview {
        team: team.to_string(),
        health_score: health::health_score(tm, targets),
        roi,
        roi_status: roi.status(&targets.roi_bands),
        metrics: vec![
          MetricStatus::new("code_coverage", derive::month_code_coverage(tm), targets.code_coverage.overall, tol),
          MetricStatus::new(
            "pass_rate",
            derive::average_sprint_metric(tm, SprintMetric::PassRate),
            targets.pass_rate,
            tol,
          ),
          MetricStatus::new(
            "test_coverage",
            derive::month_test_coverage(tm, targets.cases_per_story),
            targets.test_coverage,
            tol,
          ),
          MetricStatus::new(
            "non_prod_bugs",
            derive::month_non_prod_bugs(tm) as f64,
            targets.non_prod_bugs.total,
            tol,
          ),
          MetricStatus::new(
            "prod_bugs",
            derive::total_production_bugs(tm) as f64,
            targets.prod_bugs.total,
            tol,
          ),
          MetricStatus::new(
            "lead_time_tests",
            derive::average_sprint_metric(tm, SprintMetric::LeadTimeTests),
            targets.lead_time_tests,
            tol,
          ),
        ],
      }
    })
    .collect()
}

/// `rpt-` + 16 hex chars of blake3 over month, team and the team-month JSON.
pub fn report_id(month: MonthKey, team: &str, tm: &TeamMonth) -> Result<String, EngineError> {
  let mut hasher = blake3::Hasher::new();
  hasher.update(month.to_string().as_bytes());
  hasher.update(b"|");
  hasher.update(team.as_bytes());
  hasher.update(b"|");
  hasher.update(&serde_json::to_vec(tm)?);
  let hex = hasher.finalize().to_hex();
  Ok(format!("rpt-{}", &hex[..16]))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless report builder over a borrowed dataset.
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Build the report for a (month, team). Month defaults to the latest,
  /// team to the dataset's default team.
  pub fn report(&self, dataset: &Dataset, month: Option<&str>, team: Option<&str>) -> Result<Report, EngineError> {
    let (month, team) = dataset.select(month, team)?;
    let span = info_span!("report", month = %month, team = %team);
    let _guard = span.enter();

    let tm = dataset
      .team_month(month, &team)
      .ok_or_else(|| EngineError::no_data(month.to_string(), team.clone()))?;
    let targets = self.config.targets.for_month(month);
    let valuation = &self.config.rate_card;

    let derived = DerivedMetrics::compute(Some(tm), &targets, valuation);
    let breakdown = health::health_breakdown(Some(tm), &targets);
    let health_display = breakdown.score / 10.0;
    debug!(score = breakdown.score, "health computed");

    let previous_month = dataset.previous_team_month(month, &team);
    let trend_rows = match previous_month.and_then(|prev| dataset.team_month(prev, &team)) {
      Some(prev_tm) => TrendTable::build(Some(tm), Some(prev_tm), &targets).rows,
      None => Vec::new(),
    };

    let report = Report {
      report_id: report_id(month, &team, tm)?,
      month,
      previous_month,
      health_status: trend::classify(health_display, targets.health.target, true, &targets.tolerance),
      roi_status: derived.roi.roi.status(&targets.roi_bands),
      cards: summary_cards(Some(tm), &targets),
      trend: trend_rows,
      missed_metrics: notes::missed_metrics(Some(tm), &targets),
      action_plan_key: notes::action_plan_key(month, &team),
      cumulative_scenarios: CumulativeScenarios {
        sprint1: dataset.cumulative_scenarios(month, &team, SprintSlot::Sprint1),
        sprint2: dataset.cumulative_scenarios(month, &team, SprintSlot::Sprint2),
      },
      team_overview: team_overview(dataset, month, &targets, valuation),
      health: breakdown,
      health_display,
      derived,
      team,
    };

    info!(report_id = %report.report_id, missed = report.missed_metrics.len(), "report built");
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{BugCounts, SprintRecord};

  fn month() -> MonthKey {
    MonthKey::new(2025, 11).unwrap()
  }

  fn team_month(pass_rate: f64, prod_high: u32) -> TeamMonth {
    TeamMonth {
      sprint1: Some(SprintRecord {
        pass_rate: Some(pass_rate),
        non_prod_bugs: Some(BugCounts::new(4, 3, 1)),
        ..SprintRecord::default()
      }),
      sprint2: None,
      production_bugs: Some(BugCounts::new(0, 0, prod_high)),
      qa_cost: Some(1000.0),
    }
  }

  #[test]
  fn total_bugs_card_counts_both_kinds_against_non_prod_target() {
    let targets = TargetConfig::default();
    let cards = summary_cards(Some(&team_month(95.0, 2)), &targets);
    let bugs = cards.iter().find(|c| c.metric == "total_bugs").unwrap();
    assert_eq!(bugs.value, 10.0);
    assert_eq!(bugs.target, 10.0);
    assert_eq!(bugs.status, Attainment::Met);

    let cards = summary_cards(Some(&team_month(95.0, 4)), &targets);
    let bugs = cards.iter().find(|c| c.metric == "total_bugs").unwrap();
    assert_eq!(bugs.value, 12.0);
    assert_eq!(bugs.status, Attainment::Missed);
  }

  #[test]
  fn trend_skips_months_the_team_has_no_data_in() {
    let sep = MonthKey::new(2025, 9).unwrap();
    let oct = MonthKey::new(2025, 10).unwrap();
    let mut ds = Dataset::new();
    ds.insert(sep, "Policy", team_month(90.0, 0));
    ds.insert(oct, "Claims", team_month(70.0, 0));
    ds.insert(month(), "Policy", team_month(95.0, 0));

    let report = Engine::with_defaults().report(&ds, None, Some("Policy")).unwrap();
    assert_eq!(report.previous_month, Some(sep));
    let pass = report
      .trend
      .iter()
      .find(|r| r.metric == trend::TrendMetric::PassRate)
      .unwrap();
    assert_eq!(pass.previous, 90.0);
    assert_eq!(pass.current, 95.0);
    assert!((pass.percent_change - 50.0 / 9.0).abs() < 1e-9);

    // Claims has nothing before October.
    let claims = Engine::with_defaults().report(&ds, Some("2025-10"), Some("Claims")).unwrap();
    assert_eq!(claims.previous_month, None);
    assert!(claims.trend.is_empty());
  }

  #[test]
  fn overflow_sized_counts_still_report() {
    let mut tm = team_month(95.0, 0);
    tm.production_bugs = Some(BugCounts::new(u32::MAX, 1, 0));
    if let Some(s) = tm.sprint1.as_mut() {
      s.non_prod_bugs = Some(BugCounts::new(u32::MAX, 1, 0));
      s.rework_prod_bugs = Some(u32::MAX);
      s.rework_non_prod_bugs = Some(1);
    }
    let mut ds = Dataset::new();
    ds.insert(month(), "Policy", tm);
    let report = Engine::with_defaults().report(&ds, None, None).unwrap();
    assert_eq!(report.derived.non_prod_bugs_total, u32::MAX);
    assert_eq!(report.derived.prod_bugs_total, u32::MAX);
    assert_eq!(report.derived.rework.total(), u32::MAX);
    let bugs = report.cards.iter().find(|c| c.metric == "total_bugs").unwrap();
    assert_eq!(bugs.value, u32::MAX as f64);
  }

  #[test]
  fn pass_rate_card_is_near_within_tolerance() {
    let cards = summary_cards(Some(&team_month(85.0, 0)), &TargetConfig::default());
    assert_eq!(cards[0].metric, "pass_rate");
    assert_eq!(cards[0].status, Attainment::Near);
  }

  #[test]
  fn report_id_is_stable_and_input_sensitive() {
    let a = report_id(month(), "Policy", &team_month(95.0, 0)).unwrap();
    let b = report_id(month(), "Policy", &team_month(95.0, 0)).unwrap();
    let c = report_id(month(), "Claims", &team_month(95.0, 0)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.starts_with("rpt-"));
    assert_eq!(a.len(), 20);
  }

  #[test]
  fn single_month_has_no_trend() {
    let mut ds = Dataset::new();
    ds.insert(month(), "Policy", team_month(95.0, 0));
    let report = Engine::with_defaults().report(&ds, None, None).unwrap();
    assert!(report.previous_month.is_none());
    assert!(report.trend.is_empty());
    assert_eq!(report.team_overview.len(), 1);
  }

  #[test]
  fn overview_lists_every_team_in_month() {
    let mut ds = Dataset::new();
    ds.insert(month(), "Policy", team_month(95.0, 0));
    ds.insert(month(), "Claims", team_month(70.0, 3));
    let targets = TargetConfig::default();
    let rows = team_overview(&ds, month(), &targets, &crate::roi::RateCard::default());
    let names: Vec<&str> = rows.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(names, vec!["Claims", "Policy"]);
    assert_eq!(rows[0].metrics.len(), 6);
    assert_eq!(rows[0].metrics[1].status, Attainment::Missed);
  }
}
