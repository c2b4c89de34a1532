//! QA Metrics Quality Engine: deterministic derivation and scoring over
//! per-team, per-sprint QA data.
//!
//! Derives coverage, bug, lead-time, automation and rework figures per
//! team-month, scores a weighted health index, compares consecutive months
//! and computes QA ROI against configurable targets.
//!
//! No DB, no network; pure computation over an in-memory dataset.

pub mod config;
pub mod dataset;
pub mod derive;
pub mod error;
pub mod health;
mod lenient;
pub mod notes;
pub mod report;
pub mod roi;
pub mod trend;
pub mod types;

pub use config::{Config, GoalsOverride, TargetConfig};
pub use dataset::{Dataset, Period};
pub use error::EngineError;
pub use report::{Engine, Report};
pub use types::{ErrorOutput, Input, MonthKey, TeamMonth};

/// Answer one request: goals embedded in the dataset, then request goals on top.
pub fn run(input: &Input) -> Result<Report, EngineError> {
  let mut targets = TargetConfig::from_goals(input.dataset.goals());
  if let Some(goals) = &input.goals {
    targets = targets.merged(goals);
  }
  let config = Config {
    targets,
    rate_card: input.rate_card.clone().unwrap_or_default(),
  };
  Engine::new(config).report(&input.dataset, input.month.as_deref(), input.team.as_deref())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input(json: &str) -> Input {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn request_goals_override_dataset_goals() {
    let req = input(
      r#"{
        "dataset": {
          "goals": {"passRate": 80, "testCoverage": 50},
          "2025-11": {"Policy": {"sprint1": {"passRate": 85}}}
        },
        "goals": {"passRate": 95}
      }"#,
    );
    let report = run(&req).unwrap();
    let pass = report.cards.iter().find(|c| c.metric == "pass_rate").unwrap();
    let tests = report.cards.iter().find(|c| c.metric == "test_coverage").unwrap();
    assert_eq!(pass.target, 95.0);
    assert_eq!(tests.target, 50.0);
  }

  #[test]
  fn unknown_team_is_no_data() {
    let req = input(r#"{"dataset": {"2025-11": {"Policy": {}}}, "team": "Nope"}"#);
    match run(&req) {
      Err(EngineError::NoData { month, team }) => {
        assert_eq!(month, "2025-11");
        assert_eq!(team, "Nope");
      }
      other => panic!("expected NoData, got {:?}", other),
    }
  }

  #[test]
  fn malformed_month_is_validation_error() {
    let req = input(r#"{"dataset": {"2025-11": {"Policy": {}}}, "month": "November"}"#);
    assert!(matches!(run(&req), Err(EngineError::Validation { .. })));
  }
}
