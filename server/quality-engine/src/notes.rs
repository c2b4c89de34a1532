//! Missed targets and per-(month, team) action-plan notes.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::config::{Target, TargetConfig};
use crate::derive::{self, SprintMetric};
use crate::types::{CoverageKind, MonthKey, Severity, TeamMonth};

/// Key-value persistence for free-text notes.
pub trait NoteStore {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&mut self, key: &str, text: &str);
  /// Returns whether a note was present.
  fn remove(&mut self, key: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNoteStore {
  notes: HashMap<String, String>,
}

impl MemoryNoteStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.notes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.is_empty()
  }
}

impl NoteStore for MemoryNoteStore {
  fn get(&self, key: &str) -> Option<String> {
    self.notes.get(key).cloned()
  }

  fn set(&mut self, key: &str, text: &str) {
    self.notes.insert(key.to_string(), text.to_string());
  }

  fn remove(&mut self, key: &str) -> bool {
    self.notes.remove(key).is_some()
  }
}

pub fn action_plan_key(month: MonthKey, team: &str) -> String {
  format!("actionPlan-{}-{}", month, team)
}

/// One target the team-month did not reach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissedMetric {
  pub label: String,
  pub actual: f64,
  pub target: f64,
}

fn fmt_value(v: f64) -> String {
  if v.fract() == 0.0 {
    format!("{}", v as i64)
  } else {
    format!("{:.1}", v)
  }
}

impl fmt::Display for MissedMetric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} (actual: {}, target: {})",
      self.label,
      fmt_value(self.actual),
      fmt_value(self.target)
    )
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) => c.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Every target not met by the team-month, in a fixed order.
pub fn missed_metrics(tm: Option<&TeamMonth>, targets: &TargetConfig) -> Vec<MissedMetric> {
  if tm.is_none() {
    return Vec::new();
  }
  let mut missed = Vec::new();
  let mut check = |label: String, actual: f64, target: Target| {
    if !target.is_met(actual) {
      missed.push(MissedMetric {
        label,
        actual,
        target: target.value,
      });
    }
  };

  for kind in CoverageKind::ALL {
    let actual = derive::average_sprint_metric(tm, SprintMetric::Coverage(kind));
    check(
      format!("Code coverage - {}", capitalize(kind.as_str())),
      actual,
      targets.code_coverage.get(kind),
    );
  }
  check(
    "Pass rate".into(),
    derive::average_sprint_metric(tm, SprintMetric::PassRate),
    targets.pass_rate,
  );
  check(
    "Test coverage".into(),
    derive::month_test_coverage(tm, targets.cases_per_story),
    targets.test_coverage,
  );
  check(
    "Lead time tests".into(),
    derive::average_sprint_metric(tm, SprintMetric::LeadTimeTests),
    targets.lead_time_tests,
  );
  check(
    "Lead time bugs".into(),
    derive::average_sprint_metric(tm, SprintMetric::LeadTimeBugs),
    targets.lead_time_bugs,
  );
  check(
    "Non-production bugs (total)".into(),
    derive::month_non_prod_bugs(tm) as f64,
    targets.non_prod_bugs.total,
  );

  let prod = derive::production_bugs(tm);
  check(
    "Production bugs (total)".into(),
    prod.total() as f64,
    targets.prod_bugs.total,
  );
  for severity in Severity::ALL {
    check(
      format!("Production bugs ({})", severity.as_str()),
      prod.get(severity) as f64,
      targets.prod_bugs.get(severity),
    );
  }
  missed
}

/// Pre-filled action-plan text listing each missed target.
pub fn action_plan_template(missed: &[MissedMetric]) -> String {
  if missed.is_empty() {
    return "All targets were met!\n\nNotes:".to_string();
  }
  let items: Vec<String> = missed
    .iter()
    .map(|m| format!("* {}\n  - Action plan: ", m))
    .collect();
  format!("Missed targets:\n\n{}\n\nOther notes:", items.join("\n\n"))
}

/// The saved action plan, or the template when none is saved.
pub fn load_action_plan(
  store: &dyn NoteStore,
  month: MonthKey,
  team: &str,
  tm: Option<&TeamMonth>,
  targets: &TargetConfig,
) -> String {
  match store.get(&action_plan_key(month, team)) {
    Some(saved) if !saved.is_empty() => saved,
    _ => action_plan_template(&missed_metrics(tm, targets)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{BugCounts, CodeCoverage, SprintRecord};

  fn month() -> MonthKey {
    MonthKey::new(2025, 11).unwrap()
  }

  fn healthy_sprint() -> SprintRecord {
    SprintRecord {
      code_coverage: Some(CodeCoverage::new(60.0, 60.0, 60.0, 60.0)),
      pass_rate: Some(95.0),
      user_stories: Some(2),
      test_cases: Some(6),
      lead_time_tests: Some(1.0),
      lead_time_bugs: Some(1.0),
      non_prod_bugs: Some(BugCounts::new(1, 0, 0)),
      ..SprintRecord::default()
    }
  }

  #[test]
  fn key_format() {
    assert_eq!(action_plan_key(month(), "Policy"), "actionPlan-2025-11-Policy");
  }

  #[test]
  fn nothing_missed_when_all_targets_met() {
    let tm = TeamMonth {
      sprint1: Some(healthy_sprint()),
      sprint2: Some(healthy_sprint()),
      production_bugs: Some(BugCounts::new(0, 0, 0)),
      qa_cost: None,
    };
    let missed = missed_metrics(Some(&tm), &TargetConfig::default());
    assert!(missed.is_empty(), "{:?}", missed);
    assert_eq!(action_plan_template(&missed), "All targets were met!\n\nNotes:");
  }

  #[test]
  fn lists_missed_targets_with_actual_and_target() {
    let mut s = healthy_sprint();
    s.pass_rate = Some(80.0);
    let tm = TeamMonth {
      sprint1: Some(s),
      sprint2: Some(healthy_sprint()),
      production_bugs: Some(BugCounts::new(0, 0, 1)),
      qa_cost: None,
    };
    let missed = missed_metrics(Some(&tm), &TargetConfig::default());
    let labels: Vec<&str> = missed.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["Pass rate", "Production bugs (high)"]);
    assert_eq!(missed[0].to_string(), "Pass rate (actual: 87.5, target: 90)");
    assert_eq!(missed[1].to_string(), "Production bugs (high) (actual: 1, target: 0)");

    let text = action_plan_template(&missed);
    assert!(text.starts_with("Missed targets:\n\n* Pass rate"));
    assert!(text.ends_with("\n\nOther notes:"));
  }

  #[test]
  fn missing_team_month_has_no_missed_metrics() {
    assert!(missed_metrics(None, &TargetConfig::default()).is_empty());
  }

  #[test]
  fn saved_note_wins_over_template() {
    let mut store = MemoryNoteStore::new();
    let targets = TargetConfig::default();
    let fallback = load_action_plan(&store, month(), "Policy", None, &targets);
    assert_eq!(fallback, "All targets were met!\n\nNotes:");

    store.set(&action_plan_key(month(), "Policy"), "Pair on flaky suites");
    assert_eq!(
      load_action_plan(&store, month(), "Policy", None, &targets),
      "Pair on flaky suites"
    );
    assert!(store.remove(&action_plan_key(month(), "Policy")));
    assert!(!store.remove(&action_plan_key(month(), "Policy")));
    assert!(store.is_empty());
  }
}
