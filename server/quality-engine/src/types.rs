//! Core types for the quality engine (dataset records + JSON contracts).

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::GoalsOverride;
use crate::dataset::Dataset;
use crate::error::EngineError;
use crate::lenient;
use crate::roi::RateCard;

// ---------------------------------------------------------------------------
// Month key
// ---------------------------------------------------------------------------

/// Calendar month identifying one slice of the dataset, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

impl MonthKey {
  pub fn new(year: i32, month: u32) -> Option<Self> {
    NaiveDate::from_ymd_opt(year, month, 1).map(Self)
  }

  pub fn parse(s: &str) -> Result<Self, EngineError> {
    let bad = || EngineError::validation("month", &format!("expected YYYY-MM, got {:?}", s));
    let (y, m) = s.split_once('-').ok_or_else(bad)?;
    if y.len() != 4 || m.len() != 2 {
      return Err(bad());
    }
    let year: i32 = y.parse().map_err(|_| bad())?;
    let month: u32 = m.parse().map_err(|_| bad())?;
    Self::new(year, month).ok_or_else(bad)
  }

  pub fn year(&self) -> i32 {
    self.0.year()
  }

  /// Calendar month, 1-based.
  pub fn month(&self) -> u32 {
    self.0.month()
  }

  /// The following calendar month (saturates at chrono's upper bound).
  pub fn next(&self) -> Self {
    self
      .0
      .checked_add_months(Months::new(1))
      .map(Self)
      .unwrap_or(*self)
  }

  /// English month name, e.g. "December".
  pub fn month_name(&self) -> String {
    self.0.format("%B").to_string()
  }
}

impl fmt::Display for MonthKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format("%Y-%m"))
  }
}

impl FromStr for MonthKey {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Serialize for MonthKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for MonthKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Self::parse(&raw).map_err(serde::de::Error::custom)
  }
}

// ---------------------------------------------------------------------------
// Bug severities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

impl Severity {
  pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }
}

/// Bug counts by severity. A missing severity counts as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugCounts {
  #[serde(default, alias = "baixa", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub low: Option<u32>,
  #[serde(default, alias = "media", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub medium: Option<u32>,
  #[serde(default, alias = "alta", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub high: Option<u32>,
}

impl BugCounts {
  pub fn new(low: u32, medium: u32, high: u32) -> Self {
    Self {
      low: Some(low),
      medium: Some(medium),
      high: Some(high),
    }
  }

  pub fn get(&self, severity: Severity) -> u32 {
    match severity {
      Severity::Low => self.low,
      Severity::Medium => self.medium,
      Severity::High => self.high,
    }
    .unwrap_or(0)
  }

  /// Sum over severities; saturates at `u32::MAX`.
  pub fn total(&self) -> u32 {
    Severity::ALL
      .iter()
      .fold(0u32, |acc, s| acc.saturating_add(self.get(*s)))
  }

  /// Severity-wise sum with missing entries read as zero.
  pub fn sum(&self, other: &BugCounts) -> BugCounts {
    let add = |s: Severity| self.get(s).saturating_add(other.get(s));
    BugCounts::new(add(Severity::Low), add(Severity::Medium), add(Severity::High))
  }
}

// ---------------------------------------------------------------------------
// Sprint records
// ---------------------------------------------------------------------------

/// Code coverage sub-metrics, each a percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCoverage {
  #[serde(default, alias = "linhas", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lines: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub classes: Option<f64>,
  #[serde(default, alias = "metodos", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub methods: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub branches: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageKind {
  Lines,
  Classes,
  Methods,
  Branches,
}

impl CoverageKind {
  pub const ALL: [CoverageKind; 4] = [
    CoverageKind::Lines,
    CoverageKind::Classes,
    CoverageKind::Methods,
    CoverageKind::Branches,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Lines => "lines",
      Self::Classes => "classes",
      Self::Methods => "methods",
      Self::Branches => "branches",
    }
  }
}

impl CodeCoverage {
  pub fn new(lines: f64, classes: f64, methods: f64, branches: f64) -> Self {
    Self {
      lines: Some(lines),
      classes: Some(classes),
      methods: Some(methods),
      branches: Some(branches),
    }
  }

  pub fn get(&self, kind: CoverageKind) -> Option<f64> {
    match kind {
      CoverageKind::Lines => self.lines,
      CoverageKind::Classes => self.classes,
      CoverageKind::Methods => self.methods,
      CoverageKind::Branches => self.branches,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedTests {
  /// New automated scenarios delivered in the sprint.
  #[serde(default, alias = "cenarios", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub scenarios: Option<u32>,
  /// Manual execution time in minutes.
  #[serde(default, alias = "tempoManual", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub manual_minutes: Option<f64>,
  /// Automated execution time in minutes.
  #[serde(default, alias = "tempoAutom", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub automated_minutes: Option<f64>,
}

/// Average minutes spent per test case on each QA activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Efficiency {
  #[serde(default, alias = "escrita", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub writing: Option<f64>,
  #[serde(default, alias = "execucao", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub execution: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub reexecution: Option<f64>,
}

/// One sprint's raw inputs. Absent fields mean "not measured".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintRecord {
  #[serde(default, alias = "numero", deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
  pub number: Option<String>,
  #[serde(default, alias = "nome", deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, alias = "coberturaCodigo", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub code_coverage: Option<CodeCoverage>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub pass_rate: Option<f64>,
  #[serde(default, alias = "bugsNaoProdutivos", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub non_prod_bugs: Option<BugCounts>,
  /// Legacy per-sprint production bugs; superseded by [`TeamMonth::production_bugs`].
  #[serde(default, alias = "bugsProducao", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub production_bugs: Option<BugCounts>,
  #[serde(default, alias = "usSprint", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub user_stories: Option<u32>,
  #[serde(default, alias = "casosTestePorUs", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub test_cases: Option<u32>,
  #[serde(default, alias = "leadTimeTestes", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_tests: Option<f64>,
  #[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_bugs: Option<f64>,
  #[serde(default, alias = "leadTimeBugsProd", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub lead_time_prod_bugs: Option<f64>,
  #[serde(default, alias = "testesAutomatizados", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub automated_tests: Option<AutomatedTests>,
  #[serde(default, alias = "ctEscritos", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub cases_written: Option<u32>,
  #[serde(default, alias = "ctExecutados", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub cases_executed: Option<u32>,
  #[serde(default, alias = "reexecucaoBugsNaoProd", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub rework_non_prod_bugs: Option<u32>,
  #[serde(default, alias = "reexecucaoBugsProd", deserialize_with = "lenient::opt_count", skip_serializing_if = "Option::is_none")]
  pub rework_prod_bugs: Option<u32>,
  #[serde(default, alias = "eficiencia", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub efficiency: Option<Efficiency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintSlot {
  Sprint1,
  Sprint2,
}

/// One team's month: two sprints, consolidated production bugs and QA cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMonth {
  #[serde(default, deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub sprint1: Option<SprintRecord>,
  #[serde(default, deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub sprint2: Option<SprintRecord>,
  #[serde(default, alias = "bugsProducao", deserialize_with = "lenient::opt_record", skip_serializing_if = "Option::is_none")]
  pub production_bugs: Option<BugCounts>,
  /// Monthly QA cost.
  #[serde(default, alias = "qaValor", deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
  pub qa_cost: Option<f64>,
}

impl TeamMonth {
  pub fn sprint(&self, slot: SprintSlot) -> Option<&SprintRecord> {
    match slot {
      SprintSlot::Sprint1 => self.sprint1.as_ref(),
      SprintSlot::Sprint2 => self.sprint2.as_ref(),
    }
  }

  pub fn sprint_mut(&mut self, slot: SprintSlot) -> Option<&mut SprintRecord> {
    match slot {
      SprintSlot::Sprint1 => self.sprint1.as_mut(),
      SprintSlot::Sprint2 => self.sprint2.as_mut(),
    }
  }
}

// ---------------------------------------------------------------------------
// Binary contract
// ---------------------------------------------------------------------------

/// Request read from stdin. Unknown fields are silently ignored.
#[derive(Debug, Deserialize)]
pub struct Input {
  pub dataset: Dataset,
  /// Overrides goals embedded in the dataset.
  #[serde(default)]
  pub goals: Option<GoalsOverride>,
  /// Defaults to the latest month in the dataset.
  #[serde(default)]
  pub month: Option<String>,
  /// Defaults to "Policy" when present, else the first team.
  #[serde(default)]
  pub team: Option<String>,
  #[serde(default)]
  pub rate_card: Option<RateCard>,
}

/// Structured error output for a request that cannot be answered.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
