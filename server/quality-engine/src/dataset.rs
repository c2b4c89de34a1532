//! In-memory dataset: month -> team -> team-month, plus optional embedded goals.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::GoalsOverride;
use crate::derive::{self, ReworkTotals};
use crate::error::EngineError;
use crate::types::{MonthKey, SprintSlot, TeamMonth};

/// Top-level key holding goals embedded in the dataset file.
pub const GOALS_KEY: &str = "goals";

/// Goals key used by dashboard-exported files; read like [`GOALS_KEY`].
pub const LEGACY_GOALS_KEY: &str = "metas";

const SPRINT_KEYS: [&str; 2] = ["sprint1", "sprint2"];

/// Name given to the n-th (1-based) sprint of a freshly cloned month.
fn cloned_sprint_name(month: MonthKey, n: usize) -> String {
  format!("Sprint {} {:02}", month.month_name(), n)
}

/// Clone the latest month of a raw dataset document in place.
///
/// Works on the JSON tree so keys the typed [`Dataset`] does not model (history
/// blocks, per-story lists, unknown fields, unreadable teams) survive untouched.
/// Only the sprint names of the new month change; an existing `nome` key is
/// kept as the name key, otherwise `name` is written.
pub fn clone_latest_month_value(root: &mut Value) -> Result<MonthKey, EngineError> {
  let Value::Object(map) = root else {
    return Err(EngineError::validation("dataset", "expected an object keyed by month"));
  };
  let latest = map
    .keys()
    .filter_map(|k| MonthKey::parse(k).ok())
    .max()
    .ok_or(EngineError::EmptyDataset)?;
  let next = latest.next();
  if next == latest || map.contains_key(&next.to_string()) {
    return Err(EngineError::MonthExists(next.to_string()));
  }

  let mut copy = map.get(&latest.to_string()).cloned().unwrap_or(Value::Null);
  if let Value::Object(teams) = &mut copy {
    for team in teams.values_mut() {
      let Value::Object(team) = team else {
        continue;
      };
      for (idx, key) in SPRINT_KEYS.iter().enumerate() {
        if let Some(Value::Object(sprint)) = team.get_mut(*key) {
          let name_key = if sprint.contains_key("nome") { "nome" } else { "name" };
          sprint.insert(name_key.to_string(), Value::String(cloned_sprint_name(next, idx + 1)));
        }
      }
    }
  }

  info!(from = %latest, to = %next, "cloned month in document");
  map.insert(next.to_string(), copy);
  Ok(next)
}

/// Team selected when the caller names none and it is present.
pub const DEFAULT_TEAM: &str = "Policy";

/// How many of the most recent months to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
  All,
  Last(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
  months: BTreeMap<MonthKey, BTreeMap<String, TeamMonth>>,
  goals: Option<GoalsOverride>,
}

impl Dataset {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read a dataset object. Non-month keys are ignored; unreadable entries are skipped.
  pub fn from_value(value: Value) -> Result<Self, EngineError> {
    let Value::Object(root) = value else {
      return Err(EngineError::validation("dataset", "expected an object keyed by month"));
    };

    let mut dataset = Dataset::new();
    for (key, entry) in root {
      if key == GOALS_KEY || key == LEGACY_GOALS_KEY {
        match serde_json::from_value::<GoalsOverride>(entry) {
          Ok(goals) if key == GOALS_KEY || dataset.goals.is_none() => dataset.goals = Some(goals),
          Ok(_) => debug!(key = %key, "legacy goals shadowed by goals key"),
          Err(e) => warn!(error = %e, "ignoring unreadable embedded goals"),
        }
        continue;
      }
      let month = match MonthKey::parse(&key) {
        Ok(m) => m,
        Err(_) => {
          debug!(key = %key, "ignoring non-month key");
          continue;
        }
      };
      let Value::Object(teams) = entry else {
        warn!(month = %month, "month entry is not an object; skipped");
        continue;
      };
      let slot = dataset.months.entry(month).or_default();
      for (team, record) in teams {
        if !record.is_object() {
          warn!(month = %month, team = %team, "team entry is not an object; skipped");
          continue;
        }
        match serde_json::from_value::<TeamMonth>(record) {
          Ok(tm) => {
            slot.insert(team, tm);
          }
          Err(e) => warn!(month = %month, team = %team, error = %e, "unreadable team entry; skipped"),
        }
      }
    }
    Ok(dataset)
  }

  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let value: Value = serde_json::from_str(raw)?;
    Self::from_value(value)
  }

  pub fn goals(&self) -> Option<&GoalsOverride> {
    self.goals.as_ref()
  }

  pub fn set_goals(&mut self, goals: Option<GoalsOverride>) {
    self.goals = goals;
  }

  pub fn insert(&mut self, month: MonthKey, team: impl Into<String>, tm: TeamMonth) {
    self.months.entry(month).or_default().insert(team.into(), tm);
  }

  pub fn is_empty(&self) -> bool {
    self.months.is_empty()
  }

  /// Month keys in ascending order.
  pub fn months(&self) -> Vec<MonthKey> {
    self.months.keys().copied().collect()
  }

  pub fn latest_month(&self) -> Option<MonthKey> {
    self.months.keys().next_back().copied()
  }

  pub fn month(&self, month: MonthKey) -> Option<&BTreeMap<String, TeamMonth>> {
    self.months.get(&month)
  }

  /// Teams of one month, sorted.
  pub fn teams(&self, month: MonthKey) -> Vec<&str> {
    self
      .months
      .get(&month)
      .map(|teams| teams.keys().map(String::as_str).collect())
      .unwrap_or_default()
  }

  /// Every team seen in any month, sorted.
  pub fn all_teams(&self) -> BTreeSet<&str> {
    self
      .months
      .values()
      .flat_map(|teams| teams.keys().map(String::as_str))
      .collect()
  }

  /// [`DEFAULT_TEAM`] when present anywhere, else the first team alphabetically.
  pub fn default_team(&self) -> Option<&str> {
    let teams = self.all_teams();
    if teams.contains(DEFAULT_TEAM) {
      return Some(DEFAULT_TEAM);
    }
    teams.into_iter().next()
  }

  pub fn team_month(&self, month: MonthKey, team: &str) -> Option<&TeamMonth> {
    self.months.get(&month).and_then(|teams| teams.get(team))
  }

  /// The closest earlier month present in the dataset.
  pub fn previous_month(&self, month: MonthKey) -> Option<MonthKey> {
    self.months.range(..month).next_back().map(|(k, _)| *k)
  }

  /// The team's closest earlier month; months without the team are skipped.
  pub fn previous_team_month(&self, month: MonthKey, team: &str) -> Option<MonthKey> {
    self
      .months
      .range(..month)
      .rev()
      .find(|(_, teams)| teams.contains_key(team))
      .map(|(k, _)| *k)
  }

  /// Months holding data for `team`, ascending, limited to the period.
  pub fn available_months(&self, team: &str, period: Period) -> Vec<MonthKey> {
    let months: Vec<MonthKey> = self
      .months
      .iter()
      .filter(|(_, teams)| teams.contains_key(team))
      .map(|(k, _)| *k)
      .collect();
    match period {
      Period::All => months,
      Period::Last(n) => months[months.len().saturating_sub(n)..].to_vec(),
    }
  }

  /// Running total of new automated scenarios up to and including the given sprint.
  pub fn cumulative_scenarios(&self, month: MonthKey, team: &str, sprint: SprintSlot) -> u32 {
    let scenarios = |tm: &TeamMonth, slot: SprintSlot| {
      tm.sprint(slot)
        .and_then(|s| s.automated_tests.as_ref())
        .and_then(|a| a.scenarios)
        .unwrap_or(0)
    };
    let mut total: u32 = 0;
    for (key, teams) in self.months.range(..=month) {
      let Some(tm) = teams.get(team) else {
        continue;
      };
      total = scenarios(tm, SprintSlot::Sprint1).saturating_add(total);
      if *key == month && sprint == SprintSlot::Sprint1 {
        break;
      }
      total = scenarios(tm, SprintSlot::Sprint2).saturating_add(total);
    }
    total
  }

  /// Re-executions accumulated over the team's months in the period.
  pub fn accumulated_rework(&self, team: &str, period: Period) -> ReworkTotals {
    derive::rework_over(
      self
        .available_months(team, period)
        .into_iter()
        .map(|m| self.team_month(m, team)),
    )
  }

  /// Resolve a (month, team) selection, defaulting to the latest month and default team.
  pub fn select(&self, month: Option<&str>, team: Option<&str>) -> Result<(MonthKey, String), EngineError> {
    let month = match month {
      Some(m) => MonthKey::parse(m)?,
      None => self.latest_month().ok_or(EngineError::EmptyDataset)?,
    };
    let team = match team {
      Some(t) => t.to_string(),
      None => self
        .default_team()
        .map(str::to_string)
        .ok_or(EngineError::EmptyDataset)?,
    };
    if self.team_month(month, &team).is_none() {
      return Err(EngineError::no_data(month.to_string(), team));
    }
    Ok((month, team))
  }

  /// Deep-copy the latest month as the following calendar month and rename its sprints.
  ///
  /// Acts on the typed model only; use [`clone_latest_month_value`] to edit a file.
  pub fn clone_latest_month(&mut self) -> Result<MonthKey, EngineError> {
    let latest = self.latest_month().ok_or(EngineError::EmptyDataset)?;
    let next = latest.next();
    if next == latest || self.months.contains_key(&next) {
      return Err(EngineError::MonthExists(next.to_string()));
    }

    let mut teams = self.months.get(&latest).cloned().unwrap_or_default();
    for tm in teams.values_mut() {
      for (idx, slot) in [SprintSlot::Sprint1, SprintSlot::Sprint2].iter().enumerate() {
        if let Some(sprint) = tm.sprint_mut(*slot) {
          sprint.name = Some(cloned_sprint_name(next, idx + 1));
        }
      }
    }

    info!(from = %latest, to = %next, teams = teams.len(), "cloned month");
    self.months.insert(next, teams);
    Ok(next)
  }
}

impl Serialize for Dataset {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let len = self.months.len() + usize::from(self.goals.is_some());
    let mut map = serializer.serialize_map(Some(len))?;
    if let Some(goals) = &self.goals {
      map.serialize_entry(GOALS_KEY, goals)?;
    }
    for (month, teams) in &self.months {
      map.serialize_entry(&month.to_string(), teams)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for Dataset {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Dataset::from_value(value).map_err(serde::de::Error::custom)
  }
}
