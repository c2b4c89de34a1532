//! QA return on investment: activity value against monthly QA cost.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::config::RoiBands;
use crate::derive;
use crate::trend::Attainment;
use crate::types::{Severity, SprintRecord, SprintSlot, TeamMonth};

/// Source of per-sprint activity value. ROI only sees the totals.
pub trait ActivityValuation {
  fn gains(&self, sprint: &SprintRecord) -> f64;
  fn losses(&self, sprint: &SprintRecord) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeverityRates {
  pub low: f64,
  pub medium: f64,
  pub high: f64,
}

impl SeverityRates {
  pub fn get(&self, severity: Severity) -> f64 {
    match severity {
      Severity::Low => self.low,
      Severity::Medium => self.medium,
      Severity::High => self.high,
    }
  }
}

impl Default for SeverityRates {
  fn default() -> Self {
    Self {
      low: 200.0,
      medium: 500.0,
      high: 1500.0,
    }
  }
}

/// Built-in valuation.
///
/// Gains: automation hours saved at `hourly_rate`, plus the avoided cost of every
/// bug caught before production. Losses: each bug re-execution at `rework_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateCard {
  pub hourly_rate: f64,
  pub avoided_cost: SeverityRates,
  pub rework_cost: f64,
}

impl Default for RateCard {
  fn default() -> Self {
    Self {
      hourly_rate: 100.0,
      avoided_cost: SeverityRates::default(),
      rework_cost: 50.0,
    }
  }
}

impl ActivityValuation for RateCard {
  fn gains(&self, sprint: &SprintRecord) -> f64 {
    let automation = derive::sprint_automation(Some(sprint)).minutes_saved() / 60.0 * self.hourly_rate;
    let caught = sprint
      .non_prod_bugs
      .as_ref()
      .map(|bugs| {
        Severity::ALL
          .iter()
          .map(|s| bugs.get(*s) as f64 * self.avoided_cost.get(*s))
          .sum::<f64>()
      })
      .unwrap_or(0.0);
    automation + caught
  }

  fn losses(&self, sprint: &SprintRecord) -> f64 {
    let reruns = sprint
      .rework_prod_bugs
      .unwrap_or(0)
      .saturating_add(sprint.rework_non_prod_bugs.unwrap_or(0));
    reruns as f64 * self.rework_cost
  }
}

/// ROI percentage. Positive value at zero cost is unbounded, not a large number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Roi {
  Finite(f64),
  Unbounded,
}

impl Roi {
  pub fn as_f64(self) -> f64 {
    match self {
      Self::Finite(v) => v,
      Self::Unbounded => f64::INFINITY,
    }
  }

  pub fn is_unbounded(self) -> bool {
    matches!(self, Self::Unbounded)
  }

  pub fn status(self, bands: &RoiBands) -> Attainment {
    let v = self.as_f64();
    if v >= bands.met {
      Attainment::Met
    } else if v >= bands.near {
      Attainment::Near
    } else {
      Attainment::Missed
    }
  }
}

impl fmt::Display for Roi {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Finite(v) => write!(f, "{:.2}%", v),
      Self::Unbounded => f.write_str("∞"),
    }
  }
}

impl Serialize for Roi {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Finite(v) => serializer.serialize_f64(*v),
      Self::Unbounded => serializer.serialize_str("infinity"),
    }
  }
}

/// `(net - cost) / cost * 100` where `net = gains - losses`.
///
/// With no cost: unbounded if net is positive, else 0.
pub fn roi(cost: f64, gains: f64, losses: f64) -> Roi {
  let net = gains - losses;
  if cost > 0.0 {
    Roi::Finite((net - cost) / cost * 100.0)
  } else if net > 0.0 {
    Roi::Unbounded
  } else {
    Roi::Finite(0.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiSummary {
  pub cost: f64,
  pub gains: f64,
  pub losses: f64,
  pub net_value: f64,
  pub roi: Roi,
}

/// ROI for a team-month; a missing sprint contributes no value.
pub fn summarize(tm: Option<&TeamMonth>, valuation: &dyn ActivityValuation) -> RoiSummary {
  let cost = tm.and_then(|t| t.qa_cost).unwrap_or(0.0).max(0.0);
  let (gains, losses) = [SprintSlot::Sprint1, SprintSlot::Sprint2]
    .iter()
    .filter_map(|slot| tm.and_then(|t| t.sprint(*slot)))
    .fold((0.0, 0.0), |(g, l), s| (g + valuation.gains(s), l + valuation.losses(s)));
  RoiSummary {
    cost,
    gains,
    losses,
    net_value: gains - losses,
    roi: roi(cost, gains, losses),
  }
}
