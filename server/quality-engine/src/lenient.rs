//! Lenient deserializers for hand-maintained datasets.
//!
//! Malformed values are read as "absent" instead of rejecting the record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read a finite number from a JSON number or numeric string.
pub fn number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  n.filter(|v| v.is_finite())
}

pub fn opt_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Value>::deserialize(d)?;
  Ok(raw.as_ref().and_then(number))
}

/// Non-negative count; fractional values round to the nearest integer.
pub fn opt_count<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Value>::deserialize(d)?;
  Ok(
    raw
      .as_ref()
      .and_then(number)
      .filter(|v| *v >= 0.0)
      .map(|v| v.round().min(u32::MAX as f64) as u32),
  )
}

pub fn opt_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Value>::deserialize(d)?;
  Ok(match raw {
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

/// Nested record that falls back to `None` when it does not have the expected shape.
pub fn opt_record<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let raw = Option::<Value>::deserialize(d)?;
  Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// Monthly plan array; blanks and non-numbers become `None`, a non-array is empty.
pub fn plan<'de, D>(d: D) -> Result<Vec<Option<f64>>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<Value>::deserialize(d)?;
  Ok(match raw {
    Some(Value::Array(items)) => items.iter().map(number).collect(),
    _ => Vec::new(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Deserialize)]
  struct Sample {
    #[serde(default, deserialize_with = "opt_f64")]
    value: Option<f64>,
    #[serde(default, deserialize_with = "opt_count")]
    count: Option<u32>,
    #[serde(default, deserialize_with = "plan")]
    plan: Vec<Option<f64>>,
  }

  fn sample(v: Value) -> Sample {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn numbers_and_numeric_strings_are_read() {
    assert_eq!(number(&json!(4.5)), Some(4.5));
    assert_eq!(number(&json!(" 12 ")), Some(12.0));
    assert_eq!(number(&json!("")), None);
    assert_eq!(number(&json!(null)), None);
    assert_eq!(number(&json!({"a": 1})), None);
  }

  #[test]
  fn malformed_fields_resolve_to_absent() {
    let p = sample(json!({"value": "n/a", "count": -3, "plan": "x"}));
    assert_eq!(p.value, None);
    assert_eq!(p.count, None);
    assert!(p.plan.is_empty());
  }

  #[test]
  fn missing_fields_resolve_to_absent() {
    let p = sample(json!({}));
    assert_eq!(p.value, None);
    assert_eq!(p.count, None);
  }

  #[test]
  fn plan_keeps_blank_slots() {
    let p = sample(json!({"plan": [60, "", "", 65]}));
    assert_eq!(p.plan, vec![Some(60.0), None, None, Some(65.0)]);
  }

  #[test]
  fn counts_round_to_integers() {
    let p = sample(json!({"count": 2.6}));
    assert_eq!(p.count, Some(3));
  }
}
