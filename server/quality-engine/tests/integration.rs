//! Integration tests for the quality engine.

use quality_engine::dataset::clone_latest_month_value;
use quality_engine::report::Engine;
use quality_engine::roi::Roi;
use quality_engine::trend::{Attainment, Direction, SortKey, SortOrder, TrendMetric, TrendTable};
use quality_engine::{run, Config, Dataset, EngineError, GoalsOverride, Input, MonthKey, Period, TargetConfig};

fn fixture_dataset() -> Dataset {
  let json = r#"{
    "historico": [{"note": "legacy data, not a month"}],
    "2025-10": {
      "Policy": {
        "sprint1": {
          "name": "Release 1.0",
          "codeCoverage": {"lines": 70, "classes": 60, "methods": 55, "branches": 45},
          "passRate": 88,
          "nonProdBugs": {"low": 3, "medium": 2, "high": 1},
          "userStories": 4, "testCases": 9,
          "leadTimeTests": 3, "leadTimeBugs": 2.5,
          "automatedTests": {"scenarios": 0, "manualMinutes": 0, "automatedMinutes": 0},
          "reworkNonProdBugs": 1, "reworkProdBugs": 0
        },
        "sprint2": {
          "name": "Release 1.1",
          "codeCoverage": {"lines": 72, "classes": 62, "methods": 57, "branches": 47},
          "passRate": 90,
          "nonProdBugs": {"low": 2, "medium": 1, "high": 0},
          "userStories": 3, "testCases": 6,
          "leadTimeTests": 2, "leadTimeBugs": 2,
          "reworkNonProdBugs": 2, "reworkProdBugs": 1
        },
        "productionBugs": {"low": 1, "medium": 1, "high": 0},
        "qaCost": 20000
      },
      "Claims": {
        "sprint1": {"passRate": 75, "userStories": 2, "testCases": 2},
        "sprint2": {"passRate": 80},
        "qaCost": 0
      }
    },
    "2025-11": {
      "Policy": {
        "sprint1": {
          "name": "Release 1.2",
          "codeCoverage": {"lines": 80, "classes": 70, "methods": 65, "branches": 55},
          "passRate": 96,
          "nonProdBugs": {"low": 2, "medium": 1, "high": 0},
          "userStories": 4, "testCases": 12,
          "leadTimeTests": 2, "leadTimeBugs": 1.5,
          "automatedTests": {"scenarios": 6, "manualMinutes": 600, "automatedMinutes": 60},
          "reworkNonProdBugs": 0, "reworkProdBugs": 0,
          "efficiency": {"writing": 20, "execution": 10, "reexecution": 5}
        },
        "sprint2": {
          "name": "Release 1.3",
          "codeCoverage": {"lines": 82, "classes": 72, "methods": 67, "branches": 57},
          "passRate": 98,
          "nonProdBugs": {"low": 1, "medium": 0, "high": 0},
          "userStories": 3, "testCases": 9,
          "leadTimeTests": 0, "leadTimeBugs": 1,
          "automatedTests": {"scenarios": 4, "manualMinutes": 300, "automatedMinutes": 30},
          "unknownField": "ignored"
        },
        "productionBugs": {"low": 0, "medium": 0, "high": 0},
        "qaCost": 15000
      },
      "Claims": {
        "sprint1": {"passRate": "", "userStories": 1, "testCases": 3,
                    "automatedTests": {"scenarios": 2, "manualMinutes": 120, "automatedMinutes": 20}},
        "sprint2": {"passRate": 97},
        "qaCost": 0
      },
      "Broken": 42
    }
  }"#;
  Dataset::from_json_str(json).unwrap()
}

fn month(s: &str) -> MonthKey {
  MonthKey::parse(s).unwrap()
}

#[test]
fn report_has_expected_shape() {
  let ds = fixture_dataset();
  let report = Engine::with_defaults().report(&ds, None, None).unwrap();

  assert_eq!(report.month, month("2025-11"));
  assert_eq!(report.previous_month, Some(month("2025-10")));
  assert_eq!(report.team, "Policy");
  assert!(report.report_id.starts_with("rpt-"));
  assert_eq!(report.action_plan_key, "actionPlan-2025-11-Policy");

  // Ten trend rows, one per metric.
  assert_eq!(report.trend.len(), TrendMetric::ALL.len());
  assert_eq!(report.cards.len(), 4);

  // Both teams of the month in the overview; the non-object entry was skipped.
  let teams: Vec<&str> = report.team_overview.iter().map(|t| t.team.as_str()).collect();
  assert_eq!(teams, vec!["Claims", "Policy"]);

  // Sprint 2 lead time of 0 reads as "not measured".
  assert_eq!(report.derived.lead_time_tests, 2.0);
  assert_eq!(report.derived.non_prod_bugs_total, 4);
  assert_eq!(report.derived.prod_bugs_total, 0);
  assert_eq!(report.derived.test_coverage, 100.0);
  assert_eq!(report.derived.automation.new_scenarios, 10);
  assert_eq!(report.derived.efficiency.writing, 10.0);

  assert_eq!(report.cumulative_scenarios.sprint1, 6);
  assert_eq!(report.cumulative_scenarios.sprint2, 10);

  assert!(report.health.score > 0.0 && report.health.score <= 100.0);
  assert!((report.health_display - report.health.score / 10.0).abs() < 1e-12);
}

#[test]
fn identical_input_gives_identical_json() {
  let ds = fixture_dataset();
  let engine = Engine::with_defaults();
  let a = serde_json::to_string(&engine.report(&ds, Some("2025-11"), Some("Policy")).unwrap()).unwrap();
  let b = serde_json::to_string(&engine.report(&fixture_dataset(), Some("2025-11"), Some("Policy")).unwrap()).unwrap();
  assert_eq!(a, b);
}

#[test]
fn report_id_changes_with_data() {
  let ds = fixture_dataset();
  let engine = Engine::with_defaults();
  let nov = engine.report(&ds, Some("2025-11"), Some("Policy")).unwrap();
  let oct = engine.report(&ds, Some("2025-10"), Some("Policy")).unwrap();
  assert_ne!(nov.report_id, oct.report_id);
}

#[test]
fn missing_team_month_is_no_data() {
  let ds = fixture_dataset();
  let err = Engine::with_defaults()
    .report(&ds, Some("2025-09"), Some("Policy"))
    .unwrap_err();
  assert!(matches!(err, EngineError::NoData { .. }));
  assert_eq!(err.to_string(), "no data for team Policy in 2025-09");
}

#[test]
fn zero_cost_with_value_serializes_as_infinity() {
  let ds = fixture_dataset();
  let report = Engine::with_defaults()
    .report(&ds, Some("2025-11"), Some("Claims"))
    .unwrap();
  assert_eq!(report.derived.roi.roi, Roi::Unbounded);
  assert_eq!(report.roi_status, Attainment::Met);

  let json = serde_json::to_value(&report).unwrap();
  assert_eq!(json["derived"]["roi"]["roi"], "infinity");
}

#[test]
fn blank_numeric_field_counts_as_unmeasured() {
  let ds = fixture_dataset();
  let report = Engine::with_defaults()
    .report(&ds, Some("2025-11"), Some("Claims"))
    .unwrap();
  // Sprint 1 pass rate is blank; sprint 2 alone gives the month value.
  assert_eq!(report.derived.pass_rate, 97.0);
}

#[test]
fn trend_from_zero_baseline_reads_plus_one_hundred() {
  let ds = fixture_dataset();
  let report = Engine::with_defaults().report(&ds, None, None).unwrap();
  let scenarios = report
    .trend
    .iter()
    .find(|r| r.metric == TrendMetric::NewAutomatedScenarios)
    .unwrap();
  assert_eq!(scenarios.previous, 0.0);
  assert_eq!(scenarios.current, 10.0);
  assert_eq!(scenarios.percent_change, 100.0);
  assert_eq!(scenarios.direction, Direction::Positive);
  assert_eq!(scenarios.status, Attainment::Met);

  let rework = report.trend.iter().find(|r| r.metric == TrendMetric::Rework).unwrap();
  assert_eq!(rework.previous, 4.0);
  assert_eq!(rework.current, 0.0);
  assert_eq!(rework.direction, Direction::Positive);
}

#[test]
fn trend_table_sorting_toggles() {
  let ds = fixture_dataset();
  let targets = TargetConfig::default();
  let mut table = TrendTable::build(
    ds.team_month(month("2025-11"), "Policy"),
    ds.team_month(month("2025-10"), "Policy"),
    &targets,
  );
  table.select_sort(SortKey::Current);
  assert_eq!(table.sort, Some((SortKey::Current, SortOrder::Asc)));
  let asc: Vec<f64> = table.sorted().iter().map(|r| r.current).collect();
  assert!(asc.windows(2).all(|w| w[0] <= w[1]));

  table.select_sort(SortKey::Current);
  assert_eq!(table.sort, Some((SortKey::Current, SortOrder::Desc)));
  let desc: Vec<f64> = table.sorted().iter().map(|r| r.current).collect();
  assert!(desc.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn goals_override_moves_targets_and_missed_metrics() {
  let ds = fixture_dataset();
  let goals: GoalsOverride = serde_json::from_str(r#"{"passRate": 99, "codeCoverage": {"lines": 90}}"#).unwrap();
  let engine = Engine::new(Config::with_goals(Some(&goals)));
  let report = engine.report(&ds, Some("2025-11"), Some("Policy")).unwrap();

  let labels: Vec<&str> = report.missed_metrics.iter().map(|m| m.label.as_str()).collect();
  assert!(labels.contains(&"Pass rate"));
  assert!(labels.contains(&"Code coverage - Lines"));

  let baseline = Engine::with_defaults().report(&ds, Some("2025-11"), Some("Policy")).unwrap();
  assert!(baseline.missed_metrics.is_empty(), "{:?}", baseline.missed_metrics);
}

#[test]
fn run_reads_request_contract() {
  let raw = r#"{
    "dataset": {
      "2025-11": {"Policy": {"sprint1": {"passRate": 91}, "qaCost": 100}}
    },
    "month": "2025-11",
    "rate_card": {"hourlyRate": 0},
    "extra": "ignored"
  }"#;
  let input: Input = serde_json::from_str(raw).unwrap();
  let report = run(&input).unwrap();
  assert_eq!(report.derived.pass_rate, 91.0);
  assert_eq!(report.derived.roi.gains, 0.0);
  // Nothing gained against a cost of 100.
  assert_eq!(report.derived.roi.roi, Roi::Finite(-100.0));
}

#[test]
fn available_months_and_clone() {
  let mut ds = fixture_dataset();
  assert_eq!(ds.available_months("Policy", Period::Last(1)), vec![month("2025-11")]);

  let next = ds.clone_latest_month().unwrap();
  assert_eq!(next, month("2025-12"));
  let copy = ds.team_month(next, "Policy").unwrap();
  assert_eq!(
    copy.sprint1.as_ref().and_then(|s| s.name.as_deref()),
    Some("Sprint December 01")
  );

  // The clone is a full month and reports like any other.
  let report = Engine::with_defaults().report(&ds, None, None).unwrap();
  assert_eq!(report.month, next);
  assert_eq!(report.trend.iter().filter(|r| r.difference != 0.0).count(), 0);
}

/// One team-month in the dashboard's own file format (Portuguese keys).
const DASHBOARD_EXCERPT: &str = r#"{
  "metas": {
    "coberturaCodigo": {"geral": 40},
    "coberturaTestesPercentual": 100,
    "leadTimeTestes": 5,
    "bugsNaoProdutivos": {"total": 10},
    "bugsProducao": {"total": 2},
    "healthScore": 8,
    "automacao": {"cenariosNovos": 20}
  },
  "2025-11": {
    "Policy": {
      "sprint1": {
        "nome": "Sprint Novembro 01",
        "coberturaCodigo": {"linhas": 56, "classes": 36, "metodos": 34, "branches": 29},
        "passRate": 100,
        "bugsNaoProdutivos": {"baixa": 4, "media": 0, "alta": 0},
        "usSprint": 2,
        "casosTestePorUs": 8,
        "leadTimeTestes": 4,
        "testesAutomatizados": {"cenarios": 22, "tempoManual": 360, "tempoAutom": 25},
        "ctEscritos": 8,
        "ctExecutados": 54
      },
      "sprint2": {
        "nome": "Sprint Novembro 02",
        "coberturaCodigo": {"linhas": 54, "classes": 55, "metodos": 53, "branches": 18},
        "passRate": 100,
        "bugsNaoProdutivos": {"baixa": 4, "media": 0, "alta": 0},
        "usSprint": 5,
        "casosTestePorUs": 32,
        "leadTimeTestes": 4,
        "testesAutomatizados": {"cenarios": 0, "tempoManual": 0, "tempoAutom": 0}
      },
      "bugsProducao": {"baixa": 0, "media": 0, "alta": 0},
      "qaValor": 0
    }
  }
}"#;

#[test]
fn dashboard_file_format_reports() {
  let raw = format!(r#"{{"dataset": {}, "month": "2025-11", "team": "Policy"}}"#, DASHBOARD_EXCERPT);
  let input: Input = serde_json::from_str(&raw).unwrap();
  let report = run(&input).unwrap();
  let d = &report.derived;

  assert_eq!(d.code_coverage, 41.875);
  assert_eq!(d.pass_rate, 100.0);
  assert_eq!(d.non_prod_bugs_total, 8);
  assert_eq!(d.prod_bugs_total, 0);
  assert_eq!(d.test_coverage, 100.0);
  assert_eq!(d.lead_time_tests, 4.0);
  assert_eq!(d.automation.new_scenarios, 22);
  assert_eq!(d.test_cases.user_stories, 7);
  assert_eq!(d.test_cases.test_cases, 40);
  assert_eq!(d.test_cases.written, 8);
  assert_eq!(d.test_cases.executed, 54);
  assert_eq!(d.roi.cost, 0.0);

  // `metas` lowers the coverage goal to 40, so 41.9 is met.
  let coverage = report.cards.iter().find(|c| c.metric == "code_coverage").unwrap();
  assert_eq!(coverage.target, 40.0);
  assert_eq!(coverage.status, Attainment::Met);
  let ds = Dataset::from_json_str(DASHBOARD_EXCERPT).unwrap();
  let sprint = ds.team_month(month("2025-11"), "Policy").unwrap().sprint1.as_ref().unwrap();
  assert_eq!(sprint.name.as_deref(), Some("Sprint Novembro 01"));
}

#[test]
fn trend_uses_the_teams_own_previous_month() {
  let ds = Dataset::from_json_str(
    r#"{
      "2025-09": {"Policy": {"sprint1": {"passRate": 80}}},
      "2025-10": {"Claims": {"sprint1": {"passRate": 70}}},
      "2025-11": {
        "Policy": {"sprint1": {"passRate": 88}},
        "Claims": {"sprint1": {"passRate": 77}}
      },
      "2025-12": {"Claims": {"sprint1": {"passRate": 60}}}
    }"#,
  )
  .unwrap();
  let engine = Engine::with_defaults();

  let policy = engine.report(&ds, Some("2025-11"), Some("Policy")).unwrap();
  assert_eq!(policy.previous_month, Some(month("2025-09")));
  let pass = policy.trend.iter().find(|r| r.metric == TrendMetric::PassRate).unwrap();
  assert_eq!(pass.previous, 80.0);
  assert_eq!(pass.current, 88.0);
  assert!((pass.percent_change - 10.0).abs() < 1e-9);

  let claims = engine.report(&ds, Some("2025-11"), Some("Claims")).unwrap();
  assert_eq!(claims.previous_month, Some(month("2025-10")));

  // First month on record for Claims: no comparison at all.
  let first = engine.report(&ds, Some("2025-10"), Some("Claims")).unwrap();
  assert_eq!(first.previous_month, None);
  assert!(first.trend.is_empty());
}

#[test]
fn counts_at_the_integer_limit_do_not_overflow() {
  let ds = Dataset::from_json_str(
    r#"{
      "2025-11": {
        "Policy": {
          "sprint1": {"passRate": 90, "nonProdBugs": {"low": 4294967295, "medium": 1}, "reworkProdBugs": 4294967295, "reworkNonProdBugs": 3},
          "sprint2": {"passRate": 90, "nonProdBugs": {"low": 4294967295}},
          "productionBugs": {"low": 4294967295, "high": 2},
          "qaCost": 100
        }
      }
    }"#,
  )
  .unwrap();
  let report = Engine::with_defaults().report(&ds, None, None).unwrap();
  assert_eq!(report.derived.non_prod_bugs_total, u32::MAX);
  assert_eq!(report.derived.non_prod_bugs.low, Some(u32::MAX));
  assert_eq!(report.derived.prod_bugs_total, u32::MAX);
  assert_eq!(report.derived.rework.total(), u32::MAX);
  let bugs = report.cards.iter().find(|c| c.metric == "total_bugs").unwrap();
  assert_eq!(bugs.value, u32::MAX as f64);
  assert_eq!(bugs.status, Attainment::Missed);
}

#[test]
fn raw_clone_keeps_fields_the_engine_ignores() {
  let mut doc: serde_json::Value = serde_json::from_str(DASHBOARD_EXCERPT).unwrap();
  doc["2025-11"]["Policy"]["sprint1"]["listaUserStories"] = serde_json::json!([{"id": "US-1", "cts": 6}]);
  doc["historico"] = serde_json::json!({"2024": {"Policy": 12}});

  let next = clone_latest_month_value(&mut doc).unwrap();
  assert_eq!(next, month("2025-12"));

  // Untouched parts survive as written.
  assert_eq!(doc["metas"]["automacao"]["cenariosNovos"], 20);
  assert_eq!(doc["historico"]["2024"]["Policy"], 12);
  assert_eq!(doc["2025-11"]["Policy"]["sprint1"]["nome"], "Sprint Novembro 01");

  let copy = &doc["2025-12"]["Policy"];
  assert_eq!(copy["sprint1"]["nome"], "Sprint December 01");
  assert_eq!(copy["sprint2"]["nome"], "Sprint December 02");
  assert_eq!(copy["sprint1"]["listaUserStories"][0]["id"], "US-1");
  assert_eq!(copy["sprint1"]["coberturaCodigo"]["metodos"], 34);
  assert!(copy["sprint1"].get("name").is_none());

  // The cloned file still reads and reports like the month it came from.
  let ds = Dataset::from_value(doc).unwrap();
  let cloned = Engine::with_defaults().report(&ds, Some("2025-12"), Some("Policy")).unwrap();
  assert_eq!(cloned.previous_month, Some(month("2025-11")));
  assert_eq!(cloned.derived.code_coverage, 41.875);
  assert!(cloned.trend.iter().all(|r| r.difference == 0.0));
}
