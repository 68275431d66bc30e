//! End-to-end tests for the experiment harness

use experiment::{benchmark, Experiment, ExperimentConfig, ProfileSource};
use shadow_price::Condition;

fn quick(conditions: Vec<Condition>) -> ExperimentConfig {
    ExperimentConfig {
        runs: 2,
        iterations: 5_000,
        warmup: 10,
        conditions,
        ..ExperimentConfig::default()
    }
}

#[test]
fn all_conditions_agree_on_driver_result() {
    let experiment = Experiment::new(quick(Condition::ALL.to_vec())).unwrap();
    let results = experiment.run(|_, _| {}).unwrap();

    let expected = benchmark::expected_result(5_000);
    for r in &results {
        assert_eq!(r.result, expected, "{}", r.label);
        assert!(r.stable);
        assert_eq!(r.times.len(), 2);
    }
    assert!(experiment.report(results).consistent);
}

#[test]
fn promotion_counts_per_condition() {
    let experiment = Experiment::new(quick(Condition::ALL.to_vec())).unwrap();
    let results = experiment.run(|_, _| {}).unwrap();
    let promotions = |c: Condition| results.iter().find(|r| r.condition == c).unwrap().promotions;

    assert_eq!(promotions(Condition::NoInline), 0);
    assert_eq!(promotions(Condition::InlineAll), 8);
    assert_eq!(promotions(Condition::ShadowPrice), 4);
    // Warm and cold callees have inverted thresholds at the ceiling.
    assert_eq!(promotions(Condition::InvertedPrice), 4);
}

#[test]
fn decision_log_covers_first_run_of_each_condition() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decisions.csv");
    let config = ExperimentConfig {
        decision_log: Some(path.clone()),
        ..quick(vec![Condition::ShadowPrice, Condition::InvertedPrice])
    };

    let experiment = Experiment::new(config).unwrap();
    experiment.run(|_, _| {}).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["condition", "caller", "callee", "body_size", "price", "threshold", "outcome"]
    );

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 16);
    let hot1_shadow = rows
        .iter()
        .find(|r| &r[0] == "shadow" && &r[2] == "f_hot1")
        .unwrap();
    assert_eq!(&hot1_shadow[5], "200");
    assert_eq!(&hot1_shadow[6], "promoted");
    let hot1_inverted = rows
        .iter()
        .find(|r| &r[0] == "inverted" && &r[2] == "f_hot1")
        .unwrap();
    assert_eq!(&hot1_inverted[5], "5");
    assert_eq!(&hot1_inverted[6], "declined");
}

#[test]
fn static_profile_prices_every_callee_equally() {
    let config = ExperimentConfig {
        profile_source: ProfileSource::Static,
        ..quick(vec![Condition::ShadowPrice])
    };
    let experiment = Experiment::new(config).unwrap();
    assert!(experiment.profile().iter().all(|e| e.shadow_price == 1.0));

    // Every callee is under the ceiling, so all eight are promoted.
    let results = experiment.run(|_, _| {}).unwrap();
    assert_eq!(results[0].promotions, 8);
}
