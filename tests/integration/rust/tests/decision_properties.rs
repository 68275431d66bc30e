//! Decision pass properties checked against the benchmark module

use experiment::benchmark::{self, ENTRY};
use integration_tests::run_pipeline;
use shadow_price::{mutate, Condition, DecisionOutcome, MemorySink};
use std::collections::HashSet;

/// Test: no callee is promoted twice in one pass, for any seed
#[test]
fn test_random_promotes_each_callee_at_most_once() {
    let source = benchmark::source();
    let profile = benchmark::synthetic_profile();

    for seed in 0..32 {
        let mut sink = MemorySink::new();
        let run = run_pipeline(&source, Condition::Random, &profile, seed, &mut sink, ENTRY, &[50]).unwrap();

        let promoted = sink.promoted();
        let unique: HashSet<&str> = promoted.iter().copied().collect();
        assert_eq!(unique.len(), promoted.len(), "seed {}", seed);
        assert_eq!(run.pass.promotions, promoted.len());
        assert_eq!(run.result, benchmark::expected_result(50), "seed {}", seed);
    }
}

/// Test: the same seed gives the same decisions
#[test]
fn test_random_reproducible() {
    let profile = benchmark::synthetic_profile();
    let decide = |seed: u32| {
        let mut module = jit_compiler::parse_module(&benchmark::source()).unwrap();
        let mut sink = MemorySink::new();
        shadow_price::DecisionPass::new(Condition::Random).run(&mut module, &profile, seed, &mut sink);
        sink.into_records()
            .into_iter()
            .map(|r| r.outcome == DecisionOutcome::Promoted)
            .collect::<Vec<_>>()
    };

    assert_eq!(decide(7), decide(7));
    assert_eq!(decide(7).len(), 8);
}

/// Test: `mutate` agrees with the full pass
#[test]
fn test_mutate_counts_promotions() {
    let profile = benchmark::synthetic_profile();
    let expected = [
        (Condition::NoInline, 0),
        (Condition::InlineAll, 8),
        (Condition::ShadowPrice, 4),
        (Condition::InvertedPrice, 4),
    ];
    for (condition, promotions) in expected {
        let mut module = jit_compiler::parse_module(&benchmark::source()).unwrap();
        assert_eq!(mutate(&mut module, condition, &profile, 42), promotions, "{}", condition);
    }
}
