//! Full Pipeline Integration Tests
//!
//! Tests the complete flow: IR text -> profile -> decision pass -> linker ->
//! Cranelift -> native call.

use experiment::benchmark::{self, ENTRY};
use integration_tests::run_pipeline;
use shadow_price::{Condition, DecisionOutcome, MemorySink, NullSink, ProfileStore, DEFAULT_SEED};

const MUTUAL: &str = "\
module cycle
func is_even(n)
  local r
  beq yes, n, 0
  sub n, n, 1
  call r, is_odd, n
  ret r
yes:
  ret 1
endfunc
func is_odd(n)
  local r
  beq no, n, 0
  sub n, n, 1
  call r, is_even, n
  ret r
no:
  ret 0
endfunc
func main(n) export
  local r
  call r, is_even, n
  ret r
endfunc
endmodule
";

/// Test: every condition computes the same driver result
#[test]
fn test_benchmark_result_independent_of_condition() {
    let profile = benchmark::synthetic_profile();
    let expected = benchmark::expected_result(3_000);

    for condition in Condition::ALL {
        let run = run_pipeline(
            &benchmark::source(),
            condition,
            &profile,
            DEFAULT_SEED,
            &mut NullSink,
            ENTRY,
            &[3_000],
        )
        .unwrap();
        assert_eq!(run.result, expected, "{}", condition);
    }
}

/// Test: shadow and inverted pricing promote disjoint sets of callees
#[test]
fn test_inverted_control_flips_hot_and_cold() {
    let profile = benchmark::synthetic_profile();
    let source = benchmark::source();

    let mut shadow = MemorySink::new();
    run_pipeline(&source, Condition::ShadowPrice, &profile, DEFAULT_SEED, &mut shadow, ENTRY, &[10]).unwrap();
    let mut inverted = MemorySink::new();
    run_pipeline(&source, Condition::InvertedPrice, &profile, DEFAULT_SEED, &mut inverted, ENTRY, &[10]).unwrap();

    assert_eq!(shadow.promoted(), vec!["f_hot1", "f_hot2", "f_hot3", "f_hot4"]);
    assert_eq!(inverted.promoted(), vec!["f_warm1", "f_warm2", "f_cold1", "f_cold2"]);
}

/// Test: shadow pricing drives the linker into its growth budget
#[test]
fn test_shadow_price_link_stats() {
    let profile = benchmark::synthetic_profile();
    let run = run_pipeline(
        &benchmark::source(),
        Condition::ShadowPrice,
        &profile,
        DEFAULT_SEED,
        &mut NullSink,
        ENTRY,
        &[10],
    )
    .unwrap();

    assert_eq!(run.pass.promotions, 4);
    assert_eq!(run.link.inlined_candidates, 3);
    assert_eq!(run.link.declined_budget, 1);
}

/// Test: an empty profile prices every callee at zero
#[test]
fn test_empty_profile() {
    let profile = ProfileStore::new();
    let source = benchmark::source();

    let shadow = run_pipeline(&source, Condition::ShadowPrice, &profile, DEFAULT_SEED, &mut NullSink, ENTRY, &[10]).unwrap();
    assert_eq!(shadow.pass.promotions, 0);

    let inverted =
        run_pipeline(&source, Condition::InvertedPrice, &profile, DEFAULT_SEED, &mut NullSink, ENTRY, &[10]).unwrap();
    assert_eq!(inverted.pass.promotions, 8);
    assert_eq!(inverted.result, benchmark::expected_result(10));
}

/// Test: mutual recursion terminates and still computes correctly
#[test]
fn test_mutual_recursion_under_every_condition() {
    let mut profile = ProfileStore::new();
    profile.record_n("is_even", 10);
    profile.record_n("is_odd", 10);
    profile.normalize();

    for condition in Condition::ALL {
        for (n, expected) in [(0, 1), (7, 0), (10, 1)] {
            let run = run_pipeline(MUTUAL, condition, &profile, DEFAULT_SEED, &mut NullSink, "main", &[n]).unwrap();
            assert_eq!(run.result, expected, "{} main({})", condition, n);
        }
    }
}

/// Test: the cycle guard stops the second visit to a callee
#[test]
fn test_mutual_recursion_chained_site() {
    let profile = ProfileStore::new();
    let mut sink = MemorySink::new();
    let run = run_pipeline(MUTUAL, Condition::InlineAll, &profile, DEFAULT_SEED, &mut sink, "main", &[4]).unwrap();

    assert_eq!(run.pass.promotions, 2);
    assert_eq!(run.pass.chained, 1);
    let outcomes: Vec<DecisionOutcome> = sink.records().iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![DecisionOutcome::Promoted, DecisionOutcome::Promoted, DecisionOutcome::Chained]
    );
    assert_eq!(run.result, 1);
}

/// Test: calls to functions outside the module are logged as unresolved
#[test]
fn test_unresolved_callee_recorded() {
    let source = "\
module host
func main(n) export
  local r
  call r, missing, n
  ret r
endfunc
endmodule
";
    let mut ctx = jit_compiler::CompilationContext::from_source(source).unwrap();
    let mut sink = MemorySink::new();
    let pass = shadow_price::DecisionPass::new(Condition::InlineAll).run(
        ctx.module_mut(),
        &ProfileStore::new(),
        DEFAULT_SEED,
        &mut sink,
    );

    assert_eq!(pass.unresolved, 1);
    assert_eq!(pass.promotions, 0);
    assert_eq!(sink.records()[0].outcome, DecisionOutcome::Unresolved);
    assert_eq!(sink.records()[0].body_size, None);
    // Nothing provides `missing`, so code generation fails.
    assert!(ctx.compile().is_err());
}
