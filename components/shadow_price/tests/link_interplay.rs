//! Promotions feeding the native linker
//!
//! The decision pass only marks candidates; these tests check what the
//! linker then does with them.

use jit_compiler::{CompilationContext, LinkStats};
use shadow_price::{mutate, Condition, ProfileStore};

fn callee(name: &str, size: usize) -> String {
    let mut s = format!("func {}(x)\n", name);
    for _ in 1..size {
        s.push_str("  add x, x, 1\n");
    }
    s.push_str("  ret x\nendfunc\n");
    s
}

fn source() -> String {
    let mut src = callee("tiny", 10);
    src.push_str(&callee("medium", 120));
    src.push_str(&callee("huge", 250));
    src.push_str(
        "\
func main(n) export
  call n, tiny, n
  call n, medium, n
  call n, huge, n
  ret n
endfunc
",
    );
    src
}

fn profile() -> ProfileStore {
    let mut profile = ProfileStore::new();
    profile.record_n("tiny", 1);
    profile.record_n("medium", 1000);
    profile.record_n("huge", 1000);
    profile.normalize();
    profile
}

fn link(condition: Condition) -> (usize, LinkStats, i64) {
    let mut ctx = CompilationContext::from_source(&source()).unwrap();
    let promotions = mutate(ctx.module_mut(), condition, &profile(), 42);
    let stats = ctx.link();
    let compiled = ctx.compile().unwrap();
    let result = compiled.entry("main").unwrap().invoke(&[0]).unwrap();
    (promotions, stats, result)
}

#[test]
fn no_inline_leaves_only_native_inlining() {
    let (promotions, stats, _) = link(Condition::NoInline);
    assert_eq!(promotions, 0);
    // tiny fits the plain-call limit on its own.
    assert_eq!(stats.inlined, 1);
    assert_eq!(stats.inlined_candidates, 0);
}

#[test]
fn shadow_price_unlocks_hot_medium_callee() {
    let (promotions, stats, _) = link(Condition::ShadowPrice);
    // tiny is cold and over the floor; huge is hot but over the ceiling.
    assert_eq!(promotions, 1);
    assert_eq!(stats.inlined_candidates, 1);
    assert_eq!(stats.inlined, 2);
    assert_eq!(stats.declined_size, 1);
}

#[test]
fn linker_still_declines_oversized_candidates() {
    let (promotions, stats, _) = link(Condition::InlineAll);
    assert_eq!(promotions, 3);
    assert_eq!(stats.inlined_candidates, 2);
    assert_eq!(stats.declined_size, 1);
}

#[test]
fn every_condition_computes_the_same_result() {
    // 9 + 119 + 249 increments
    for condition in Condition::ALL {
        let (_, _, result) = link(condition);
        assert_eq!(result, 377, "{}", condition);
    }
}
