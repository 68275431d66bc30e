//! The growth-budget stress benchmark
//!
//! Eight two-argument callees `(flag, x)` of fixed instruction counts, and a
//! `driver(n)` loop calling them at three frequencies. Every callee has a
//! light path (taken when `flag == 1`, which the driver always passes) and
//! a heavy arithmetic path that only contributes to its size.
//!
//! The hot callees sit between the plain-call and inline-candidate limits,
//! so they are inlined only when promoted, and inlining all four exhausts
//! the driver's growth budget.

use jit_compiler::linker::{CALL_INLINE_THRESHOLD, INLINE_THRESHOLD};
use shadow_price::ProfileStore;
use std::fmt::Write;

/// Name of the timed entry point
pub const ENTRY: &str = "driver";

/// How often the driver calls a callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Every iteration
    Hot,
    /// Every 10th iteration
    Warm,
    /// Every 1000th iteration
    Cold,
}

impl Tier {
    /// Iterations between calls
    pub fn period(self) -> i64 {
        match self {
            Tier::Hot => 1,
            Tier::Warm => 10,
            Tier::Cold => 1000,
        }
    }

    /// Observations recorded for the synthetic profile
    pub fn observations(self) -> u64 {
        match self {
            Tier::Hot => 1000,
            Tier::Warm => 100,
            Tier::Cold => 1,
        }
    }
}

/// One benchmark callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Callee {
    /// Function name
    pub name: &'static str,
    /// Instruction count, labels included
    pub size: usize,
    /// Call frequency
    pub tier: Tier,
}

/// The callees in definition and call order
pub const CALLEES: [Callee; 8] = [
    Callee { name: "f_hot1", size: 55, tier: Tier::Hot },
    Callee { name: "f_hot2", size: 75, tier: Tier::Hot },
    Callee { name: "f_hot3", size: 100, tier: Tier::Hot },
    Callee { name: "f_hot4", size: 60, tier: Tier::Hot },
    Callee { name: "f_warm1", size: 80, tier: Tier::Warm },
    Callee { name: "f_warm2", size: 120, tier: Tier::Warm },
    Callee { name: "f_cold1", size: 150, tier: Tier::Cold },
    Callee { name: "f_cold2", size: 180, tier: Tier::Cold },
];

/// Instructions outside the heavy arithmetic block
const CALLEE_OVERHEAD: usize = 5;

/// Arithmetic block cycled through by the heavy path
const HEAVY_PATTERN: [&str; 16] = [
    "add t1, x, 1",
    "add t2, t1, 2",
    "mul t3, t2, 3",
    "add t4, t3, t1",
    "sub t1, t4, t2",
    "add t2, t1, t3",
    "mul t3, t2, 2",
    "add t4, t3, t1",
    "sub t1, t4, 5",
    "add t2, t1, t4",
    "mul t3, t2, 3",
    "sub t4, t3, t1",
    "add t1, t4, t2",
    "mul t2, t1, 2",
    "add t3, t2, t4",
    "sub t4, t3, 5",
];

/// Where a function's size puts it relative to the linker's limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Inlined even as a plain call
    AutoInlined,
    /// Inlined only as a candidate
    SweetSpot,
    /// Never inlined
    TooLarge,
}

impl SizeClass {
    /// Classify an instruction count
    pub fn of(size: usize) -> Self {
        if size <= CALL_INLINE_THRESHOLD {
            SizeClass::AutoInlined
        } else if size <= INLINE_THRESHOLD {
            SizeClass::SweetSpot
        } else {
            SizeClass::TooLarge
        }
    }

    /// Short description for reports
    pub fn describe(self) -> String {
        match self {
            SizeClass::AutoInlined => "[AUTO-INLINED by plain-call threshold]".to_string(),
            SizeClass::SweetSpot => format!(
                "[IN SWEET SPOT: {} < n <= {}]",
                CALL_INLINE_THRESHOLD, INLINE_THRESHOLD
            ),
            SizeClass::TooLarge => "[TOO LARGE for any inlining]".to_string(),
        }
    }
}

/// IR text of the benchmark module
pub fn source() -> String {
    let mut src = String::from("module bench\n");

    for callee in &CALLEES {
        write_callee(&mut src, callee);
    }

    src.push_str("func driver(n) export\n");
    src.push_str("  local i, sum, tmp, m\n");
    src.push_str("  mov i, 0\n");
    src.push_str("  mov sum, 0\n");
    src.push_str("loop:\n");
    src.push_str("  bge done, i, n\n");
    write_tier_calls(&mut src, Tier::Hot, "");
    write_tier_calls(&mut src, Tier::Warm, "skip_warm");
    write_tier_calls(&mut src, Tier::Cold, "skip_cold");
    src.push_str("  add i, i, 1\n");
    src.push_str("  jmp loop\n");
    src.push_str("done:\n");
    src.push_str("  ret sum\n");
    src.push_str("endfunc\n");
    src.push_str("endmodule\n");
    src
}

fn write_callee(src: &mut String, callee: &Callee) {
    let heavy = callee.size - CALLEE_OVERHEAD;
    let _ = writeln!(src, "func {}(flag, x)", callee.name);
    src.push_str("  local t1, t2, t3, t4\n");
    src.push_str("  bne heavy, flag, 1\n");
    src.push_str("  add t1, x, 1\n");
    src.push_str("  ret t1\n");
    src.push_str("heavy:\n");
    for line in HEAVY_PATTERN.iter().cycle().take(heavy) {
        let _ = writeln!(src, "  {}", line);
    }
    src.push_str("  ret t4\n");
    src.push_str("endfunc\n");
}

fn write_tier_calls(src: &mut String, tier: Tier, skip_label: &str) {
    if tier != Tier::Hot {
        let _ = writeln!(src, "  mod m, i, {}", tier.period());
        let _ = writeln!(src, "  bne {}, m, 0", skip_label);
    }
    let mut first = tier == Tier::Hot;
    for callee in CALLEES.iter().filter(|c| c.tier == tier) {
        if first {
            let _ = writeln!(src, "  call sum, {}, 1, sum", callee.name);
            first = false;
        } else {
            let _ = writeln!(src, "  call tmp, {}, 1, sum", callee.name);
            src.push_str("  add sum, sum, tmp\n");
        }
    }
    if tier != Tier::Hot {
        let _ = writeln!(src, "{}:", skip_label);
    }
}

/// Profile built from the benchmark's known call frequencies
pub fn synthetic_profile() -> ProfileStore {
    let mut profile = ProfileStore::new();
    record_synthetic(&mut profile);
    profile
}

/// Seed `profile` with the known call frequencies and normalize it
pub fn record_synthetic(profile: &mut ProfileStore) {
    for callee in &CALLEES {
        profile.record_n(callee.name, callee.tier.observations());
    }
    profile.normalize();
}

/// What `driver(n)` returns, computed on the host
pub fn expected_result(n: i64) -> i64 {
    // Light path of every callee: x + 1.
    let light = |x: i64| x.wrapping_add(1);
    let mut sum: i64 = 0;
    for i in 0..n.max(0) {
        let mut first = true;
        for callee in &CALLEES {
            if i % callee.tier.period() != 0 {
                continue;
            }
            if callee.tier == Tier::Hot && first {
                sum = light(sum);
                first = false;
            } else {
                sum = sum.wrapping_add(light(sum));
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use jit_compiler::parse_module;

    #[test]
    fn test_source_parses_with_exact_sizes() {
        let module = parse_module(&source()).unwrap();
        assert_eq!(module.name, "bench");
        for callee in &CALLEES {
            let func = module.function(callee.name).unwrap();
            assert_eq!(func.instruction_count(), callee.size, "{}", callee.name);
            assert_eq!(func.param_count, 2);
        }
        let driver = module.function(ENTRY).unwrap();
        assert!(driver.exported);
        assert_eq!(driver.param_count, 1);
    }

    #[test]
    fn test_hot_callees_in_sweet_spot() {
        for callee in CALLEES.iter().filter(|c| c.tier == Tier::Hot) {
            assert_eq!(SizeClass::of(callee.size), SizeClass::SweetSpot);
        }
        assert_eq!(SizeClass::of(50), SizeClass::AutoInlined);
        assert_eq!(SizeClass::of(201), SizeClass::TooLarge);
    }

    #[test]
    fn test_synthetic_profile_prices() {
        let profile = synthetic_profile();
        assert_eq!(profile.len(), 8);
        assert_eq!(profile.lookup("f_hot3"), 1.0);
        assert_eq!(profile.lookup("f_warm1"), 0.1);
        assert_eq!(profile.lookup("f_cold2"), 0.001);
    }

    #[test]
    fn test_synthetic_profile_in_full_store() {
        let mut profile = ProfileStore::bounded(4);
        record_synthetic(&mut profile);
        // The hot callees fill the store; warm and cold fall back to price 0.
        assert_eq!(profile.len(), 4);
        assert_eq!(profile.dropped(), 2 * 100 + 2);
        assert_eq!(profile.lookup("f_hot1"), 1.0);
        assert_eq!(profile.lookup("f_warm1"), 0.0);
    }

    #[test]
    fn test_expected_result_small_n() {
        assert_eq!(expected_result(0), 0);
        // i = 0 calls everything: hot1 gives 1, then each of the other
        // seven callees doubles sum and adds one.
        let mut sum = 1i64;
        for _ in 0..7 {
            sum = sum + sum + 1;
        }
        assert_eq!(expected_result(1), sum);
    }
}
