//! Integration test suite for the shadow-price inliner
//!
//! This crate provides integration tests that verify the decision pass,
//! the linker and the code generator work together across component
//! boundaries.

use jit_compiler::{CompilationContext, LinkStats};
use shadow_price::{Condition, DecisionPass, DecisionSink, PassOutcome, ProfileStore};

/// Re-export components for test convenience
pub mod components {
    pub use experiment;
    pub use jit_compiler;
    pub use shadow_price;
}

/// Everything one source/condition pair produced
#[derive(Debug)]
pub struct PipelineRun {
    /// Decision pass outcome
    pub pass: PassOutcome,
    /// Linker statistics
    pub link: LinkStats,
    /// Value returned by `entry(args)`
    pub result: i64,
}

/// Parse, decide, link, compile and call `entry`
pub fn run_pipeline(
    source: &str,
    condition: Condition,
    profile: &ProfileStore,
    seed: u32,
    sink: &mut dyn DecisionSink,
    entry: &str,
    args: &[i64],
) -> Result<PipelineRun, String> {
    let mut ctx = CompilationContext::from_source(source).map_err(|e| format!("parse error: {}", e))?;
    let pass = DecisionPass::new(condition).run(ctx.module_mut(), profile, seed, sink);
    let link = ctx.link();
    let compiled = ctx.compile().map_err(|e| format!("compile error: {}", e))?;
    let result = compiled
        .entry(entry)
        .and_then(|f| f.invoke(args))
        .map_err(|e| format!("execution error: {}", e))?;
    Ok(PipelineRun { pass, link, result })
}
