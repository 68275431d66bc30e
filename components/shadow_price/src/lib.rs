//! Shadow-price driven inlining decisions
//!
//! This crate provides:
//! - Profile store: call counts per callee, normalized into shadow prices
//! - Threshold: maps a price to a callee size threshold
//! - Conditions: the five experimental inlining policies
//! - Decision pass: promotes plain calls to inline candidates
//!
//! The pass runs between loading a module and linking it. It never inlines
//! anything itself; the compiler's linker makes the final call.
//!
//! # Example
//!
//! ```
//! use jit_compiler::parse_module;
//! use shadow_price::{mutate, threshold, Condition, ProfileStore};
//!
//! let mut module = parse_module("\
//! func hot(x)
//!   add x, x, 1
//!   ret x
//! endfunc
//! func main(n)
//!   call n, hot, n
//!   ret n
//! endfunc
//! ").unwrap();
//!
//! let mut profile = ProfileStore::new();
//! profile.record_n("hot", 1000);
//! profile.normalize();
//!
//! assert_eq!(threshold(profile.lookup("hot"), false), 200);
//! assert_eq!(mutate(&mut module, Condition::ShadowPrice, &profile, 42), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod decision;
pub mod error;
pub mod profile;
pub mod rng;
pub mod sink;
pub mod threshold;
pub mod unit;

// Re-export main types at crate root
pub use condition::{Condition, Verdict};
pub use decision::{mutate, DecisionPass, InlineChain, PassOutcome, MAX_INLINE_CHAIN};
pub use error::ShadowPriceError;
pub use profile::{ProfileEntry, ProfileStore, DEFAULT_BOUNDED_CAPACITY};
pub use rng::{Xorshift32, DEFAULT_SEED};
pub use sink::{CsvSink, DecisionOutcome, DecisionRecord, DecisionSink, MemorySink, NullSink};
pub use threshold::{threshold, ThresholdParams};
pub use unit::{profile_unit, CallSite, CompilationUnit, SiteLocation};
