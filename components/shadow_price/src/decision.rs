//! Inlining decision pass
//!
//! Walks every plain call in a compilation unit and, depending on the active
//! [`Condition`], rewrites it into an inline candidate. The pass only marks
//! candidates; the compiler's own inliner still applies its size and growth
//! limits afterwards and may decline any of them.
//!
//! A per-pass [`InlineChain`] records every promoted callee. A callee is
//! promoted at most once per pass, which keeps recursive and mutually
//! recursive call graphs from being promoted repeatedly.

use crate::condition::Condition;
use crate::profile::ProfileStore;
use crate::rng::Xorshift32;
use crate::sink::{DecisionOutcome, DecisionRecord, DecisionSink, NullSink};
use crate::threshold::ThresholdParams;
use crate::unit::CompilationUnit;
use tracing::{debug, trace};

/// Maximum number of callees promoted in one pass
pub const MAX_INLINE_CHAIN: usize = 64;

/// Callee names promoted so far in the current pass
#[derive(Debug, Clone)]
pub struct InlineChain {
    names: Vec<String>,
    capacity: usize,
}

impl InlineChain {
    /// Create an empty chain holding at most `capacity` names
    pub fn new(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity.min(MAX_INLINE_CHAIN)),
            capacity,
        }
    }

    /// Whether `name` was promoted in this pass
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Append a name; false if the chain is full
    pub fn push(&mut self, name: &str) -> bool {
        if self.is_full() {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Whether no more names fit
    pub fn is_full(&self) -> bool {
        self.names.len() >= self.capacity
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing was promoted yet
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in promotion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for InlineChain {
    fn default() -> Self {
        Self::new(MAX_INLINE_CHAIN)
    }
}

/// Counters from one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Call sites rewritten to inline candidates
    pub promotions: usize,
    /// Plain call sites visited
    pub considered: usize,
    /// Sites whose callee is not defined in the unit
    pub unresolved: usize,
    /// Sites skipped because the callee was already promoted
    pub chained: usize,
    /// Promotions refused because the chain was full
    pub chain_full: usize,
}

/// Configured decision pass
#[derive(Debug, Clone)]
pub struct DecisionPass {
    condition: Condition,
    params: ThresholdParams,
    chain_depth: usize,
}

impl DecisionPass {
    /// Create a pass for `condition` with default threshold constants
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            params: ThresholdParams::default(),
            chain_depth: MAX_INLINE_CHAIN,
        }
    }

    /// Override the threshold constants
    pub fn with_params(mut self, params: ThresholdParams) -> Self {
        self.params = params;
        self
    }

    /// Override the inline chain capacity
    pub fn with_chain_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    /// Active condition
    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Threshold constants
    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    /// Run the pass over `unit`
    ///
    /// The Random condition's generator is seeded from `seed` at the start
    /// of every run, so equal seeds give equal decisions.
    pub fn run<U: CompilationUnit + ?Sized>(
        &self,
        unit: &mut U,
        profile: &ProfileStore,
        seed: u32,
        sink: &mut dyn DecisionSink,
    ) -> PassOutcome {
        let mut rng = Xorshift32::new(seed);
        let mut chain = InlineChain::new(self.chain_depth);
        let mut outcome = PassOutcome::default();

        for site in unit.call_sites() {
            if site.is_candidate {
                continue;
            }
            outcome.considered += 1;

            let price = profile.lookup(&site.callee);
            let mut record = DecisionRecord {
                condition: self.condition,
                caller: site.caller,
                callee: site.callee,
                body_size: None,
                price,
                threshold: None,
                outcome: DecisionOutcome::Unresolved,
            };

            let Some(body_size) = unit.body_size(&record.callee) else {
                outcome.unresolved += 1;
                trace!(caller = %record.caller, callee = %record.callee, "unresolved callee skipped");
                sink.record(&record);
                continue;
            };
            record.body_size = Some(body_size);

            if chain.contains(&record.callee) {
                outcome.chained += 1;
                record.outcome = DecisionOutcome::Chained;
                trace!(caller = %record.caller, callee = %record.callee, "callee already promoted this pass");
                sink.record(&record);
                continue;
            }

            let verdict = self.condition.decide(body_size, price, &self.params, &mut rng);
            record.threshold = verdict.threshold;

            record.outcome = if !verdict.promote {
                DecisionOutcome::Declined
            } else if chain.is_full() {
                outcome.chain_full += 1;
                DecisionOutcome::ChainFull
            } else if unit.promote(site.location) {
                chain.push(&record.callee);
                outcome.promotions += 1;
                DecisionOutcome::Promoted
            } else {
                DecisionOutcome::Declined
            };

            trace!(
                caller = %record.caller,
                callee = %record.callee,
                size = body_size,
                price,
                threshold = ?record.threshold,
                outcome = record.outcome.as_str(),
                "call site decided"
            );
            sink.record(&record);
        }

        debug!(
            condition = self.condition.slug(),
            promotions = outcome.promotions,
            considered = outcome.considered,
            unresolved = outcome.unresolved,
            chained = outcome.chained,
            "decision pass complete"
        );
        outcome
    }
}

/// Run the decision pass for `condition` and return the number of promotions
pub fn mutate<U: CompilationUnit + ?Sized>(
    unit: &mut U,
    condition: Condition,
    profile: &ProfileStore,
    seed: u32,
) -> usize {
    DecisionPass::new(condition)
        .run(unit, profile, seed, &mut NullSink)
        .promotions
}
