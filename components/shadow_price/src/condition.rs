//! The five experimental inlining policies

use crate::error::ShadowPriceError;
use crate::rng::Xorshift32;
use crate::threshold::ThresholdParams;
use std::fmt;
use std::str::FromStr;

/// Policy deciding which call sites become inline candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Never promote
    NoInline,
    /// Promote every eligible site
    InlineAll,
    /// Promote with probability one half
    Random,
    /// Promote when the callee is smaller than its price-derived threshold
    ShadowPrice,
    /// Shadow-price with the price inverted; the control condition
    InvertedPrice,
}

/// Outcome of applying a condition to one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the site should be promoted
    pub promote: bool,
    /// Size threshold used, for price-driven conditions
    pub threshold: Option<u32>,
}

impl Condition {
    /// All conditions in reporting order
    pub const ALL: [Condition; 5] = [
        Condition::NoInline,
        Condition::InlineAll,
        Condition::Random,
        Condition::ShadowPrice,
        Condition::InvertedPrice,
    ];

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Condition::NoInline => "No inlining",
            Condition::InlineAll => "Blind inline-all",
            Condition::Random => "Random 50%",
            Condition::ShadowPrice => "Shadow-price (NUM)",
            Condition::InvertedPrice => "Inverted-price (control)",
        }
    }

    /// Short name used on the command line and in logs
    pub fn slug(self) -> &'static str {
        match self {
            Condition::NoInline => "none",
            Condition::InlineAll => "all",
            Condition::Random => "random",
            Condition::ShadowPrice => "shadow",
            Condition::InvertedPrice => "inverted",
        }
    }

    /// Decide one call site
    ///
    /// Only [`Condition::Random`] advances `rng`.
    pub fn decide(self, body_size: usize, price: f64, params: &ThresholdParams, rng: &mut Xorshift32) -> Verdict {
        match self {
            Condition::NoInline => Verdict {
                promote: false,
                threshold: None,
            },
            Condition::InlineAll => Verdict {
                promote: true,
                threshold: None,
            },
            Condition::Random => Verdict {
                promote: rng.next_bool(),
                threshold: None,
            },
            Condition::ShadowPrice | Condition::InvertedPrice => {
                let threshold = params.threshold(price, self == Condition::InvertedPrice);
                Verdict {
                    promote: body_size < threshold as usize,
                    threshold: Some(threshold),
                }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Condition {
    type Err = ShadowPriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Condition::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ShadowPriceError::UnknownCondition(s.to_string()))
    }
}
