//! Price-to-threshold mapping
//!
//! A callee's shadow price is scaled linearly into a multiplier on the
//! compiler's plain-call inline limit, and the product is clamped to a band
//! whose ceiling is the compiler's inline-candidate limit. Hot callees get a
//! threshold near the ceiling, cold ones near the floor.

use jit_compiler::linker;

/// Base size the scale factor multiplies
pub const CALL_INLINE_THRESHOLD: u32 = linker::CALL_INLINE_THRESHOLD as u32;

/// Lowest threshold ever returned
pub const THRESHOLD_FLOOR: u32 = 5;

/// Highest threshold ever returned
pub const THRESHOLD_CEIL: u32 = linker::INLINE_THRESHOLD as u32;

/// Scale factor at price 0
pub const SCALE_FLOOR: f64 = 0.1;

/// Scale factor at price 1
pub const SCALE_CEIL: f64 = 5.0;

/// Constants of the price-to-threshold mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Base size multiplied by the scale factor
    pub base: u32,
    /// Lower clamp on the result
    pub floor: u32,
    /// Upper clamp on the result
    pub ceil: u32,
    /// Scale factor at price 0
    pub scale_floor: f64,
    /// Scale factor at price 1
    pub scale_ceil: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            base: CALL_INLINE_THRESHOLD,
            floor: THRESHOLD_FLOOR,
            ceil: THRESHOLD_CEIL,
            scale_floor: SCALE_FLOOR,
            scale_ceil: SCALE_CEIL,
        }
    }
}

impl ThresholdParams {
    /// Size threshold for a callee with the given price
    ///
    /// Total over all inputs: NaN prices count as 0 and out-of-range prices
    /// are clamped through the scale band.
    pub fn threshold(&self, price: f64, inverted: bool) -> u32 {
        let mut price = if price.is_nan() { 0.0 } else { price };
        if inverted {
            price = 1.0 - price;
        }

        let scale = self.scale_floor + price * (self.scale_ceil - self.scale_floor);
        let scale = scale.max(self.scale_floor).min(self.scale_ceil);

        let raw = (self.base as f64 * scale).trunc();
        raw.max(self.floor as f64).min(self.ceil as f64) as u32
    }
}

/// Size threshold for a callee with the given price, using default constants
pub fn threshold(price: f64, inverted: bool) -> u32 {
    ThresholdParams::default().threshold(price, inverted)
}
