//! Congestion throttle
//!
//! Tracks cumulative rune value scheduled per window of
//! `window_blocks` blocks. An instruction that pushes its window over the
//! volume threshold is delayed in proportion to its own value:
//!
//! ```text
//! delay = min(max_offset, value · delay_rate / threshold)
//! ```
//!
//! # Critical Invariants
//!
//! - Delay is zero while `window_total + value <= threshold`
//! - Delay never exceeds `max_offset`
//! - Delay is non-decreasing in `value`

use crate::core::math::{saturating_u64, Amount};
use crate::settlement::snapshot::BatchSnapshot;
use crate::store::OutboundQueue;
use num_traits::Zero;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleParams {
    /// Rune value per window before delays apply (zero disables the throttle)
    pub volume_threshold: Amount,
    pub delay_rate: u64,
    pub max_offset: u64,
    pub window_blocks: u64,
}

/// Window index containing `height`.
pub fn window_for(height: u64, window_blocks: u64) -> u64 {
    if window_blocks == 0 {
        return height;
    }
    height / window_blocks
}

/// Blocks to delay an instruction worth `value` when its window already
/// holds `window_total`.
///
/// # Example
///
/// ```rust
/// use liquidity_settlement_core::core::math::amount;
/// use liquidity_settlement_core::settlement::throttle::{delay_blocks, ThrottleParams};
///
/// let params = ThrottleParams {
///     volume_threshold: amount(1_000),
///     delay_rate: 100,
///     max_offset: 50,
///     window_blocks: 10,
/// };
/// assert_eq!(delay_blocks(&amount(100), &amount(0), &params), 0);
/// assert_eq!(delay_blocks(&amount(300), &amount(900), &params), 30);
/// assert_eq!(delay_blocks(&amount(5_000), &amount(0), &params), 50);
/// ```
pub fn delay_blocks(value: &Amount, window_total: &Amount, params: &ThrottleParams) -> u64 {
    if params.volume_threshold.is_zero() {
        return 0;
    }
    if window_total + value <= params.volume_threshold {
        return 0;
    }
    let delay = value * params.delay_rate / &params.volume_threshold;
    saturating_u64(&delay).min(params.max_offset)
}

/// Schedule an instruction worth `value` at the snapshot height and account
/// it to the current window. Returns the scheduled height.
pub fn schedule<Q: OutboundQueue>(
    snapshot: &mut BatchSnapshot,
    store: &Q,
    value: &Amount,
    params: &ThrottleParams,
) -> u64 {
    let height = snapshot.height();
    let window = window_for(height, params.window_blocks);
    let window_total = snapshot.window_volume(store, window);
    let delay = delay_blocks(value, &window_total, params);
    snapshot.add_window_volume(store, window, value);

    if delay > 0 {
        debug!(
            value = %value,
            window_total = %window_total,
            delay,
            "outbound throttled"
        );
    }
    height + delay
}
