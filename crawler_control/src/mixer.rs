//! Differential-drive mixer.
//!
//! Pure function from (throttle, steering, slow) to (left, right).
//! The stage order is normative: deadzone before expo (so the curve
//! shapes the rescaled input), clamp before the speed scaling (so
//! `max_speed` bounds the actual output instead of being absorbed by
//! saturation).

use crawler_common::config::MixerConfig;
use crawler_common::frame::clamp_unit;

/// Stateless differential-drive mixer. Configured once at boot.
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    config: MixerConfig,
}

impl Mixer {
    pub const fn new(config: MixerConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub const fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Mix throttle and steering into (left, right) track speeds.
    ///
    /// Deadzone → expo → combine → clamp → max-speed scale → slow-mode
    /// scale. Deterministic, never fails, no state beyond the config.
    pub fn mix(&self, throttle: f32, steering: f32, slow: bool) -> (f32, f32) {
        let throttle = apply_expo(apply_deadzone(throttle, self.config.deadzone), self.config.expo);
        let steering = apply_expo(apply_deadzone(steering, self.config.deadzone), self.config.expo);

        let mut left = clamp_unit(throttle + steering);
        let mut right = clamp_unit(throttle - steering);

        left *= self.config.max_speed;
        right *= self.config.max_speed;

        if slow {
            left *= self.config.slow_mode_factor;
            right *= self.config.slow_mode_factor;
        }

        (left, right)
    }
}

/// Map the band |x| < d to zero and rescale the remainder so full
/// deflection still reaches ±1.
#[inline]
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        return 0.0;
    }
    value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
}

/// Cubic expo curve: softer response near center, full travel at the
/// extremes. `e·x³ + (1−e)·x`.
#[inline]
fn apply_expo(value: f32, expo: f32) -> f32 {
    expo * value * value * value + (1.0 - expo) * value
}

// ─── Tests ──────────────────────────────────────────────────────────
