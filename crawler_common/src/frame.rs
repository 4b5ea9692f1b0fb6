//! Control frame and control source types.
//!
//! Every input transport normalizes its native events into a
//! [`ControlFrame`] and submits it to the arbitration manager. Scalar
//! fields are clamped to [-1, +1] by the adapter before submission; the
//! core clamps again defensively on receipt.

use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Identity of a control input transport.
///
/// The integer encoding is stable: it is reported verbatim by the
/// HTTP status endpoint and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlSource {
    /// No active source (initial and post-timeout value).
    None = 0,
    /// Wireless gamepad.
    Gamepad = 1,
    /// Line-oriented serial channel.
    Serial = 2,
    /// Local HTTP endpoint.
    Http = 3,
}

impl ControlSource {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Gamepad),
            2 => Some(Self::Serial),
            3 => Some(Self::Http),
            _ => None,
        }
    }
}

impl Default for ControlSource {
    fn default() -> Self {
        Self::None
    }
}

/// Normalized control frame.
///
/// The single unit of input crossing the adapter → manager boundary:
/// two reals in [-1, +1], three booleans, and a monotonic timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlFrame {
    /// Forward/backward: -1.0 (reverse) to +1.0 (forward).
    pub throttle: f32,
    /// Left/right: -1.0 (left) to +1.0 (right).
    pub steering: f32,
    /// Emergency stop command edge.
    pub estop: bool,
    /// Arming command edge (also clears a latched e-stop).
    pub arm: bool,
    /// Slow-mode scaling request.
    pub slow_mode: bool,
    /// Monotonic milliseconds at which the adapter produced the frame.
    pub timestamp: u64,
}

impl ControlFrame {
    /// A zeroed frame stamped now. Submitted by adapters on
    /// disconnect so the manager sees quiescence.
    pub fn quiescent() -> Self {
        Self {
            timestamp: monotonic_ms(),
            ..Self::default()
        }
    }

    /// Copy of the frame with both scalar fields clamped to [-1, +1].
    #[inline]
    pub fn clamped(&self) -> Self {
        Self {
            throttle: clamp_unit(self.throttle),
            steering: clamp_unit(self.steering),
            ..*self
        }
    }
}

/// Clamp a scalar to the normalized [-1.0, +1.0] control range.
///
/// NaN maps to 0.0; a frame must never smuggle NaN into the mixer.
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

/// Milliseconds elapsed on the monotonic clock since process start.
///
/// Used to stamp frames; arbitration timeouts use `Instant` directly.
pub fn monotonic_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrip() {
        assert_eq!(ControlSource::from_u8(0), Some(ControlSource::None));
        assert_eq!(ControlSource::from_u8(1), Some(ControlSource::Gamepad));
        assert_eq!(ControlSource::from_u8(2), Some(ControlSource::Serial));
        assert_eq!(ControlSource::from_u8(3), Some(ControlSource::Http));
        assert_eq!(ControlSource::from_u8(4), None);
    }

    #[test]
    fn source_encoding_is_stable() {
        // Reported by GET /status; renumbering would break clients.
        assert_eq!(ControlSource::None as u8, 0);
        assert_eq!(ControlSource::Gamepad as u8, 1);
        assert_eq!(ControlSource::Serial as u8, 2);
        assert_eq!(ControlSource::Http as u8, 3);
    }

    #[test]
    fn clamp_unit_bounds() {
        assert_eq!(clamp_unit(0.5), 0.5);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-2.0), -1.0);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }

    #[test]
    fn clamped_frame_preserves_flags() {
        let frame = ControlFrame {
            throttle: 7.0,
            steering: -3.0,
            estop: true,
            arm: true,
            slow_mode: true,
            timestamp: 42,
        };
        let clamped = frame.clamped();
        assert_eq!(clamped.throttle, 1.0);
        assert_eq!(clamped.steering, -1.0);
        assert!(clamped.estop);
        assert!(clamped.arm);
        assert!(clamped.slow_mode);
        assert_eq!(clamped.timestamp, 42);
    }

    #[test]
    fn quiescent_frame_is_zeroed() {
        let frame = ControlFrame::quiescent();
        assert_eq!(frame.throttle, 0.0);
        assert_eq!(frame.steering, 0.0);
        assert!(!frame.estop);
        assert!(!frame.arm);
        assert!(!frame.slow_mode);
    }

    #[test]
    fn monotonic_ms_is_monotonic() {
        let a = monotonic_ms();
        let b = monotonic_ms();
        assert!(b >= a);
    }
}
