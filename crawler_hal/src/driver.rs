//! HAL driver traits and error types.
//!
//! This module defines:
//! - `PwmDriver` trait - Interface for pluggable PWM backends
//! - `StatusLed` trait - Interface for the status indicator
//! - `PwmChannel` enum - The four H-bridge output channels
//! - `PwmError` enum - Error types for hardware operations

use thiserror::Error;

/// Error types for hardware operations.
#[derive(Debug, Clone, Error)]
pub enum PwmError {
    /// Driver initialization failed.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// Writing a duty value to the peripheral failed.
    #[error("duty write failed on {channel:?}: {reason}")]
    DutyWriteFailed {
        channel: PwmChannel,
        reason: String,
    },

    /// GPIO operation failed.
    #[error("gpio error: {0}")]
    Gpio(String),
}

/// The four PWM output channels of the dual H-bridge.
///
/// Each side has a forward and a reverse channel; the motor stage
/// guarantees at most one of a side's channels carries a non-zero
/// duty at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PwmChannel {
    LeftForward = 0,
    LeftReverse = 1,
    RightForward = 2,
    RightReverse = 3,
}

impl PwmChannel {
    /// All channels, in fixed order.
    pub const ALL: [PwmChannel; 4] = [
        PwmChannel::LeftForward,
        PwmChannel::LeftReverse,
        PwmChannel::RightForward,
        PwmChannel::RightReverse,
    ];
}

/// Trait defining the interface for PWM backends.
///
/// The motor output stage drives the H-bridge exclusively through this
/// trait, enabling pluggable backends (sysfs hardware, in-memory mock).
///
/// # Lifecycle
///
/// 1. `init()` - called once at boot, before any duty write
/// 2. `set_duty()` - called from the motor ramp tick and e-stop paths
/// 3. `shutdown()` - called once when the process stops
///
/// `set_duty` is invoked from the real-time ramp thread; backends must
/// not block on anything slower than a sysfs write.
pub trait PwmDriver: Send {
    /// The backend's unique identifier (e.g. "sysfs", "mock").
    fn name(&self) -> &'static str;

    /// Initialize the peripheral: export channels, program the carrier
    /// frequency, drive enable pins, and force all duties to zero.
    ///
    /// # Errors
    /// Returns `PwmError::InitFailed` if the hardware cannot be brought
    /// up; this is a boot-time fatal condition.
    fn init(&mut self) -> Result<(), PwmError>;

    /// Set the duty value on one channel.
    ///
    /// `duty` is in device units, 0..=max for the configured
    /// resolution. Failures are reported to the caller, which logs and
    /// drops them; a failed write must never abort the ramp tick.
    fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), PwmError>;

    /// Release the peripheral. All duties are zeroed first by the
    /// motor stage, so backends only need to unexport/close.
    fn shutdown(&mut self) -> Result<(), PwmError>;
}

/// Trait for the status LED indicator.
pub trait StatusLed: Send {
    /// Switch the LED on or off. Failures are the implementation's
    /// problem to log; the blink task ignores them.
    fn set(&mut self, on: bool);
}
