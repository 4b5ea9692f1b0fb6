//! Motor output stage.
//!
//! Translates the signed normalized speed pair into hardware PWM with
//! rate-limited slew and per-side polarity inversion. Targets come
//! from the control tick; the ramp task advances the actual speeds
//! every 20 ms and writes duty values through the HAL driver.
//!
//! A side's signed speed maps to one of its two unipolar channels
//! (forward or reverse); the opposing channel is always written to
//! zero first, so both channels of a side never carry a non-zero duty
//! at the same time.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crawler_common::config::MotorConfig;
use crawler_common::consts::{MOTOR_TICK_MS, PRIO_MOTOR};
use crawler_common::frame::clamp_unit;
use crawler_hal::{PwmChannel, PwmDriver, PwmError};

use crate::rt;

const LEFT: usize = 0;
const RIGHT: usize = 1;

struct MotorInner {
    driver: Box<dyn PwmDriver>,
    /// Speed currently on the PWM, per side.
    current: [f32; 2],
    /// Speed the control tick asked for, per side.
    target: [f32; 2],
}

/// Slew-limited dual H-bridge output stage.
pub struct MotorOutput {
    config: MotorConfig,
    inner: Mutex<MotorInner>,
}

impl MotorOutput {
    /// Bring up the PWM backend and start from standstill.
    pub fn new(config: MotorConfig, mut driver: Box<dyn PwmDriver>) -> Result<Self, PwmError> {
        driver.init()?;
        info!(
            driver = driver.name(),
            resolution_bits = config.resolution_bits,
            ramp_rate_ms = config.ramp_rate_ms,
            "motor output initialized"
        );
        Ok(Self {
            config,
            inner: Mutex::new(MotorInner {
                driver,
                current: [0.0; 2],
                target: [0.0; 2],
            }),
        })
    }

    /// Store new target speeds. Inputs are clamped to [-1, +1];
    /// never blocks beyond the store, never fails.
    pub fn set_target(&self, left: f32, right: f32) {
        let mut inner = self.inner.lock();
        inner.target = [clamp_unit(left), clamp_unit(right)];
    }

    /// Zero both targets and currents and command zero duty on all
    /// four channels immediately, bypassing the ramp. Idempotent.
    pub fn emergency_stop(&self) {
        let mut inner = self.inner.lock();
        inner.target = [0.0; 2];
        inner.current = [0.0; 2];
        for channel in PwmChannel::ALL {
            write_duty(&mut inner.driver, channel, 0);
        }
        warn!("motor emergency stop");
    }

    /// One ramp step: advance each current toward its target by at
    /// most the slew bound, then refresh the hardware duties.
    ///
    /// Invoked from the ramp task at a fixed 20 ms period. PWM
    /// failures are logged and dropped; the tick never terminates.
    pub fn tick(&self) {
        let mut inner = self.inner.lock();
        for side in [LEFT, RIGHT] {
            let target = inner.target[side];
            let current = inner.current[side];
            inner.current[side] = match self.ramp_step() {
                // Ramping disabled: snap to target.
                None => target,
                Some(step) => {
                    let diff = target - current;
                    if diff.abs() > step {
                        current + step.copysign(diff)
                    } else {
                        target
                    }
                }
            };
        }
        let [left, right] = inner.current;
        self.apply_side(&mut inner.driver, LEFT, left);
        self.apply_side(&mut inner.driver, RIGHT, right);
    }

    /// Speeds currently on the PWM.
    pub fn current_speeds(&self) -> (f32, f32) {
        let inner = self.inner.lock();
        (inner.current[LEFT], inner.current[RIGHT])
    }

    /// Speeds most recently commanded by the control tick.
    pub fn target_speeds(&self) -> (f32, f32) {
        let inner = self.inner.lock();
        (inner.target[LEFT], inner.target[RIGHT])
    }

    /// Zero the outputs and release the PWM backend.
    pub fn shutdown(&self) -> Result<(), PwmError> {
        self.emergency_stop();
        self.inner.lock().driver.shutdown()
    }

    /// Maximum per-tick speed change, `None` when ramping is off.
    fn ramp_step(&self) -> Option<f32> {
        if self.config.ramp_rate_ms == 0 {
            None
        } else {
            Some(MOTOR_TICK_MS as f32 / self.config.ramp_rate_ms as f32)
        }
    }

    /// Map one side's signed speed onto its forward/reverse channel
    /// pair. The idle channel is zeroed before the active one is
    /// written, keeping the at-most-one-live-channel invariant even
    /// across a direction flip.
    fn apply_side(&self, driver: &mut Box<dyn PwmDriver>, side: usize, value: f32) {
        let inverted = match side {
            LEFT => self.config.invert_left,
            _ => self.config.invert_right,
        };
        let value = if inverted { -value } else { value };

        let (forward, reverse) = match side {
            LEFT => (PwmChannel::LeftForward, PwmChannel::LeftReverse),
            _ => (PwmChannel::RightForward, PwmChannel::RightReverse),
        };
        let duty = (value.abs() * self.config.max_duty() as f32).round() as u32;

        if value >= 0.0 {
            write_duty(driver, reverse, 0);
            write_duty(driver, forward, duty);
        } else {
            write_duty(driver, forward, 0);
            write_duty(driver, reverse, duty);
        }
    }
}

/// Write one duty value; peripheral failures are logged and dropped.
fn write_duty(driver: &mut Box<dyn PwmDriver>, channel: PwmChannel, duty: u32) {
    if let Err(e) = driver.set_duty(channel, duty) {
        warn!(error = %e, "pwm write failed, keeping last duty");
    }
}

/// Spawn the 20 ms ramp task.
pub fn spawn_ramp(
    motor: Arc<MotorOutput>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    rt::spawn_periodic(
        "motor_ramp",
        Duration::from_millis(MOTOR_TICK_MS),
        PRIO_MOTOR,
        shutdown,
        move || motor.tick(),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────
