//! Linux sysfs PWM/GPIO backend.
//!
//! Drives hardware PWM channels through `/sys/class/pwm` and the
//! H-bridge enable pins / status LED through `/sys/class/gpio`.
//! Init-time failures are fatal; runtime duty-write failures are
//! reported to the motor stage, which logs and keeps ticking.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crawler_common::config::{MotorSettings, PwmPin};

use crate::driver::{PwmChannel, PwmDriver, PwmError, StatusLed};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Hardware PWM backend over the kernel sysfs interface.
pub struct SysfsPwm {
    settings: MotorSettings,
    period_ns: u64,
    max_duty: u32,
    pwm_base: PathBuf,
    gpio_base: PathBuf,
}

impl SysfsPwm {
    pub fn new(settings: &MotorSettings) -> Self {
        Self::with_base(
            settings,
            Path::new("/sys/class/pwm"),
            Path::new("/sys/class/gpio"),
        )
    }

    /// Backend rooted at alternative sysfs paths (tests).
    pub fn with_base(settings: &MotorSettings, pwm_base: &Path, gpio_base: &Path) -> Self {
        Self {
            settings: settings.clone(),
            period_ns: NANOS_PER_SEC / settings.pwm_freq_hz as u64,
            max_duty: (1u32 << settings.pwm_resolution_bits) - 1,
            pwm_base: pwm_base.to_path_buf(),
            gpio_base: gpio_base.to_path_buf(),
        }
    }

    fn pin(&self, channel: PwmChannel) -> PwmPin {
        let pins = &self.settings.pins;
        match channel {
            PwmChannel::LeftForward => pins.left_forward,
            PwmChannel::LeftReverse => pins.left_reverse,
            PwmChannel::RightForward => pins.right_forward,
            PwmChannel::RightReverse => pins.right_reverse,
        }
    }

    fn channel_dir(&self, pin: PwmPin) -> PathBuf {
        self.pwm_base
            .join(format!("pwmchip{}", pin.chip))
            .join(format!("pwm{}", pin.channel))
    }

    /// Duty counts → nanoseconds for the configured period.
    fn duty_ns(&self, duty: u32) -> u64 {
        let duty = duty.min(self.max_duty) as u64;
        duty * self.period_ns / self.max_duty as u64
    }

    fn export_channel(&self, pin: PwmPin) -> Result<(), PwmError> {
        let dir = self.channel_dir(pin);
        if !dir.exists() {
            let export = self
                .pwm_base
                .join(format!("pwmchip{}", pin.chip))
                .join("export");
            write_sysfs(&export, &pin.channel.to_string())
                .map_err(|e| PwmError::InitFailed(format!("export {pin:?}: {e}")))?;
        }
        Ok(())
    }

    fn setup_enable_gpio(&self, gpio: u32) -> Result<(), PwmError> {
        let dir = self.gpio_base.join(format!("gpio{gpio}"));
        if !dir.exists() {
            write_sysfs(&self.gpio_base.join("export"), &gpio.to_string())
                .map_err(|e| PwmError::Gpio(format!("export gpio{gpio}: {e}")))?;
        }
        write_sysfs(&dir.join("direction"), "out")
            .map_err(|e| PwmError::Gpio(format!("gpio{gpio} direction: {e}")))?;
        write_sysfs(&dir.join("value"), "1")
            .map_err(|e| PwmError::Gpio(format!("gpio{gpio} value: {e}")))?;
        Ok(())
    }
}

impl PwmDriver for SysfsPwm {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn init(&mut self) -> Result<(), PwmError> {
        for channel in PwmChannel::ALL {
            let pin = self.pin(channel);
            self.export_channel(pin)?;
            let dir = self.channel_dir(pin);
            write_sysfs(&dir.join("period"), &self.period_ns.to_string())
                .map_err(|e| PwmError::InitFailed(format!("{channel:?} period: {e}")))?;
            write_sysfs(&dir.join("duty_cycle"), "0")
                .map_err(|e| PwmError::InitFailed(format!("{channel:?} duty: {e}")))?;
            write_sysfs(&dir.join("enable"), "1")
                .map_err(|e| PwmError::InitFailed(format!("{channel:?} enable: {e}")))?;
            debug!(?channel, ?pin, period_ns = self.period_ns, "pwm channel up");
        }

        for &gpio in &self.settings.pins.enable_gpios {
            self.setup_enable_gpio(gpio)?;
        }

        Ok(())
    }

    fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), PwmError> {
        let dir = self.channel_dir(self.pin(channel));
        write_sysfs(&dir.join("duty_cycle"), &self.duty_ns(duty).to_string()).map_err(|e| {
            PwmError::DutyWriteFailed {
                channel,
                reason: e.to_string(),
            }
        })
    }

    fn shutdown(&mut self) -> Result<(), PwmError> {
        // Disable the carriers and drop the H-bridge enables; leave
        // channels exported for the next boot.
        let mut first_err = None;
        for channel in PwmChannel::ALL {
            let dir = self.channel_dir(self.pin(channel));
            if let Err(e) = write_sysfs(&dir.join("enable"), "0") {
                warn!(?channel, error = %e, "pwm disable failed");
                first_err.get_or_insert(PwmError::InitFailed(e.to_string()));
            }
        }
        for &gpio in &self.settings.pins.enable_gpios {
            let value = self.gpio_base.join(format!("gpio{gpio}")).join("value");
            if let Err(e) = write_sysfs(&value, "0") {
                warn!(gpio, error = %e, "enable gpio clear failed");
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Status LED on a sysfs GPIO.
pub struct SysfsLed {
    value_path: PathBuf,
}

impl SysfsLed {
    /// Export the GPIO and configure it as an output.
    pub fn open(gpio: u32) -> Result<Self, PwmError> {
        Self::open_at(gpio, Path::new("/sys/class/gpio"))
    }

    pub fn open_at(gpio: u32, base: &Path) -> Result<Self, PwmError> {
        let dir = base.join(format!("gpio{gpio}"));
        if !dir.exists() {
            write_sysfs(&base.join("export"), &gpio.to_string())
                .map_err(|e| PwmError::Gpio(format!("export gpio{gpio}: {e}")))?;
        }
        write_sysfs(&dir.join("direction"), "out")
            .map_err(|e| PwmError::Gpio(format!("gpio{gpio} direction: {e}")))?;
        Ok(Self {
            value_path: dir.join("value"),
        })
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) {
        if let Err(e) = write_sysfs(&self.value_path, if on { "1" } else { "0" }) {
            warn!(error = %e, "status led write failed");
        }
    }
}

fn write_sysfs(path: &Path, value: &str) -> std::io::Result<()> {
    fs::write(path, value)
}

// ─── Tests ──────────────────────────────────────────────────────────
