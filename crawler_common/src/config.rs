//! TOML configuration loading and validation.
//!
//! All tuning lives in one `crawler.toml` loaded at boot. Scalar tuning
//! values are written as percentages in the file (matching the operator
//! documentation) and normalized to [0, 1] fractions for the runtime
//! structs. Validation runs once at boot; an out-of-range value is a
//! fatal init error, never a runtime condition.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    DEADZONE_MAX, FAILSAFE_TIMEOUT_MS_DEFAULT, PWM_RESOLUTION_MAX, WATCHDOG_TIMEOUT_MS_DEFAULT,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

// ─── File-facing settings ───────────────────────────────────────────

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub mixer: MixerSettings,
    #[serde(default)]
    pub motor: MotorSettings,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub gamepad: GamepadSettings,
    #[serde(default)]
    pub led: LedSettings,
}

/// Arbitration and failsafe timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Source timeout: active source expires after this many ms
    /// without a submitted frame.
    #[serde(default = "default_failsafe_timeout_ms")]
    pub failsafe_timeout_ms: u64,

    /// Safety watchdog timeout: ARMED decays to DISARMED after this
    /// many ms without a watchdog refresh.
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
}

fn default_failsafe_timeout_ms() -> u64 {
    FAILSAFE_TIMEOUT_MS_DEFAULT
}

fn default_watchdog_timeout_ms() -> u64 {
    WATCHDOG_TIMEOUT_MS_DEFAULT
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            failsafe_timeout_ms: default_failsafe_timeout_ms(),
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
        }
    }
}

/// Differential-drive mixer tuning, as percentages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerSettings {
    /// Input deadzone [%] (0 to 20).
    #[serde(default = "default_deadzone_pct")]
    pub deadzone_pct: f32,
    /// Expo curve strength [%] (0 to 100).
    #[serde(default = "default_expo_pct")]
    pub expo_pct: f32,
    /// Output speed ceiling [%] (0 to 100).
    #[serde(default = "default_max_speed_pct")]
    pub max_speed_pct: f32,
    /// Slow-mode multiplier [%] (0 to 100).
    #[serde(default = "default_slow_mode_factor_pct")]
    pub slow_mode_factor_pct: f32,
}

fn default_deadzone_pct() -> f32 {
    5.0
}

fn default_expo_pct() -> f32 {
    30.0
}

fn default_max_speed_pct() -> f32 {
    100.0
}

fn default_slow_mode_factor_pct() -> f32 {
    30.0
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            deadzone_pct: default_deadzone_pct(),
            expo_pct: default_expo_pct(),
            max_speed_pct: default_max_speed_pct(),
            slow_mode_factor_pct: default_slow_mode_factor_pct(),
        }
    }
}

impl MixerSettings {
    /// Normalized runtime mixer configuration.
    pub fn to_runtime(&self) -> MixerConfig {
        MixerConfig {
            deadzone: self.deadzone_pct / 100.0,
            expo: self.expo_pct / 100.0,
            max_speed: self.max_speed_pct / 100.0,
            slow_mode_factor: self.slow_mode_factor_pct / 100.0,
        }
    }
}

/// One hardware PWM output: sysfs pwmchip index + channel number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PwmPin {
    pub chip: u32,
    pub channel: u32,
}

/// PWM channel bindings for the dual H-bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotorPins {
    pub left_forward: PwmPin,
    pub left_reverse: PwmPin,
    pub right_forward: PwmPin,
    pub right_reverse: PwmPin,
    /// H-bridge enable GPIOs, driven high at init.
    #[serde(default)]
    pub enable_gpios: Vec<u32>,
}

/// Motor output stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorSettings {
    /// PWM carrier frequency [Hz].
    #[serde(default = "default_pwm_freq_hz")]
    pub pwm_freq_hz: u32,
    /// PWM duty resolution [bits].
    #[serde(default = "default_pwm_resolution_bits")]
    pub pwm_resolution_bits: u8,
    /// Milliseconds to traverse the full [-1, +1] speed range.
    /// 0 disables ramping (snap to target).
    #[serde(default = "default_ramp_rate_ms")]
    pub ramp_rate_ms: u32,
    #[serde(default)]
    pub invert_left: bool,
    #[serde(default)]
    pub invert_right: bool,
    #[serde(default)]
    pub pins: MotorPins,
}

fn default_pwm_freq_hz() -> u32 {
    20_000
}

fn default_pwm_resolution_bits() -> u8 {
    10
}

fn default_ramp_rate_ms() -> u32 {
    500
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            pwm_freq_hz: default_pwm_freq_hz(),
            pwm_resolution_bits: default_pwm_resolution_bits(),
            ramp_rate_ms: default_ramp_rate_ms(),
            invert_left: false,
            invert_right: false,
            pins: MotorPins::default(),
        }
    }
}

impl MotorSettings {
    /// Runtime motor configuration (pin bindings stay with the driver).
    pub fn to_runtime(&self) -> MotorConfig {
        MotorConfig {
            resolution_bits: self.pwm_resolution_bits,
            ramp_rate_ms: self.ramp_rate_ms,
            invert_left: self.invert_left,
            invert_right: self.invert_right,
        }
    }
}

/// Serial adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Line-oriented device to read JSON commands from.
    #[serde(default = "default_serial_device")]
    pub device: String,
}

fn default_serial_device() -> String {
    "/dev/ttyUSB0".to_string()
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            device: default_serial_device(),
        }
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Socket address to bind, e.g. "0.0.0.0:8080".
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_http_bind(),
        }
    }
}

/// Gamepad adapter settings.
///
/// The Bluetooth transport is an external daemon; it delivers raw
/// reports over this Unix socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamepadSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_gamepad_socket")]
    pub socket: String,
}

fn default_gamepad_socket() -> String {
    "/run/crawler/gamepad.sock".to_string()
}

impl Default for GamepadSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            socket: default_gamepad_socket(),
        }
    }
}

/// Status LED settings. `gpio = none` disables the blinker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedSettings {
    #[serde(default)]
    pub gpio: Option<u32>,
}

fn default_true() -> bool {
    true
}

// ─── Runtime configuration ──────────────────────────────────────────

/// Mixer configuration, normalized fractions. Immutable after boot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerConfig {
    /// Input band around zero mapped to exact zero, in [0, 0.2].
    pub deadzone: f32,
    /// Cubic shaping strength, in [0, 1].
    pub expo: f32,
    /// Output ceiling applied after clamping, in [0, 1].
    pub max_speed: f32,
    /// Uniform scaling applied after mixing when slow mode is on.
    pub slow_mode_factor: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerSettings::default().to_runtime()
    }
}

/// Motor output configuration. Immutable after boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorConfig {
    /// PWM duty resolution [bits, 1..=16].
    pub resolution_bits: u8,
    /// Milliseconds to traverse the full [-1, +1] range; 0 = no ramp.
    pub ramp_rate_ms: u32,
    pub invert_left: bool,
    pub invert_right: bool,
}

impl MotorConfig {
    /// Maximum duty value for the configured resolution.
    #[inline]
    pub const fn max_duty(&self) -> u32 {
        (1u32 << self.resolution_bits) - 1
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        MotorSettings::default().to_runtime()
    }
}

// ─── Loading & validation ───────────────────────────────────────────

impl CrawlerConfig {
    /// Load and validate the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all parameter bounds.
    ///
    /// Negative percentages, zero timeouts and out-of-range PWM
    /// resolutions are boot-time fatal conditions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        if c.failsafe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "control.failsafe_timeout_ms must be > 0".to_string(),
            ));
        }
        if c.watchdog_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "control.watchdog_timeout_ms must be > 0".to_string(),
            ));
        }

        let m = &self.mixer;
        check_pct("mixer.deadzone_pct", m.deadzone_pct, DEADZONE_MAX * 100.0)?;
        check_pct("mixer.expo_pct", m.expo_pct, 100.0)?;
        check_pct("mixer.max_speed_pct", m.max_speed_pct, 100.0)?;
        check_pct("mixer.slow_mode_factor_pct", m.slow_mode_factor_pct, 100.0)?;

        let mo = &self.motor;
        if mo.pwm_freq_hz == 0 {
            return Err(ConfigError::Validation(
                "motor.pwm_freq_hz must be > 0".to_string(),
            ));
        }
        if mo.pwm_resolution_bits == 0 || mo.pwm_resolution_bits > PWM_RESOLUTION_MAX {
            return Err(ConfigError::Validation(format!(
                "motor.pwm_resolution_bits must be 1..={PWM_RESOLUTION_MAX}, got {}",
                mo.pwm_resolution_bits
            )));
        }

        if self.http.enabled && self.http.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "http.bind is not a socket address: {}",
                self.http.bind
            )));
        }

        Ok(())
    }
}

fn check_pct(field: &str, value: f32, max: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(ConfigError::Validation(format!(
            "{field} must be within 0..={max}, got {value}"
        )));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = CrawlerConfig::default();
        config.validate().expect("defaults must be valid");
        assert_eq!(config.control.failsafe_timeout_ms, 1000);
        assert_eq!(config.control.watchdog_timeout_ms, 1000);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = CrawlerConfig::from_toml("").unwrap();
        assert_eq!(config.mixer.deadzone_pct, 5.0);
        assert_eq!(config.motor.pwm_resolution_bits, 10);
        assert!(config.serial.enabled);
        assert!(config.http.enabled);
        assert!(!config.gamepad.enabled);
        assert!(config.led.gpio.is_none());
    }

    #[test]
    fn percentages_normalize() {
        let mixer = MixerSettings {
            deadzone_pct: 5.0,
            expo_pct: 30.0,
            max_speed_pct: 80.0,
            slow_mode_factor_pct: 30.0,
        }
        .to_runtime();
        assert!((mixer.deadzone - 0.05).abs() < 1e-6);
        assert!((mixer.expo - 0.30).abs() < 1e-6);
        assert!((mixer.max_speed - 0.80).abs() < 1e-6);
        assert!((mixer.slow_mode_factor - 0.30).abs() < 1e-6);
    }

    #[test]
    fn deadzone_above_limit_rejected() {
        let toml = "[mixer]\ndeadzone_pct = 25.0\n";
        let err = CrawlerConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn negative_ramp_rate_rejected_at_parse() {
        // ramp_rate_ms is unsigned: a negative value never reaches
        // validation, it fails in the TOML layer.
        let toml = "[motor]\nramp_rate_ms = -100\n";
        let err = CrawlerConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn zero_ramp_rate_is_valid() {
        let toml = "[motor]\nramp_rate_ms = 0\n";
        let config = CrawlerConfig::from_toml(toml).unwrap();
        assert_eq!(config.motor.ramp_rate_ms, 0);
    }

    #[test]
    fn resolution_out_of_range_rejected() {
        let toml = "[motor]\npwm_resolution_bits = 17\n";
        assert!(CrawlerConfig::from_toml(toml).is_err());
        let toml = "[motor]\npwm_resolution_bits = 0\n";
        assert!(CrawlerConfig::from_toml(toml).is_err());
    }

    #[test]
    fn bad_http_bind_rejected() {
        let toml = "[http]\nbind = \"not-an-address\"\n";
        assert!(CrawlerConfig::from_toml(toml).is_err());
    }

    #[test]
    fn bad_http_bind_ignored_when_disabled() {
        let toml = "[http]\nenabled = false\nbind = \"not-an-address\"\n";
        assert!(CrawlerConfig::from_toml(toml).is_ok());
    }

    #[test]
    fn max_duty_matches_resolution() {
        let config = MotorConfig {
            resolution_bits: 10,
            ramp_rate_ms: 500,
            invert_left: false,
            invert_right: false,
        };
        assert_eq!(config.max_duty(), 1023);
    }

    #[test]
    fn full_file_roundtrip() {
        let toml = r#"
[control]
failsafe_timeout_ms = 500
watchdog_timeout_ms = 800

[mixer]
deadzone_pct = 4.0
expo_pct = 25.0
max_speed_pct = 90.0
slow_mode_factor_pct = 40.0

[motor]
pwm_freq_hz = 25000
pwm_resolution_bits = 12
ramp_rate_ms = 400
invert_left = true

[motor.pins]
left_forward = { chip = 0, channel = 0 }
left_reverse = { chip = 0, channel = 1 }
right_forward = { chip = 1, channel = 0 }
right_reverse = { chip = 1, channel = 1 }
enable_gpios = [17, 27]

[serial]
enabled = false

[http]
bind = "127.0.0.1:9000"

[gamepad]
enabled = true
socket = "/tmp/pad.sock"

[led]
gpio = 21
"#;
        let config = CrawlerConfig::from_toml(toml).unwrap();
        assert_eq!(config.control.failsafe_timeout_ms, 500);
        assert_eq!(config.motor.pins.right_reverse, PwmPin { chip: 1, channel: 1 });
        assert_eq!(config.motor.pins.enable_gpios, vec![17, 27]);
        assert!(config.motor.invert_left);
        assert!(!config.serial.enabled);
        assert_eq!(config.http.bind, "127.0.0.1:9000");
        assert!(config.gamepad.enabled);
        assert_eq!(config.led.gpio, Some(21));
    }
}
