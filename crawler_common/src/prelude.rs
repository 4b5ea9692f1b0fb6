//! Prelude module for common re-exports.
//!
//! Consumers can `use crawler_common::prelude::*;` and get the most
//! important types without listing individual paths.

// ─── Control frame ──────────────────────────────────────────────────
pub use crate::frame::{clamp_unit, monotonic_ms, ControlFrame, ControlSource};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, CrawlerConfig, MixerConfig, MotorConfig};

// ─── System constants ───────────────────────────────────────────────
pub use crate::consts::{CONTROL_TICK_MS, MOTOR_TICK_MS, WATCHDOG_POLL_MS};
