//! Crawler HAL
//!
//! Hardware access for the motor output stage and the status LED,
//! behind pluggable driver traits so the control core can run against
//! real sysfs peripherals or an in-memory mock.
//!
//! # Module Structure
//!
//! - [`driver`] - `PwmDriver` / `StatusLed` traits, channel ids, errors
//! - [`drivers`] - Backend implementations (mock, sysfs)

pub mod driver;
pub mod drivers;

pub use driver::{PwmChannel, PwmDriver, PwmError, StatusLed};
