//! Backend implementations.
//!
//! - [`mock`] - In-memory recording backend for tests and `--simulate`
//! - [`sysfs`] - Linux sysfs PWM/GPIO backend for real hardware

pub mod mock;
pub mod sysfs;

pub use mock::{MockLed, MockPwm};
pub use sysfs::{SysfsLed, SysfsPwm};
