//! Crawler input adapters.
//!
//! Each adapter translates one transport's native events into
//! [`crawler_common::frame::ControlFrame`]s and submits them to the
//! arbitration manager. Adapters clamp scalars before submission and
//! submit per meaningful event; the manager depends on frame arrival
//! cadence for its failsafe watchdog, so none of them batch.
//!
//! On disconnect an adapter submits a zeroed frame (or simply stops
//! submitting and lets the manager's own timeout take over).
//!
//! - [`serial`] - JSON-line commands from a serial device
//! - [`http`] - REST endpoint + embedded control page (axum)
//! - [`gamepad`] - raw HID report translation with slow-mode toggle

pub mod gamepad;
pub mod http;
pub mod serial;

pub use gamepad::{GamepadAdapter, GamepadReport, PadButtons};
pub use http::HttpState;
pub use serial::SerialAdapter;
