//! Gamepad control adapter.
//!
//! The Bluetooth transport is an external daemon; it invokes
//! [`GamepadAdapter::handle_report`] with raw HID reports on its own
//! thread. The adapter only translates; it never calls into the mixer
//! or motor directly, everything funnels through `submit()` so the
//! control tick keeps its ordering.
//!
//! Bindings: left stick Y (inverted, stick up = forward) → throttle,
//! right stick X → steering, cross → e-stop, start → arm, triangle
//! press edge toggles slow mode. The slow-mode toggle is adapter
//! state: a source switch never inherits it.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crawler_common::frame::{ControlFrame, ControlSource, clamp_unit, monotonic_ms};
use crawler_control::ControlManager;

bitflags! {
    /// Button word of a raw gamepad report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PadButtons: u16 {
        const CROSS    = 1 << 0;
        const TRIANGLE = 1 << 1;
        const START    = 1 << 2;
    }
}

/// Raw gamepad report as delivered by the transport daemon.
///
/// Analog axes are native HID range 0..=255 with center 128.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GamepadReport {
    pub left_y: u8,
    pub right_x: u8,
    pub buttons: u16,
}

impl GamepadReport {
    #[inline]
    pub fn pressed(&self) -> PadButtons {
        PadButtons::from_bits_truncate(self.buttons)
    }
}

/// Report-to-frame translator with the slow-mode toggle.
pub struct GamepadAdapter {
    manager: Arc<ControlManager>,
    slow_mode: bool,
    last_triangle: bool,
}

impl GamepadAdapter {
    pub fn new(manager: Arc<ControlManager>) -> Self {
        Self {
            manager,
            slow_mode: false,
            last_triangle: false,
        }
    }

    /// Translate one report into a frame and submit it.
    pub fn handle_report(&mut self, report: &GamepadReport) {
        let buttons = report.pressed();

        // Slow mode toggles on the triangle press edge, not while held.
        let triangle = buttons.contains(PadButtons::TRIANGLE);
        if triangle && !self.last_triangle {
            self.slow_mode = !self.slow_mode;
            info!(slow_mode = self.slow_mode, "slow mode toggled");
        }
        self.last_triangle = triangle;

        let frame = ControlFrame {
            // Stick up is a low raw value; invert so up = forward.
            throttle: -map_axis(report.left_y),
            steering: map_axis(report.right_x),
            estop: buttons.contains(PadButtons::CROSS),
            arm: buttons.contains(PadButtons::START),
            slow_mode: self.slow_mode,
            timestamp: monotonic_ms(),
        };
        self.manager.submit(ControlSource::Gamepad, &frame);
        debug!(
            throttle = frame.throttle,
            steering = frame.steering,
            estop = frame.estop,
            arm = frame.arm,
            "gamepad report"
        );
    }

    /// Transport lost the controller: submit a zeroed frame so the
    /// watchdog can take over, and forget the press-edge state.
    pub fn handle_disconnect(&mut self) {
        warn!("gamepad disconnected, submitting quiescent frame");
        self.last_triangle = false;
        self.manager
            .submit(ControlSource::Gamepad, &ControlFrame::quiescent());
    }
}

/// Map a native 0..=255 axis (center 128) to [-1, +1].
#[inline]
fn map_axis(value: u8) -> f32 {
    clamp_unit((value as f32 - 128.0) / 128.0)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crawler_common::config::{MixerConfig, MotorConfig};
    use crawler_control::{Mixer, MotorOutput, SafetyMonitor};
    use crawler_hal::drivers::MockPwm;

    fn manager() -> Arc<ControlManager> {
        let motor = Arc::new(
            MotorOutput::new(
                MotorConfig {
                    resolution_bits: 10,
                    ramp_rate_ms: 0,
                    invert_left: false,
                    invert_right: false,
                },
                Box::new(MockPwm::new()),
            )
            .unwrap(),
        );
        let safety = Arc::new(SafetyMonitor::new(Duration::from_millis(1000), motor.clone()));
        Arc::new(ControlManager::new(
            safety,
            Mixer::new(MixerConfig::default()),
            motor,
            Duration::from_millis(1000),
        ))
    }

    fn report(left_y: u8, right_x: u8, buttons: PadButtons) -> GamepadReport {
        GamepadReport {
            left_y,
            right_x,
            buttons: buttons.bits(),
        }
    }

    #[test]
    fn axis_mapping() {
        assert_eq!(map_axis(128), 0.0);
        assert_eq!(map_axis(0), -1.0);
        // 255 maps to 127/128, clamped territory stays inside range.
        assert!((map_axis(255) - 127.0 / 128.0).abs() < 1e-6);
        assert!(map_axis(255) <= 1.0);
    }

    #[test]
    fn stick_up_is_forward() {
        let manager = manager();
        let mut adapter = GamepadAdapter::new(manager.clone());
        adapter.handle_report(&report(0, 128, PadButtons::empty()));

        let (source, frame) = manager.snapshot();
        assert_eq!(source, ControlSource::Gamepad);
        assert_eq!(frame.throttle, 1.0);
        assert_eq!(frame.steering, 0.0);
    }

    #[test]
    fn buttons_map_to_edges() {
        let manager = manager();
        let mut adapter = GamepadAdapter::new(manager.clone());
        adapter.handle_report(&report(128, 128, PadButtons::CROSS | PadButtons::START));

        let (_, frame) = manager.snapshot();
        assert!(frame.estop);
        assert!(frame.arm);
    }

    #[test]
    fn triangle_press_edge_toggles_slow_mode() {
        let manager = manager();
        let mut adapter = GamepadAdapter::new(manager.clone());

        // Press: toggles on.
        adapter.handle_report(&report(128, 128, PadButtons::TRIANGLE));
        assert!(manager.snapshot().1.slow_mode);

        // Held: no further toggle.
        adapter.handle_report(&report(128, 128, PadButtons::TRIANGLE));
        assert!(manager.snapshot().1.slow_mode);

        // Release, press again: toggles off.
        adapter.handle_report(&report(128, 128, PadButtons::empty()));
        adapter.handle_report(&report(128, 128, PadButtons::TRIANGLE));
        assert!(!manager.snapshot().1.slow_mode);
    }

    #[test]
    fn disconnect_submits_quiescent_frame() {
        let manager = manager();
        let mut adapter = GamepadAdapter::new(manager.clone());
        adapter.handle_report(&report(0, 255, PadButtons::empty()));
        adapter.handle_disconnect();

        let (source, frame) = manager.snapshot();
        assert_eq!(source, ControlSource::Gamepad);
        assert_eq!(frame.throttle, 0.0);
        assert_eq!(frame.steering, 0.0);
        assert!(!frame.estop);
    }

    #[test]
    fn unknown_button_bits_are_ignored() {
        let raw = GamepadReport {
            left_y: 128,
            right_x: 128,
            buttons: 0xFFF8,
        };
        assert_eq!(raw.pressed(), PadButtons::empty());
    }

    #[test]
    fn report_roundtrips_through_json() {
        let raw = report(10, 200, PadButtons::CROSS);
        let json = serde_json::to_string(&raw).unwrap();
        let back: GamepadReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.left_y, 10);
        assert_eq!(back.right_x, 200);
        assert!(back.pressed().contains(PadButtons::CROSS));
    }
}
