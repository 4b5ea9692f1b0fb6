//! Serial (line-oriented) control adapter.
//!
//! Protocol: one JSON object per line, terminated by LF or CR.
//! Recognized keys, each optional: `throttle`, `steering` (numbers),
//! `estop`, `arm`, `slow_mode` (booleans). Unknown keys are ignored,
//! out-of-range numbers are clamped, malformed lines are dropped with
//! a warning; they never crash and never disarm.
//!
//! Examples:
//! ```text
//! {"throttle": 0.5, "steering": -0.2}
//! {"estop": true}
//! {"arm": true}
//! ```

use std::io::BufRead;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crawler_common::frame::{ControlFrame, ControlSource, clamp_unit, monotonic_ms};
use crawler_control::ControlManager;

/// One parsed command line. Absent keys leave the frame zeroed, as
/// with the wire protocol this replaces.
#[derive(Debug, Default, Deserialize)]
struct LineCommand {
    throttle: Option<f32>,
    steering: Option<f32>,
    estop: Option<bool>,
    arm: Option<bool>,
    slow_mode: Option<bool>,
}

/// JSON-line adapter over any buffered reader.
pub struct SerialAdapter {
    manager: Arc<ControlManager>,
}

impl SerialAdapter {
    pub fn new(manager: Arc<ControlManager>) -> Self {
        Self { manager }
    }

    /// Parse and submit a single line. Returns whether a frame was
    /// submitted.
    pub fn handle_line(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        let command: LineCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, line, "dropping malformed serial line");
                return false;
            }
        };

        let frame = ControlFrame {
            throttle: clamp_unit(command.throttle.unwrap_or(0.0)),
            steering: clamp_unit(command.steering.unwrap_or(0.0)),
            estop: command.estop.unwrap_or(false),
            arm: command.arm.unwrap_or(false),
            slow_mode: command.slow_mode.unwrap_or(false),
            timestamp: monotonic_ms(),
        };
        self.manager.submit(ControlSource::Serial, &frame);
        debug!(
            throttle = frame.throttle,
            steering = frame.steering,
            estop = frame.estop,
            arm = frame.arm,
            "serial command"
        );
        true
    }

    /// Consume the reader until EOF or a read error, submitting one
    /// frame per line.
    pub fn feed<R: BufRead>(&self, reader: R) {
        for chunk in reader.split(b'\n') {
            match chunk {
                Ok(bytes) => {
                    // Bare-CR terminators also end a line.
                    for piece in String::from_utf8_lossy(&bytes).split('\r') {
                        self.handle_line(piece);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "serial read failed");
                    break;
                }
            }
        }
    }

    /// [`feed`](Self::feed) the whole stream, then submit a zeroed
    /// frame so the manager sees quiescence instead of a frozen last
    /// command.
    pub fn run<R: BufRead>(&self, reader: R) {
        self.feed(reader);
        warn!("serial stream closed, submitting quiescent frame");
        self.manager
            .submit(ControlSource::Serial, &ControlFrame::quiescent());
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
