//! Control arbitration manager.
//!
//! Owns the single active control frame under the "owner lock" model:
//! the last source to submit becomes the active source, preempting any
//! prior source without negotiation, and holds control until it stops
//! submitting for longer than the failsafe timeout.
//!
//! The 50 Hz control tick wires the rest of the core together. Per
//! tick, in order: expire a stale source, apply the e-stop edge (which
//! short-circuits the rest of the tick: e-stop always has the
//! shortest path to motor quiescence), apply the arm edge, refresh the
//! safety watchdog, then mix-and-drive or command zero.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crawler_common::consts::{CONTROL_TICK_MS, PRIO_CONTROL};
use crawler_common::frame::{ControlFrame, ControlSource};

use crate::mixer::Mixer;
use crate::motor::MotorOutput;
use crate::rt;
use crate::safety::SafetyMonitor;

struct ManagerInner {
    source: ControlSource,
    frame: ControlFrame,
    last_update: Instant,
}

/// Multi-source arbitration manager and control-tick driver.
pub struct ControlManager {
    inner: Mutex<ManagerInner>,
    safety: Arc<SafetyMonitor>,
    mixer: Mixer,
    motor: Arc<MotorOutput>,
    failsafe_timeout: Duration,
}

impl ControlManager {
    pub fn new(
        safety: Arc<SafetyMonitor>,
        mixer: Mixer,
        motor: Arc<MotorOutput>,
        failsafe_timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(ManagerInner {
                source: ControlSource::None,
                frame: ControlFrame::default(),
                last_update: Instant::now(),
            }),
            safety,
            mixer,
            motor,
            failsafe_timeout,
        }
    }

    /// Submit a frame from a source. Last writer wins: the submitting
    /// source becomes the active source regardless of the previous
    /// owner. Only source *changes* are logged.
    ///
    /// Never blocks longer than the store itself.
    pub fn submit(&self, source: ControlSource, frame: &ControlFrame) {
        let mut inner = self.inner.lock();
        if source != inner.source {
            info!(from = ?inner.source, to = ?source, "control source changed");
            inner.source = source;
        }
        inner.frame = frame.clamped();
        inner.last_update = Instant::now();
    }

    /// Current active source snapshot.
    pub fn active_source(&self) -> ControlSource {
        self.inner.lock().source
    }

    /// Snapshot of (active source, current frame) for status surfaces.
    pub fn snapshot(&self) -> (ControlSource, ControlFrame) {
        let inner = self.inner.lock();
        (inner.source, inner.frame)
    }

    /// One control tick at time `now`.
    ///
    /// The manager lock is held only for the timeout check and the
    /// frame snapshot; safety and motor run on the snapshot afterwards
    /// so no two subsystem mutexes are ever held together.
    pub fn tick(&self, now: Instant) {
        let (source, frame) = {
            let mut inner = self.inner.lock();
            if inner.source != ControlSource::None
                && now.duration_since(inner.last_update) > self.failsafe_timeout
            {
                warn!(
                    source = ?inner.source,
                    idle_ms = now.duration_since(inner.last_update).as_millis() as u64,
                    "control timeout, releasing source"
                );
                inner.source = ControlSource::None;
                inner.frame = ControlFrame::default();
            }
            (inner.source, inner.frame)
        };

        // E-stop edge preempts everything else in the frame,
        // including a simultaneous arm request.
        if frame.estop {
            self.safety.emergency_stop();
            return;
        }

        // Arm edge: the same frame may also command motion below.
        if frame.arm {
            self.safety.arm();
        }

        // A source is live as long as frames arrive, whatever their
        // content.
        if source != ControlSource::None {
            self.safety.update_watchdog();
        }

        if self.safety.is_armed() {
            let (left, right) = self.mixer.mix(frame.throttle, frame.steering, frame.slow_mode);
            self.motor.set_target(left, right);
            debug!(
                ?source,
                throttle = frame.throttle,
                steering = frame.steering,
                slow = frame.slow_mode,
                left,
                right,
                "drive"
            );
        } else {
            self.motor.set_target(0.0, 0.0);
        }
    }
}

/// Spawn the 50 Hz control tick task.
pub fn spawn_control_loop(
    manager: Arc<ControlManager>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    rt::spawn_periodic(
        "control_tick",
        Duration::from_millis(CONTROL_TICK_MS),
        PRIO_CONTROL,
        shutdown,
        move || manager.tick(Instant::now()),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────
