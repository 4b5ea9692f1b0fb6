//! Safety state machine and failsafe watchdog.
//!
//! Three states: DISARMED (boot default), ARMED, ESTOP. The monitor is
//! the authoritative gate on motor motion: the control tick asks
//! [`SafetyMonitor::is_armed`] before mixing, and every transition out
//! of ARMED commands a motor emergency stop itself, so motors stop
//! even if the control tick is wedged.
//!
//! ESTOP is latched: `disarm()` is rejected while e-stopped, and only
//! an explicit `arm()` leaves the state (directly to ARMED). Arming is
//! the single deliberate "resume" gesture.
//!
//! The watchdog thread polls at 10 Hz on its own mutex; when ARMED and
//! no refresh has arrived within the timeout it forces DISARMED.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crawler_common::consts::{PRIO_WATCHDOG, WATCHDOG_POLL_MS};

use crate::motor::MotorOutput;
use crate::rt;

/// Safety gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SafetyState {
    /// Motors disabled (default at boot).
    Disarmed = 0,
    /// Motors enabled.
    Armed = 1,
    /// Emergency stop (latched).
    Estop = 2,
}

impl SafetyState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disarmed),
            1 => Some(Self::Armed),
            2 => Some(Self::Estop),
            _ => None,
        }
    }
}

/// Result of a safety transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed.
    Changed {
        from: SafetyState,
        to: SafetyState,
    },
    /// Request was a no-op, already in the requested state.
    Unchanged(SafetyState),
    /// Request rejected, with the reason.
    Rejected(&'static str),
}

struct SafetyInner {
    state: SafetyState,
    last_watchdog: Instant,
}

/// Arm/disarm/e-stop gate with communications-loss watchdog.
pub struct SafetyMonitor {
    inner: Mutex<SafetyInner>,
    watchdog_timeout: Duration,
    motor: Arc<MotorOutput>,
}

impl SafetyMonitor {
    /// New monitor, DISARMED, watchdog considered fresh.
    pub fn new(watchdog_timeout: Duration, motor: Arc<MotorOutput>) -> Self {
        Self {
            inner: Mutex::new(SafetyInner {
                state: SafetyState::Disarmed,
                last_watchdog: Instant::now(),
            }),
            watchdog_timeout,
            motor,
        }
    }

    /// Arm the system. From ESTOP this clears the latch; arming is
    /// the deliberate resume gesture. Always resets the watchdog.
    pub fn arm(&self) -> Transition {
        let result = {
            let mut inner = self.inner.lock();
            inner.last_watchdog = Instant::now();
            match inner.state {
                SafetyState::Armed => Transition::Unchanged(SafetyState::Armed),
                from @ (SafetyState::Disarmed | SafetyState::Estop) => {
                    inner.state = SafetyState::Armed;
                    Transition::Changed {
                        from,
                        to: SafetyState::Armed,
                    }
                }
            }
        };
        if let Transition::Changed { from, .. } = result {
            if from == SafetyState::Estop {
                info!("system ARMED (e-stop cleared)");
            } else {
                info!("system ARMED");
            }
        }
        result
    }

    /// Disarm the system. Rejected while e-stopped; only `arm()`
    /// releases the latch.
    pub fn disarm(&self) -> Transition {
        let result = {
            let mut inner = self.inner.lock();
            match inner.state {
                SafetyState::Estop => Transition::Rejected("e-stop latched, arm to clear"),
                SafetyState::Disarmed => Transition::Unchanged(SafetyState::Disarmed),
                SafetyState::Armed => {
                    inner.state = SafetyState::Disarmed;
                    Transition::Changed {
                        from: SafetyState::Armed,
                        to: SafetyState::Disarmed,
                    }
                }
            }
        };
        match result {
            Transition::Changed { .. } => {
                self.motor.emergency_stop();
                info!("system DISARMED");
            }
            Transition::Rejected(reason) => warn!(reason, "disarm rejected"),
            Transition::Unchanged(_) => {}
        }
        result
    }

    /// Latch the emergency stop. Idempotent; the motor stage is
    /// commanded to zero on every call.
    pub fn emergency_stop(&self) -> Transition {
        let result = {
            let mut inner = self.inner.lock();
            match inner.state {
                SafetyState::Estop => Transition::Unchanged(SafetyState::Estop),
                from => {
                    inner.state = SafetyState::Estop;
                    Transition::Changed {
                        from,
                        to: SafetyState::Estop,
                    }
                }
            }
        };
        self.motor.emergency_stop();
        if matches!(result, Transition::Changed { .. }) {
            error!("EMERGENCY STOP, arm to clear");
        }
        result
    }

    /// Refresh the failsafe watchdog. Called by the control tick
    /// while frames keep arriving.
    pub fn update_watchdog(&self) {
        self.inner.lock().last_watchdog = Instant::now();
    }

    /// True iff the state is exactly ARMED.
    pub fn is_armed(&self) -> bool {
        self.inner.lock().state == SafetyState::Armed
    }

    /// Current state snapshot.
    pub fn state(&self) -> SafetyState {
        self.inner.lock().state
    }

    /// One watchdog poll: when ARMED and the refresh is older than the
    /// timeout, force DISARMED and stop the motors. Returns whether
    /// the timeout fired.
    pub fn check_watchdog(&self, now: Instant) -> bool {
        let expired = {
            let mut inner = self.inner.lock();
            let expired = inner.state == SafetyState::Armed
                && now.duration_since(inner.last_watchdog) > self.watchdog_timeout;
            if expired {
                inner.state = SafetyState::Disarmed;
            }
            expired
        };
        if expired {
            self.motor.emergency_stop();
            warn!(
                timeout_ms = self.watchdog_timeout.as_millis() as u64,
                "watchdog timeout, auto-disarming"
            );
        }
        expired
    }
}

/// Spawn the 10 Hz failsafe watchdog task.
///
/// Runs above the control tick priority and shares no lock with it
/// beyond the safety mutex itself, so a wedged control loop cannot
/// keep the system armed.
pub fn spawn_watchdog(
    safety: Arc<SafetyMonitor>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    rt::spawn_periodic(
        "safety_watchdog",
        Duration::from_millis(WATCHDOG_POLL_MS),
        PRIO_WATCHDOG,
        shutdown,
        move || {
            safety.check_watchdog(Instant::now());
        },
    )
}

// ─── Tests ──────────────────────────────────────────────────────────
