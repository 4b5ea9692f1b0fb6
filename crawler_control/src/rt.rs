//! Periodic real-time task plumbing.
//!
//! Every core loop (watchdog, control tick, motor ramp, LED) is a
//! named thread running a fixed-period body until the shutdown flag
//! flips. Threads request `SCHED_FIFO` at the priority ladder from
//! [`crawler_common::consts`]; on kernels or users without RT
//! privileges this degrades to a logged warning and normal scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

/// Spawn a named periodic task.
///
/// The body runs once per `period`; the sleep is taken after the body,
/// matching the firmware loops this replaces. The thread exits after
/// the flag is set, within one period.
pub fn spawn_periodic<F>(
    name: &str,
    period: Duration,
    priority: i32,
    shutdown: Arc<AtomicBool>,
    mut body: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new().name(thread_name.clone()).spawn(move || {
        apply_rt_priority(&thread_name, priority);
        while !shutdown.load(Ordering::Relaxed) {
            body();
            thread::sleep(period);
        }
        debug!(task = %thread_name, "periodic task stopped");
    })
}

/// Request `SCHED_FIFO` at the given priority for the calling thread.
///
/// Best-effort: running unprivileged (dev machines, CI) leaves the
/// thread on the normal scheduler with a warning.
#[cfg(target_os = "linux")]
pub fn apply_rt_priority(name: &str, priority: i32) {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: plain syscall on the calling thread with a valid param.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        warn!(
            task = name,
            priority,
            error = %std::io::Error::last_os_error(),
            "SCHED_FIFO unavailable, running with normal scheduling"
        );
    } else {
        debug!(task = name, priority, "SCHED_FIFO applied");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn apply_rt_priority(_name: &str, _priority: i32) {}

// ─── Tests ──────────────────────────────────────────────────────────
