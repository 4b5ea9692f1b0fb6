//! In-memory recording backend.
//!
//! Used by the control-core tests and by `--simulate` runs on a dev
//! machine. Handles are cheap clones over shared state, so a test can
//! keep one handle for assertions while the motor stage owns the other.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{PwmChannel, PwmDriver, PwmError, StatusLed};

#[derive(Debug, Default)]
struct MockState {
    initialized: bool,
    shut_down: bool,
    fail_writes: bool,
    duties: [u32; 4],
    history: Vec<(PwmChannel, u32)>,
}

/// Recording PWM backend.
#[derive(Debug, Clone, Default)]
pub struct MockPwm {
    state: Arc<Mutex<MockState>>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest duty written to a channel.
    pub fn duty(&self, channel: PwmChannel) -> u32 {
        self.state.lock().duties[channel as usize]
    }

    /// Full write history, oldest first.
    pub fn history(&self) -> Vec<(PwmChannel, u32)> {
        self.state.lock().history.clone()
    }

    /// Make every subsequent `set_duty` fail, for peripheral-fault
    /// handling tests.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

impl PwmDriver for MockPwm {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn init(&mut self) -> Result<(), PwmError> {
        let mut state = self.state.lock();
        state.initialized = true;
        state.duties = [0; 4];
        Ok(())
    }

    fn set_duty(&mut self, channel: PwmChannel, duty: u32) -> Result<(), PwmError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(PwmError::DutyWriteFailed {
                channel,
                reason: "injected fault".to_string(),
            });
        }
        state.duties[channel as usize] = duty;
        state.history.push((channel, duty));
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), PwmError> {
        self.state.lock().shut_down = true;
        Ok(())
    }
}

/// Recording status LED.
#[derive(Debug, Clone, Default)]
pub struct MockLed {
    state: Arc<Mutex<Vec<bool>>>,
}

impl MockLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence of on/off writes, oldest first.
    pub fn writes(&self) -> Vec<bool> {
        self.state.lock().clone()
    }
}

impl StatusLed for MockLed {
    fn set(&mut self, on: bool) {
        self.state.lock().push(on);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
