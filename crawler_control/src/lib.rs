//! # Crawler Control Core
//!
//! Real-time control pipeline for a tracked mobile robot: multi-source
//! input arbitration, the safety state machine with its failsafe
//! watchdog, the differential-drive mixer, and the slew-limited motor
//! output stage.
//!
//! ## Pipeline
//!
//! ```text
//! adapter ──submit──▶ ControlManager ──50 Hz tick──▶ SafetyMonitor gate
//!                                            │
//!                                            ▼
//!                                      Mixer (pure)
//!                                            │
//!                                            ▼
//!                                  MotorOutput targets ──20 ms ramp──▶ PWM
//! ```
//!
//! The watchdog thread polls the safety state independently of the
//! control tick, so a stalled pipeline still disarms within one
//! watchdog period.
//!
//! ## Locking
//!
//! Manager state, safety state and motor state sit behind three
//! separate mutexes. No task ever holds two of them at once: the
//! control tick snapshots the manager state, releases the lock, and
//! only then calls into safety and motor.

pub mod manager;
pub mod mixer;
pub mod motor;
pub mod rt;
pub mod safety;

pub use manager::ControlManager;
pub use mixer::Mixer;
pub use motor::MotorOutput;
pub use safety::{SafetyMonitor, SafetyState, Transition};
