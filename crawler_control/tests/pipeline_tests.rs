//! End-to-end control pipeline scenarios.
//!
//! Drives the full core (manager, safety, mixer, motor, mock PWM)
//! through explicit `tick(now)` calls with synthetic instants, so the
//! failsafe timelines are deterministic and no test ever sleeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crawler_common::config::{MixerConfig, MotorConfig};
use crawler_common::frame::{ControlFrame, ControlSource};
use crawler_control::manager::ControlManager;
use crawler_control::mixer::Mixer;
use crawler_control::motor::MotorOutput;
use crawler_control::safety::{SafetyMonitor, SafetyState, Transition};
use crawler_hal::PwmChannel;
use crawler_hal::drivers::MockPwm;

const EPS: f32 = 1e-5;

struct Pipeline {
    manager: ControlManager,
    safety: Arc<SafetyMonitor>,
    motor: Arc<MotorOutput>,
    pwm: MockPwm,
}

fn pipeline(mixer: MixerConfig, ramp_rate_ms: u32) -> Pipeline {
    let pwm = MockPwm::new();
    let motor_config = MotorConfig {
        resolution_bits: 10,
        ramp_rate_ms,
        invert_left: false,
        invert_right: false,
    };
    let motor = Arc::new(MotorOutput::new(motor_config, Box::new(pwm.clone())).unwrap());
    let safety = Arc::new(SafetyMonitor::new(Duration::from_millis(1000), motor.clone()));
    let manager = ControlManager::new(
        safety.clone(),
        Mixer::new(mixer),
        motor.clone(),
        Duration::from_millis(1000),
    );
    Pipeline {
        manager,
        safety,
        motor,
        pwm,
    }
}

fn default_mixer() -> MixerConfig {
    MixerConfig {
        deadzone: 0.05,
        expo: 0.3,
        max_speed: 1.0,
        slow_mode_factor: 0.3,
    }
}

fn frame(throttle: f32, steering: f32) -> ControlFrame {
    ControlFrame {
        throttle,
        steering,
        ..ControlFrame::default()
    }
}

fn arm_frame() -> ControlFrame {
    ControlFrame {
        arm: true,
        ..ControlFrame::default()
    }
}

/// Deadzone rescale followed by the cubic expo, as the mixer applies
/// them to a single axis.
fn shape(x: f32, deadzone: f32, expo: f32) -> f32 {
    let rescaled = if x.abs() < deadzone {
        0.0
    } else {
        x.signum() * (x.abs() - deadzone) / (1.0 - deadzone)
    };
    expo * rescaled.powi(3) + (1.0 - expo) * rescaled
}

// ─── S1: arm then drive ─────────────────────────────────────────────

#[test]
fn arm_then_drive() {
    let p = pipeline(default_mixer(), 0);
    let now = Instant::now();

    p.manager.submit(ControlSource::Serial, &arm_frame());
    p.manager.tick(now);
    assert_eq!(p.safety.state(), SafetyState::Armed);

    p.manager.submit(ControlSource::Serial, &frame(0.5, 0.0));
    p.manager.tick(now);

    let expected = shape(0.5, 0.05, 0.3);
    let (l, r) = p.motor.target_speeds();
    assert!((l - expected).abs() < EPS, "left {l} vs {expected}");
    assert!((r - expected).abs() < EPS, "right {r} vs {expected}");

    // With no deadzone the canonical worked value applies directly:
    // 0.3·0.5³ + 0.7·0.5 = 0.3875.
    let p = pipeline(
        MixerConfig {
            deadzone: 0.0,
            ..default_mixer()
        },
        0,
    );
    let mut f = frame(0.5, 0.0);
    f.arm = true;
    p.manager.submit(ControlSource::Serial, &f);
    p.manager.tick(now);
    let (l, r) = p.motor.target_speeds();
    assert!((l - 0.3875).abs() < EPS);
    assert!((r - 0.3875).abs() < EPS);
}

// ─── S2: source change ──────────────────────────────────────────────

#[test]
fn source_change_preempts_and_remixes() {
    let p = pipeline(default_mixer(), 0);
    let now = Instant::now();

    p.manager.submit(ControlSource::Serial, &arm_frame());
    p.manager.tick(now);

    p.manager.submit(ControlSource::Http, &frame(-1.0, 1.0));
    assert_eq!(p.manager.active_source(), ControlSource::Http);

    p.manager.tick(now);
    // ±1 passes the deadzone rescale and expo unchanged; the combine
    // gives left = 0, right = −2 clamped to −1, then ×max_speed.
    let (l, r) = p.motor.target_speeds();
    assert!(l.abs() < EPS, "left {l}");
    assert!((r + 1.0).abs() < EPS, "right {r}");
}

// ─── S3: e-stop precedence ──────────────────────────────────────────

#[test]
fn estop_wins_over_arm_and_arm_recovers() {
    let p = pipeline(default_mixer(), 500);
    let now = Instant::now();

    let mut f = ControlFrame::default();
    f.arm = true;
    f.estop = true;
    p.manager.submit(ControlSource::Http, &f);
    p.manager.tick(now);
    assert_eq!(p.safety.state(), SafetyState::Estop);

    // Motors are zeroed immediately, not through the ramp.
    assert_eq!(p.motor.current_speeds(), (0.0, 0.0));
    for channel in PwmChannel::ALL {
        assert_eq!(p.pwm.duty(channel), 0);
    }

    // A subsequent plain arm clears the latch.
    p.manager.submit(ControlSource::Http, &arm_frame());
    p.manager.tick(now);
    assert_eq!(p.safety.state(), SafetyState::Armed);
}

// ─── S4: silence timeout ────────────────────────────────────────────

#[test]
fn silence_disarms_within_timeouts() {
    let p = pipeline(default_mixer(), 500);
    let t0 = Instant::now();

    let mut f = frame(1.0, 0.0);
    f.arm = true;
    p.manager.submit(ControlSource::Serial, &f);
    p.manager.tick(t0);
    assert_eq!(p.safety.state(), SafetyState::Armed);

    // Motors ramp toward full throttle while frames are fresh.
    p.motor.tick();
    let (l, _) = p.motor.current_speeds();
    assert!(l > 0.0);

    // Silence past the failsafe timeout: the source expires and the
    // tick stops refreshing the watchdog.
    p.manager.tick(t0 + Duration::from_millis(1100));
    assert_eq!(p.manager.active_source(), ControlSource::None);
    let (_, current) = p.manager.snapshot();
    assert_eq!(current, ControlFrame::default());

    // The watchdog then observes the stale refresh and force-disarms.
    assert!(p.safety.check_watchdog(t0 + Duration::from_millis(2200)));
    assert_eq!(p.safety.state(), SafetyState::Disarmed);
    assert_eq!(p.motor.current_speeds(), (0.0, 0.0));
}

// ─── S5: slow mode ──────────────────────────────────────────────────

#[test]
fn slow_mode_scales_drive() {
    let p = pipeline(default_mixer(), 0);
    let now = Instant::now();

    let mut f = frame(1.0, 0.0);
    f.arm = true;
    f.slow_mode = true;
    p.manager.submit(ControlSource::Gamepad, &f);
    p.manager.tick(now);

    // Full deflection maps through deadzone/expo to 1, then ×0.3.
    let (l, r) = p.motor.target_speeds();
    assert!((l - 0.3).abs() < EPS);
    assert!((r - 0.3).abs() < EPS);
}

// ─── S6: disarm rejected in e-stop ──────────────────────────────────

#[test]
fn disarm_rejected_until_armed_again() {
    let p = pipeline(default_mixer(), 0);

    p.safety.emergency_stop();
    assert!(matches!(p.safety.disarm(), Transition::Rejected(_)));
    assert_eq!(p.safety.state(), SafetyState::Estop);

    assert!(matches!(p.safety.arm(), Transition::Changed { .. }));
    assert_eq!(p.safety.state(), SafetyState::Armed);
}

// ─── Property: safety gate and clamp invariance ─────────────────────

#[test]
fn disarmed_targets_are_zero_whatever_the_frame() {
    let p = pipeline(default_mixer(), 0);
    let now = Instant::now();

    for (t, s) in [(1.0, 1.0), (-1.0, 0.5), (0.2, -0.9)] {
        p.manager.submit(ControlSource::Http, &frame(t, s));
        p.manager.tick(now);
        assert_eq!(p.motor.target_speeds(), (0.0, 0.0));
    }
}

#[test]
fn targets_never_exceed_speed_ceiling() {
    let mixer = MixerConfig {
        deadzone: 0.05,
        expo: 0.3,
        max_speed: 0.8,
        slow_mode_factor: 0.25,
    };
    let p = pipeline(mixer, 0);
    let now = Instant::now();

    p.manager.submit(ControlSource::Serial, &arm_frame());
    p.manager.tick(now);

    for t in [-1.5f32, -1.0, -0.3, 0.0, 0.3, 1.0, 1.5] {
        for s in [-1.5f32, -0.7, 0.0, 0.7, 1.5] {
            for slow in [false, true] {
                let mut f = frame(t, s);
                f.slow_mode = slow;
                p.manager.submit(ControlSource::Serial, &f);
                p.manager.tick(now);

                let ceiling = if slow { 0.8 * 0.25 } else { 0.8 };
                let (l, r) = p.motor.target_speeds();
                assert!(l.abs() <= ceiling + EPS, "l={l} t={t} s={s} slow={slow}");
                assert!(r.abs() <= ceiling + EPS, "r={r} t={t} s={s} slow={slow}");
            }
        }
    }
}

#[test]
fn estop_latch_survives_further_frames() {
    let p = pipeline(default_mixer(), 0);
    let now = Instant::now();

    let mut f = ControlFrame::default();
    f.estop = true;
    p.manager.submit(ControlSource::Serial, &f);
    p.manager.tick(now);
    assert_eq!(p.safety.state(), SafetyState::Estop);

    // Plain drive frames do not re-engage the motors.
    p.manager.submit(ControlSource::Serial, &frame(1.0, 0.0));
    p.manager.tick(now);
    assert_eq!(p.safety.state(), SafetyState::Estop);
    assert_eq!(p.motor.target_speeds(), (0.0, 0.0));
}
