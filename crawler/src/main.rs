//! # Crawler Supervisor
//!
//! Boot binary for the tracked-robot control firmware: loads the
//! configuration, brings up the motor stage against the selected PWM
//! backend, wires safety → mixer → arbitration, then spawns the
//! periodic core tasks and the enabled input adapters.
//!
//! The system always boots DISARMED with no active source. Nothing is
//! persisted across reboots.
//!
//! # Usage
//!
//! ```bash
//! # Real hardware
//! crawler --config /etc/crawler/crawler.toml
//!
//! # Dev machine, no PWM peripherals
//! crawler -c config/crawler.toml --simulate -v
//! ```

use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use crawler_common::config::CrawlerConfig;
use crawler_common::consts::{DEFAULT_CONFIG_PATH, PRIO_ADAPTER, PRIO_LED};
use crawler_control::manager::spawn_control_loop;
use crawler_control::motor::spawn_ramp;
use crawler_control::safety::spawn_watchdog;
use crawler_control::{ControlManager, Mixer, MotorOutput, SafetyMonitor, SafetyState, rt};
use crawler_hal::drivers::{MockPwm, SysfsLed, SysfsPwm};
use crawler_hal::{PwmDriver, StatusLed};
use crawler_link::http::HttpState;
use crawler_link::{GamepadAdapter, GamepadReport, SerialAdapter};

/// Crawler - tracked robot control firmware
#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(version)]
#[command(about = "Tracked robot control firmware supervisor")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (crawler.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the in-memory PWM backend instead of sysfs hardware
    #[arg(short, long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("crawler startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("crawler v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = CrawlerConfig::load(&args.config)?;
    info!(config = %args.config.display(), "configuration loaded");

    // Motor stage first, so every later subsystem can stop it.
    let driver: Box<dyn PwmDriver> = if args.simulate {
        info!("simulation mode: mock PWM backend");
        Box::new(MockPwm::new())
    } else {
        Box::new(SysfsPwm::new(&config.motor))
    };
    let motor = Arc::new(MotorOutput::new(config.motor.to_runtime(), driver)?);

    let safety = Arc::new(SafetyMonitor::new(
        Duration::from_millis(config.control.watchdog_timeout_ms),
        motor.clone(),
    ));

    let mixer = Mixer::new(config.mixer.to_runtime());
    info!(
        deadzone = mixer.config().deadzone,
        expo = mixer.config().expo,
        max_speed = mixer.config().max_speed,
        slow_mode_factor = mixer.config().slow_mode_factor,
        "mixer configured"
    );

    let manager = Arc::new(ControlManager::new(
        safety.clone(),
        mixer,
        motor.clone(),
        Duration::from_millis(config.control.failsafe_timeout_ms),
    ));

    // Shutdown flag, flipped by SIGINT/SIGTERM.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    // Core periodic tasks.
    let mut core_tasks: Vec<JoinHandle<()>> = vec![
        spawn_watchdog(safety.clone(), shutdown.clone())?,
        spawn_control_loop(manager.clone(), shutdown.clone())?,
        spawn_ramp(motor.clone(), shutdown.clone())?,
    ];

    // Input adapters.
    if config.serial.enabled {
        spawn_serial(&config, manager.clone(), shutdown.clone())?;
    } else {
        info!("serial adapter disabled");
    }

    if config.gamepad.enabled {
        spawn_gamepad(&config, manager.clone(), shutdown.clone())?;
    } else {
        info!("gamepad adapter disabled");
    }

    if config.http.enabled {
        spawn_http(&config, manager.clone(), safety.clone(), shutdown.clone())?;
    } else {
        info!("http adapter disabled");
    }

    if let Some(gpio) = config.led.gpio {
        match SysfsLed::open(gpio) {
            Ok(led) => core_tasks.push(spawn_led(led, safety.clone(), shutdown.clone())?),
            Err(e) => warn!(gpio, error = %e, "status led unavailable"),
        }
    }

    info!("system ready: state DISARMED, arm to enable motors");

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    // Orderly stop: core loops first, then the outputs.
    for task in core_tasks {
        let _ = task.join();
    }
    if let Err(e) = motor.shutdown() {
        warn!(error = %e, "motor shutdown reported a fault");
    }
    info!("crawler shutdown complete");
    Ok(())
}

/// Serial adapter thread: read JSON lines from the configured device,
/// reopening with backoff while the stream keeps dropping.
fn spawn_serial(
    config: &CrawlerConfig,
    manager: Arc<ControlManager>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let device = config.serial.device.clone();
    info!(device = %device, "serial adapter enabled");
    thread::Builder::new().name("serial_adapter".into()).spawn(move || {
        rt::apply_rt_priority("serial_adapter", PRIO_ADAPTER);
        let adapter = SerialAdapter::new(manager);
        while !shutdown.load(Ordering::Relaxed) {
            match std::fs::File::open(&device) {
                Ok(file) => adapter.run(BufReader::new(file)),
                Err(e) => warn!(device = %device, error = %e, "serial device unavailable"),
            }
            thread::sleep(Duration::from_secs(1));
        }
    })
}

/// Gamepad adapter thread: the Bluetooth daemon delivers one JSON
/// report per line over a Unix socket.
fn spawn_gamepad(
    config: &CrawlerConfig,
    manager: Arc<ControlManager>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let socket = config.gamepad.socket.clone();
    info!(socket = %socket, "gamepad adapter enabled");
    thread::Builder::new().name("gamepad_adapter".into()).spawn(move || {
        rt::apply_rt_priority("gamepad_adapter", PRIO_ADAPTER);
        let mut adapter = GamepadAdapter::new(manager);
        while !shutdown.load(Ordering::Relaxed) {
            match std::os::unix::net::UnixStream::connect(&socket) {
                Ok(stream) => {
                    info!("gamepad transport connected");
                    read_reports(&mut adapter, BufReader::new(stream));
                    adapter.handle_disconnect();
                }
                Err(e) => warn!(socket = %socket, error = %e, "gamepad transport unavailable"),
            }
            thread::sleep(Duration::from_secs(1));
        }
    })
}

fn read_reports<R: std::io::BufRead>(adapter: &mut GamepadAdapter, reader: R) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "gamepad read failed");
                return;
            }
        };
        match serde_json::from_str::<GamepadReport>(&line) {
            Ok(report) => adapter.handle_report(&report),
            Err(e) => warn!(error = %e, "dropping malformed gamepad report"),
        }
    }
}

/// HTTP adapter thread, hosting its own tokio runtime.
fn spawn_http(
    config: &CrawlerConfig,
    manager: Arc<ControlManager>,
    safety: Arc<SafetyMonitor>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    // Validated at config load; a parse failure here is a bug.
    let addr: SocketAddr = config
        .http
        .bind
        .parse()
        .map_err(|e| std::io::Error::other(format!("http.bind: {e}")))?;
    thread::Builder::new().name("http_adapter".into()).spawn(move || {
        let state = Arc::new(HttpState { manager, safety });
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "http runtime failed to start");
                return;
            }
        };
        if let Err(e) = runtime.block_on(crawler_link::http::serve(state, addr, shutdown)) {
            error!(error = %e, "http adapter stopped");
        }
    })
}

/// Status LED task: blink pattern follows the safety state.
///
/// Slow blink when disarmed, solid when armed, very fast blink while
/// e-stopped.
fn spawn_led(
    mut led: SysfsLed,
    safety: Arc<SafetyMonitor>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("status_led".into()).spawn(move || {
        rt::apply_rt_priority("status_led", PRIO_LED);
        let mut ticks: u64 = 0;
        while !shutdown.load(Ordering::Relaxed) {
            let on = match safety.state() {
                SafetyState::Armed => true,
                // 1 s half-period.
                SafetyState::Disarmed => (ticks / 20) % 2 == 0,
                // 50 ms half-period.
                SafetyState::Estop => ticks % 2 == 0,
            };
            led.set(on);
            ticks += 1;
            thread::sleep(Duration::from_millis(50));
        }
        led.set(false);
    })
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
