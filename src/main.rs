//! # FRC Driver Station Joystick Core
//!
//! Standalone runner for the joystick pipeline.
//!
//! Watches `/dev/input` for gamepads, optionally reads a physical keyboard
//! into the virtual controller, and runs the poll driver. A line-based
//! console on stdin stands in for the robot status feed.
//!
//! # Console
//!
//! ```text
//! enable | disable        arm or disarm joystick output
//! blacklist N             suppress controller N
//! unblacklist N           restore controller N
//! keyboard on|off         toggle the keyboard virtual controller
//! status                  print a controller snapshot as JSON
//! quit                    shut down
//! ```

use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use frc_ds_joystick::config::{Config, InputConfig, LoggingConfig};
use frc_ds_joystick::driver::{DriverEvent, DriverSettings, PollDriver};
use frc_ds_joystick::joystick::evdev::{EvdevKeyboard, HotplugMonitor};
use frc_ds_joystick::joystick::registry::MAX_CONTROLLERS;
use frc_ds_joystick::transport::ChannelSink;
use frc_ds_joystick::wire::decoder::decode_blocks;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Interval between console heartbeats to the driver
const HEARTBEAT_INTERVAL_MS: u64 = 100;

/// Capacity of the driver event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Commands accepted on the stdin console
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Enable,
    Disable,
    Blacklist(usize),
    Unblacklist(usize),
    Keyboard(bool),
    Status,
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match (words.next()?, words.next()) {
            ("enable", None) => Self::Enable,
            ("disable", None) => Self::Disable,
            ("blacklist", Some(id)) => Self::Blacklist(id.parse().ok()?),
            ("unblacklist", Some(id)) => Self::Unblacklist(id.parse().ok()?),
            ("keyboard", Some("on")) => Self::Keyboard(true),
            ("keyboard", Some("off")) => Self::Keyboard(false),
            ("status", None) => Self::Status,
            ("quit", None) | ("exit", None) => Self::Quit,
            _ => return None,
        };
        words.next().is_none().then_some(command)
    }
}

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging
///    - Start the poll driver and its helper tasks
///
/// 2. **Main Loop**
///    - The driver polls, gates and encodes every `poll_interval_ms`
///    - Console commands become driver events
///
/// 3. **Graceful Shutdown**
///    - `quit` or Ctrl+C stops the driver
///    - Controllers are released and output disarmed
///
/// # Errors
///
/// Returns error if the configuration file exists but is invalid.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, from_file) = load_config(&config_path)?;

    let _log_guard = init_logging(&config.logging)?;

    info!("FRC DS Joystick v{} starting...", env!("CARGO_PKG_VERSION"));
    if from_file {
        info!("Loaded configuration from {}", config_path);
    } else {
        info!("{} not found, using default configuration", config_path);
    }

    let (sink, packet_rx) = ChannelSink::channel(config.driver.sink_capacity);
    let (released_tx, released_rx) = mpsc::unbounded_channel();
    let driver =
        PollDriver::new(sink, DriverSettings::from(&config)).with_release_notifier(released_tx);
    let count_rx = driver.subscribe_count();
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let mut driver_handle = tokio::spawn(driver.run(events_rx));

    tokio::spawn(log_packets(packet_rx));
    tokio::spawn(watch_count(count_rx.clone()));
    tokio::spawn(hotplug_loop(
        config.input.clone(),
        events_tx.clone(),
        released_rx,
        count_rx,
    ));

    // Blocking readers get plain threads: the runtime would otherwise wait
    // for them on exit. Both are detached and die with the process.
    if !config.keyboard.device_path.is_empty() {
        let path = config.keyboard.device_path.clone();
        let tx = events_tx.clone();
        thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || keyboard_loop(&path, tx))
            .context("Failed to start keyboard thread")?;
    }

    let (armed_tx, armed_rx) = watch::channel(false);
    tokio::spawn(heartbeat(armed_rx, events_tx.clone()));

    let console_tx = events_tx.clone();
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || run_console(std::io::stdin().lock(), armed_tx, console_tx))
        .context("Failed to start console thread")?;

    info!("Type 'enable' to arm, 'quit' or Ctrl+C to exit");

    let stats = tokio::select! {
        joined = &mut driver_handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            // The driver may already be gone if the console quit concurrently
            let _ = events_tx.send(DriverEvent::Shutdown).await;
            driver_handle.await?
        }
    };

    info!(
        "Total ticks: {}, packets sent: {}, send failures: {}",
        stats.ticks, stats.packets_sent, stats.send_failures
    );
    Ok(())
}

/// Loads `path`, or the defaults when it does not exist.
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &str) -> Result<(Config, bool)> {
    if !Path::new(path).exists() {
        return Ok((Config::default(), false));
    }
    let config =
        Config::load(path).with_context(|| format!("Failed to load configuration from {}", path))?;
    Ok((config, true))
}

/// Initializes tracing. `RUST_LOG` overrides the configured level.
///
/// The returned guard flushes the log file and must be held until exit.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log filter")?;

    if logging.directory.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&logging.directory, "frc-ds-joystick.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Stand-in for the robot envelope: decodes and logs what the driver sends.
async fn log_packets(mut packets: mpsc::Receiver<Bytes>) {
    while let Some(packet) = packets.recv().await {
        match decode_blocks(&packet) {
            Ok(blocks) => debug!("Packet: {} bytes, {} joystick blocks", packet.len(), blocks.len()),
            Err(e) => warn!("Driver produced an undecodable packet: {}", e),
        }
    }
}

async fn watch_count(mut count_rx: watch::Receiver<usize>) {
    while count_rx.changed().await.is_ok() {
        let count = *count_rx.borrow_and_update();
        info!("{} controller(s) registered", count);
    }
}

/// Scans for new gamepads until the driver stops accepting events.
///
/// Hardware indices released by the driver are forgotten before each scan so
/// rejected or dropped pads are offered again. Scanning pauses while the
/// registry is full.
async fn hotplug_loop(
    input: InputConfig,
    events: mpsc::Sender<DriverEvent>,
    mut released: mpsc::UnboundedReceiver<usize>,
    count: watch::Receiver<usize>,
) {
    let mut monitor = HotplugMonitor::new(&input.device_dir);
    let mut ticker = interval(Duration::from_millis(input.scan_interval_ms));

    loop {
        ticker.tick().await;

        while let Ok(hardware_index) = released.try_recv() {
            monitor.forget(hardware_index);
        }
        if *count.borrow() >= MAX_CONTROLLERS {
            continue;
        }

        let found = match monitor.scan() {
            Ok(found) => found,
            Err(e) => {
                debug!("Gamepad scan failed: {}", e);
                continue;
            }
        };

        for gamepad in found {
            if events
                .send(DriverEvent::Connected(Box::new(gamepad)))
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

/// Forwards physical keyboard transitions. Runs on its own thread.
fn keyboard_loop(path: &str, events: mpsc::Sender<DriverEvent>) {
    let mut keyboard = match EvdevKeyboard::open(path) {
        Ok(keyboard) => keyboard,
        Err(e) => {
            warn!("Keyboard input disabled: {}", e);
            return;
        }
    };

    loop {
        let transitions = match keyboard.fetch_transitions() {
            Ok(transitions) => transitions,
            Err(e) => {
                warn!("Keyboard lost: {}", e);
                // Nothing will ever report the held keys as released
                let _ = events.blocking_send(DriverEvent::ReleaseKeys);
                return;
            }
        };

        for transition in transitions {
            let key = transition.key.to_string();
            let event = if transition.pressed {
                DriverEvent::KeyDown(key)
            } else {
                DriverEvent::KeyUp(key)
            };
            if events.blocking_send(event).is_err() {
                return;
            }
        }
    }
}

/// Repeats the console's robot status so the driver watchdog stays fed.
async fn heartbeat(armed: watch::Receiver<bool>, events: mpsc::Sender<DriverEvent>) {
    let mut ticker = interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
    loop {
        ticker.tick().await;
        let enabled = *armed.borrow();
        if events.send(DriverEvent::RobotStatus { enabled }).await.is_err() {
            return;
        }
    }
}

/// Reads console commands line by line. Runs on its own thread.
///
/// Returns at end of input, after `quit`, or once the driver is gone.
fn run_console<R: BufRead>(
    input: R,
    armed: watch::Sender<bool>,
    events: mpsc::Sender<DriverEvent>,
) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        };

        let Some(command) = ConsoleCommand::parse(line.trim()) else {
            if !line.trim().is_empty() {
                warn!("Unknown command: {}", line.trim());
            }
            continue;
        };

        let event = match command {
            ConsoleCommand::Enable => {
                armed.send_replace(true);
                DriverEvent::RobotStatus { enabled: true }
            }
            ConsoleCommand::Disable => {
                armed.send_replace(false);
                DriverEvent::RobotStatus { enabled: false }
            }
            ConsoleCommand::Blacklist(id) => DriverEvent::SetBlacklisted {
                id,
                blacklisted: true,
            },
            ConsoleCommand::Unblacklist(id) => DriverEvent::SetBlacklisted {
                id,
                blacklisted: false,
            },
            ConsoleCommand::Keyboard(enabled) => DriverEvent::SetVirtualEnabled(enabled),
            ConsoleCommand::Status => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if events.blocking_send(DriverEvent::Snapshot(reply_tx)).is_err() {
                    return;
                }
                match reply_rx.blocking_recv() {
                    Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
                        Ok(json) => println!("{}", json),
                        Err(e) => warn!("Failed to render snapshot: {}", e),
                    },
                    Err(_) => return,
                }
                continue;
            }
            ConsoleCommand::Quit => {
                // The driver may already be shutting down
                let _ = events.blocking_send(DriverEvent::Shutdown);
                return;
            }
        };

        if events.blocking_send(event).is_err() {
            return;
        }
    }
    debug!("Console input closed");
}
