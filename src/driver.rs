//! # Poll Driver
//!
//! Runs the fixed-rate input loop.
//!
//! Each tick checks the robot status watchdog, samples every controller,
//! encodes the gated state and hands the packet to a [`PacketSink`]. Between
//! ticks the driver applies [`DriverEvent`]s from the rest of the
//! application: hotplug, key transitions, robot status and console commands.
//!
//! The driver is the only owner of the [`InputContext`], so no locking is
//! needed; everything else talks to it through the event channel.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{ControllerSnapshot, InputContext};
use crate::joystick::registry::AddOutcome;
use crate::joystick::source::RawController;
use crate::transport::PacketSink;

/// Messages accepted by a running [`PollDriver`].
#[derive(Debug)]
pub enum DriverEvent {
    /// A controller was plugged in.
    Connected(Box<dyn RawController>),
    /// The controller with this hardware index was unplugged.
    Disconnected(usize),
    /// Keyboard key pressed.
    KeyDown(String),
    /// Keyboard key released.
    KeyUp(String),
    /// The key source went away; release every held key.
    ReleaseKeys,
    /// Turn the keyboard virtual controller on or off.
    SetVirtualEnabled(bool),
    /// Robot status report. Also feeds the link watchdog.
    RobotStatus {
        /// Whether the robot is enabled.
        enabled: bool,
    },
    /// Blacklist or restore a controller by id.
    SetBlacklisted {
        /// Controller id.
        id: usize,
        /// New blacklist state.
        blacklisted: bool,
    },
    /// The robot link went down.
    LinkLost,
    /// Request a dashboard snapshot.
    Snapshot(oneshot::Sender<ControllerSnapshot>),
    /// Stop the driver.
    Shutdown,
}

/// Timing and startup options for the driver.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Time between poll ticks.
    pub poll_interval: Duration,
    /// Disarm if no robot status arrives within this window.
    pub status_timeout: Duration,
    /// Ticks between periodic status logs.
    pub log_interval_ticks: u64,
    /// Controller ids blacklisted at startup.
    pub blacklist: Vec<usize>,
    /// Whether the keyboard virtual controller starts enabled.
    pub virtual_enabled: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            status_timeout: Duration::from_millis(500),
            log_interval_ticks: 250,
            blacklist: Vec::new(),
            virtual_enabled: false,
        }
    }
}

impl From<&Config> for DriverSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.driver.poll_interval_ms),
            status_timeout: Duration::from_millis(config.safety.status_timeout_ms),
            log_interval_ticks: config.driver.log_interval_ticks,
            blacklist: config.safety.blacklist.clone(),
            virtual_enabled: config.keyboard.enabled,
        }
    }
}

/// Counters reported when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Poll ticks executed.
    pub ticks: u64,
    /// Packets accepted by the sink.
    pub packets_sent: u64,
    /// Packets the sink refused.
    pub send_failures: u64,
}

/// Fixed-rate poll, gate and encode loop.
pub struct PollDriver<S: PacketSink> {
    ctx: InputContext,
    sink: S,
    settings: DriverSettings,
    last_status: Option<Instant>,
    stats: DriverStats,
    released: Option<mpsc::UnboundedSender<usize>>,
}

impl<S: PacketSink> PollDriver<S> {
    /// Creates a driver with the startup blacklist and keyboard state applied.
    pub fn new(sink: S, settings: DriverSettings) -> Self {
        let mut ctx = InputContext::new();
        if settings.virtual_enabled {
            ctx.set_virtual_enabled(true);
        }
        for &id in &settings.blacklist {
            ctx.set_blacklisted(id, true);
        }

        Self {
            ctx,
            sink,
            settings,
            last_status: None,
            stats: DriverStats::default(),
            released: None,
        }
    }

    /// Reports hardware indices that are no longer registered, whether
    /// rejected, unplugged or disconnected, so discovery can offer them again.
    #[must_use]
    pub fn with_release_notifier(mut self, tx: mpsc::UnboundedSender<usize>) -> Self {
        self.released = Some(tx);
        self
    }

    /// Read access to the input context.
    pub fn context(&self) -> &InputContext {
        &self.ctx
    }

    /// Subscribes to controller count changes.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.ctx.subscribe_count()
    }

    /// Counters so far.
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// Runs one poll cycle and sends the resulting packet.
    ///
    /// Send failures are logged and counted; the next tick carries on.
    pub async fn tick(&mut self) {
        self.check_watchdog();

        for lost in self.ctx.poll() {
            debug!(
                "Controller {} (hardware {}) dropped during poll",
                lost.id, lost.hardware_index
            );
            self.release(lost.hardware_index);
        }

        let packet = self.ctx.encode_packet();
        match self.sink.send(packet).await {
            Ok(()) => self.stats.packets_sent += 1,
            Err(e) => {
                debug!("Failed to send joystick packet: {}", e);
                self.stats.send_failures += 1;
            }
        }

        self.stats.ticks += 1;
        if self.settings.log_interval_ticks > 0
            && self.stats.ticks % self.settings.log_interval_ticks == 0
        {
            info!(
                "Tick {}: {} controllers, {}, {} packets sent, {} failed",
                self.stats.ticks,
                self.ctx.count(),
                if self.ctx.is_armed() { "armed" } else { "disarmed" },
                self.stats.packets_sent,
                self.stats.send_failures
            );
        }
    }

    /// Applies one event. Returns false when the driver should stop.
    pub fn apply(&mut self, event: DriverEvent) -> bool {
        match event {
            DriverEvent::Connected(source) => {
                let hardware_index = source.hardware_index();
                if let AddOutcome::Rejected = self.ctx.add_controller(source) {
                    debug!("Controller {} rejected, registry full", hardware_index);
                    self.release(hardware_index);
                }
            }
            DriverEvent::Disconnected(hardware_index) => {
                if !self.ctx.remove_controller(hardware_index) {
                    debug!("Disconnect for unknown hardware index {}", hardware_index);
                }
                self.release(hardware_index);
            }
            DriverEvent::KeyDown(key) => self.ctx.key_down(&key),
            DriverEvent::KeyUp(key) => self.ctx.key_up(&key),
            DriverEvent::ReleaseKeys => self.ctx.release_keys(),
            DriverEvent::SetVirtualEnabled(enabled) => {
                self.ctx.set_virtual_enabled(enabled);
            }
            DriverEvent::RobotStatus { enabled } => {
                self.last_status = Some(Instant::now());
                self.ctx.set_armed(enabled);
            }
            DriverEvent::SetBlacklisted { id, blacklisted } => {
                self.ctx.set_blacklisted(id, blacklisted);
            }
            DriverEvent::LinkLost => self.ctx.link_lost(),
            DriverEvent::Snapshot(reply) => {
                if reply.send(self.ctx.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            DriverEvent::Shutdown => return false,
        }
        true
    }

    /// Runs until [`DriverEvent::Shutdown`] arrives or every sender is gone.
    ///
    /// All controllers are released and the gate disarmed before returning.
    pub async fn run(mut self, mut events: mpsc::Receiver<DriverEvent>) -> DriverStats {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Poll driver started ({} ms interval)",
            self.settings.poll_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,

                event = events.recv() => match event {
                    Some(event) => {
                        if !self.apply(event) {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        }

        self.ctx.shutdown();
        info!(
            "Poll driver stopped after {} ticks ({} packets sent)",
            self.stats.ticks, self.stats.packets_sent
        );
        self.stats
    }

    fn release(&self, hardware_index: usize) {
        if let Some(tx) = &self.released {
            // Discovery may already have stopped
            let _ = tx.send(hardware_index);
        }
    }

    fn check_watchdog(&mut self) {
        if !self.ctx.is_armed() {
            return;
        }
        let stale = self
            .last_status
            .map_or(true, |at| at.elapsed() > self.settings.status_timeout);
        if stale {
            warn!(
                "No robot status for {} ms",
                self.settings.status_timeout.as_millis()
            );
            self.ctx.link_lost();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JoystickError;
    use crate::joystick::source::SimulatedController;
    use crate::transport::{ChannelSink, MockPacketSink};
    use bytes::Bytes;

    const ARMED: [u8; 11] = [10, 0x0C, 0x02, 0x7F, 0x80, 0x03, 0x00, 0x05, 0x01, 0xFF, 0xFF];
    const NEUTRAL: [u8; 11] = [10, 0x0C, 0x02, 0x00, 0x00, 0x03, 0x00, 0x00, 0x01, 0xFF, 0xFF];

    fn reference_pad(hardware_index: usize) -> Box<SimulatedController> {
        let mut pad = SimulatedController::new(hardware_index, "Reference", 2, 3);
        pad.set_axis(0, 1.0);
        pad.set_axis(1, -1.0);
        pad.set_button(0, true);
        pad.set_button(2, true);
        Box::new(pad)
    }

    #[test]
    fn test_default_settings() {
        let settings = DriverSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(20));
        assert_eq!(settings.status_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.driver.poll_interval_ms = 50;
        config.safety.blacklist = vec![2];
        config.keyboard.enabled = true;

        let settings = DriverSettings::from(&config);
        assert_eq!(settings.poll_interval, Duration::from_millis(50));
        assert_eq!(settings.blacklist, vec![2]);
        assert!(settings.virtual_enabled);
    }

    #[test]
    fn test_startup_settings_applied() {
        let settings = DriverSettings {
            blacklist: vec![0],
            virtual_enabled: true,
            ..DriverSettings::default()
        };
        let (sink, _rx) = ChannelSink::channel(1);
        let driver = PollDriver::new(sink, settings);

        assert_eq!(driver.context().count(), 1);
        assert!(driver.context().all_controller_data()[0].blacklisted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_sends_neutral_while_disarmed() {
        let mut sink = MockPacketSink::new();
        sink.expect_send()
            .withf(|packet| packet[..] == NEUTRAL)
            .times(1)
            .returning(|_| Ok(()));

        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));
        driver.tick().await;

        assert_eq!(driver.stats().packets_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_sends_raw_while_armed() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));
        driver.apply(DriverEvent::RobotStatus { enabled: true });

        driver.tick().await;
        assert_eq!(rx.recv().await.unwrap()[..], ARMED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_counted() {
        let mut sink = MockPacketSink::new();
        sink.expect_send()
            .returning(|_| Err(JoystickError::Transport("down".to_string())));

        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.tick().await;
        driver.tick().await;

        let stats = driver.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.send_failures, 2);
        assert_eq!(stats.packets_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_never_waits_on_full_sink() {
        let (sink, _rx) = ChannelSink::channel(1);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));
        driver.apply(DriverEvent::RobotStatus { enabled: true });

        driver.tick().await;
        let second = tokio::time::timeout(Duration::from_secs(5), driver.tick()).await;
        assert!(second.is_ok(), "tick waited on a full sink");

        let stats = driver.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.send_failures, 1);

        // Events still apply while the consumer lags
        driver.apply(DriverEvent::RobotStatus { enabled: false });
        assert!(!driver.context().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_notifier_reports_unregistered_pads() {
        let (sink, _rx) = ChannelSink::channel(16);
        let (released_tx, mut released_rx) = mpsc::unbounded_channel();
        let mut driver =
            PollDriver::new(sink, DriverSettings::default()).with_release_notifier(released_tx);

        for hw in 0..6 {
            driver.apply(DriverEvent::Connected(reference_pad(hw)));
        }
        assert!(released_rx.try_recv().is_err());

        // Seventh pad is rejected
        driver.apply(DriverEvent::Connected(reference_pad(20)));
        assert_eq!(released_rx.try_recv().unwrap(), 20);

        driver.apply(DriverEvent::Disconnected(3));
        assert_eq!(released_rx.try_recv().unwrap(), 3);

        // A pad that fails its refresh is dropped by the poll
        let mut dying = SimulatedController::new(21, "Dying", 1, 1);
        dying.unplug();
        driver.apply(DriverEvent::Connected(Box::new(dying)));
        driver.tick().await;
        assert_eq!(released_rx.try_recv().unwrap(), 21);

        // Re-adding a registered pad releases nothing
        driver.apply(DriverEvent::Connected(reference_pad(0)));
        assert!(released_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_keys_event() {
        let (sink, _rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::SetVirtualEnabled(true));
        driver.apply(DriverEvent::KeyDown("d".to_string()));
        driver.tick().await;
        assert_eq!(driver.context().all_controller_data()[0].axes[0], 1.0);

        driver.apply(DriverEvent::ReleaseKeys);
        driver.tick().await;
        assert_eq!(driver.context().all_controller_data()[0].axes[0], 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_disarms_after_timeout() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));
        driver.apply(DriverEvent::RobotStatus { enabled: true });

        tokio::time::advance(Duration::from_millis(400)).await;
        driver.tick().await;
        assert_eq!(rx.recv().await.unwrap()[..], ARMED);

        tokio::time::advance(Duration::from_millis(200)).await;
        driver.tick().await;
        assert_eq!(rx.recv().await.unwrap()[..], NEUTRAL);
        assert!(!driver.context().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_armed() {
        let (sink, mut rx) = ChannelSink::channel(16);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));

        for _ in 0..10 {
            driver.apply(DriverEvent::RobotStatus { enabled: true });
            tokio::time::advance(Duration::from_millis(100)).await;
            driver.tick().await;
            assert_eq!(rx.recv().await.unwrap()[..], ARMED);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_update_context() {
        let (sink, _rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());

        driver.apply(DriverEvent::Connected(reference_pad(7)));
        driver.apply(DriverEvent::Connected(reference_pad(8)));
        driver.apply(DriverEvent::SetBlacklisted {
            id: 1,
            blacklisted: true,
        });
        driver.apply(DriverEvent::SetVirtualEnabled(true));
        driver.apply(DriverEvent::KeyDown("w".to_string()));
        driver.tick().await;

        let data = driver.context().all_controller_data();
        assert_eq!(data.len(), 3);
        assert!(data[1].blacklisted);
        assert_eq!(data[2].axes[1], -1.0);

        driver.apply(DriverEvent::Disconnected(7));
        assert_eq!(driver.context().count(), 2);
        // Hardware 8 is now id 0 and still blacklisted
        assert!(driver.context().all_controller_data()[0].blacklisted);

        driver.apply(DriverEvent::KeyUp("w".to_string()));
        driver.tick().await;
        assert_eq!(driver.context().all_controller_data()[1].axes[1], 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_lost_event() {
        let (sink, _rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::RobotStatus { enabled: true });
        assert!(driver.context().is_armed());

        driver.apply(DriverEvent::LinkLost);
        assert!(!driver.context().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_event() {
        let (sink, _rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        driver.apply(DriverEvent::Connected(reference_pad(0)));

        let (reply_tx, reply_rx) = oneshot::channel();
        assert!(driver.apply(DriverEvent::Snapshot(reply_tx)));

        let snapshot = reply_rx.await.unwrap();
        assert!(!snapshot.armed);
        assert_eq!(snapshot.controllers[0].axes, vec![1.0, -1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_event_stops_apply() {
        let (sink, _rx) = ChannelSink::channel(4);
        let mut driver = PollDriver::new(sink, DriverSettings::default());
        assert!(!driver.apply(DriverEvent::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_end_to_end() {
        let (sink, mut packets) = ChannelSink::channel(64);
        let driver = PollDriver::new(sink, DriverSettings::default());
        let mut count_rx = driver.subscribe_count();
        let (events_tx, events_rx) = mpsc::channel(16);

        let handle = tokio::spawn(driver.run(events_rx));

        events_tx
            .send(DriverEvent::Connected(reference_pad(0)))
            .await
            .unwrap();
        count_rx.changed().await.unwrap();
        assert_eq!(*count_rx.borrow(), 1);

        events_tx
            .send(DriverEvent::RobotStatus { enabled: true })
            .await
            .unwrap();

        let mut saw_armed = false;
        for _ in 0..20 {
            let packet: Bytes = packets.recv().await.unwrap();
            if packet[..] == ARMED {
                saw_armed = true;
                break;
            }
        }
        assert!(saw_armed);

        events_tx.send(DriverEvent::Shutdown).await.unwrap();
        let stats = handle.await.unwrap();
        assert!(stats.ticks > 0);
        assert_eq!(stats.send_failures, 0);

        // Shutdown releases every controller
        count_rx.changed().await.unwrap();
        assert_eq!(*count_rx.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_senders_dropped() {
        let (sink, _packets) = ChannelSink::channel(64);
        let driver = PollDriver::new(sink, DriverSettings::default());
        let (events_tx, events_rx) = mpsc::channel(1);
        drop(events_tx);

        let stats = driver.run(events_rx).await;
        assert!(stats.ticks <= 1);
    }
}
