//! Startup orchestration and liveness supervision
//!
//! Opens the rings and sinks, spawns one pinned realtime worker per
//! direction, and watches their heartbeats from an unpinned watchdog
//! thread. Ring construction failures are fatal; affinity and scheduling
//! failures only degrade.

use crate::capture::{RingConfig, RxRing, TxSink};
use crate::config::Config;
use crate::dataplane::{Classifier, ClassifierSettings, ForwardingEngine, Shaper};
use crate::indicator::{LedColor, StatusLed};
use crate::telemetry::{now_unix, Direction, Telemetry};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Watchdog tick interval.
const WATCHDOG_TICK: Duration = Duration::from_millis(500);

/// A heartbeat older than this is a stall.
const STALL_THRESHOLD_SECS: u64 = 5;

/// Shaper rate when no probe estimate and no override exist.
const DEFAULT_UPSTREAM_MBPS: f64 = 500.0;

/// Realtime priority for the forwarding threads. Mid-range: above normal
/// tasks, below kernel threads that must preempt us.
const RT_PRIORITY: libc::c_int = 50;

pub struct Supervisor {
    config: Config,
    telemetry: Arc<Telemetry>,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            telemetry: Arc::new(Telemetry::new()),
        }
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Bring the bridge up and run until the stop flag is raised.
    ///
    /// Construction errors (socket, ring, bind) return before any worker
    /// thread exists.
    pub fn run(self, stop: &'static AtomicBool) -> Result<()> {
        let bridge = &self.config.bridge;
        let settings = ClassifierSettings::from_config(&self.config.classifier)?;
        let rate_mbps = self.shaper_rate_mbps();
        let capacity_frames = self.config.shaper.capacity_frames;

        info!(
            iface_a = %bridge.iface_a,
            iface_b = %bridge.iface_b,
            rate_mbps,
            "bringing up bridge"
        );

        let ring_a = RxRing::open(&bridge.iface_a, RingConfig::default())?;
        let ring_b = RxRing::open(&bridge.iface_b, RingConfig::default())?;
        let tx_a = TxSink::open(&bridge.iface_a)?;
        let tx_b = TxSink::open(&bridge.iface_b)?;

        // Prime both heartbeats so an idle link does not read as a stall
        // before the first 32-frame flush.
        let now = now_unix();
        self.telemetry.beat(Direction::AToB, now);
        self.telemetry.beat(Direction::BToA, now);

        let engine_a = ForwardingEngine::new(
            ring_a,
            tx_b,
            Classifier::new(settings.clone()),
            Shaper::new(rate_mbps, capacity_frames, self.telemetry.clone(), Instant::now()),
            self.telemetry.clone(),
            Direction::AToB,
        );
        let engine_b = ForwardingEngine::new(
            ring_b,
            tx_a,
            Classifier::new(settings),
            Shaper::new(rate_mbps, capacity_frames, self.telemetry.clone(), Instant::now()),
            self.telemetry.clone(),
            Direction::BToA,
        );

        let worker_a = spawn_worker("fwd-a", bridge.core_a, engine_a, stop)?;
        let worker_b = spawn_worker("fwd-b", bridge.core_b, engine_b, stop)?;

        let led = self.config.led.as_ref().map(|led| StatusLed::new(led.red_pin, led.green_pin));
        let telemetry = self.telemetry.clone();
        let watchdog = std::thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || watchdog_loop(telemetry, led, stop))
            .map_err(crate::Error::Io)?;

        info!("bridge operational");

        let _ = worker_a.join();
        let _ = worker_b.join();
        let _ = watchdog.join();

        info!("bridge stopped");
        Ok(())
    }

    /// Override wins untouched; otherwise 90 % of the probed upstream
    /// estimate, or 90 % of a 500 Mbps assumption when no probe ran.
    fn shaper_rate_mbps(&self) -> f64 {
        if let Some(rate) = self.config.shaper.rate_mbps {
            return rate;
        }

        let probed = self.telemetry.upstream_mbps.load(Ordering::Relaxed) as f64;
        let base = if probed >= 10.0 {
            probed
        } else {
            DEFAULT_UPSTREAM_MBPS
        };
        base * 0.90
    }
}

fn spawn_worker(
    name: &str,
    core: usize,
    mut engine: ForwardingEngine,
    stop: &'static AtomicBool,
) -> Result<std::thread::JoinHandle<()>> {
    let label = name.to_string();
    std::thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            pin_to_core(core);
            set_realtime_priority();

            info!(worker = %label, core, "forwarding engine running");
            engine.run(stop);
            info!(worker = %label, "forwarding engine stopped");
        })
        .map_err(crate::Error::Io)
}

/// Pin the calling thread to one CPU. Refusal degrades, never aborts.
fn pin_to_core(core: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            warn!(
                core,
                "failed to pin thread: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

/// Request SCHED_FIFO for the calling thread. Needs CAP_SYS_NICE; refusal
/// degrades to the default policy.
fn set_realtime_priority() {
    let param = libc::sched_param {
        sched_priority: RT_PRIORITY,
    };
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        warn!(
            "failed to set SCHED_FIFO (missing CAP_SYS_NICE?): {}",
            std::io::Error::last_os_error()
        );
    }
}

/// 500 ms cadence: rate deltas for the operator, stall detection from the
/// worker heartbeats, LED state.
fn watchdog_loop(telemetry: Arc<Telemetry>, led: Option<StatusLed>, stop: &AtomicBool) {
    let mut last_pkts = 0u64;
    let mut last_bytes = 0u64;
    let mut last_tick = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(WATCHDOG_TICK);

        let cur_pkts = telemetry.forwarded_pkts();
        let cur_bytes = telemetry.forwarded_bytes();
        let drops = telemetry.dropped_pkts();

        let elapsed = last_tick.elapsed().as_secs_f64();
        let pps = ((cur_pkts - last_pkts) as f64 / elapsed) as u64;
        let mbps = (cur_bytes - last_bytes) as f64 * 8.0 / 1e6 / elapsed;
        debug!(pps, mbps = %format!("{:.2}", mbps), drops, "traffic");

        last_pkts = cur_pkts;
        last_bytes = cur_bytes;
        last_tick = Instant::now();

        if telemetry.is_probing() {
            set_led(&led, LedColor::Yellow);
            continue;
        }

        let now = now_unix();
        let stale_a = now.saturating_sub(telemetry.last_beat(Direction::AToB));
        let stale_b = now.saturating_sub(telemetry.last_beat(Direction::BToA));

        if stale_a > STALL_THRESHOLD_SECS || stale_b > STALL_THRESHOLD_SECS {
            warn!(stale_a, stale_b, "forwarding stalled");
            set_led(&led, LedColor::Red);
        } else {
            set_led(&led, LedColor::Green);
        }
    }
}

fn set_led(led: &Option<StatusLed>, color: LedColor) {
    if let Some(led) = led {
        led.set(color);
    }
}
