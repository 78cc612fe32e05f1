//! Process-wide forwarding statistics.
//!
//! One `Telemetry` value is created before any worker starts and shared by
//! reference with both forwarding engines; the watchdog is the only reader.
//! All counters use relaxed ordering: the watchdog tolerates approximate
//! values, and nothing on the data path may wait.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Bridge direction. Each direction has its own engine, flow table and
/// heartbeat slot; the two never share mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// iface_a -> iface_b
    AToB,
    /// iface_b -> iface_a
    BToA,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::AToB => "a->b",
            Direction::BToA => "b->a",
        }
    }
}

/// Process-wide forwarding statistics and liveness signals.
#[derive(Debug, Default)]
pub struct Telemetry {
    forwarded_pkts: AtomicU64,
    forwarded_bytes: AtomicU64,
    dropped_pkts: AtomicU64,

    /// Unix-seconds heartbeat per direction, stored by the engines on
    /// their periodic flush and read only by the watchdog.
    heartbeat_a: AtomicU64,
    heartbeat_b: AtomicU64,

    /// Interface points for the external probe subsystem.
    pub probing: AtomicBool,
    /// Measured upstream bandwidth in whole Mbps; 0 means "no estimate".
    pub upstream_mbps: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a batch of forwarded frames. Engines accumulate locally and
    /// call this every 32 frames, keeping atomics off the per-frame path.
    pub fn record_forwarded(&self, pkts: u64, bytes: u64) {
        self.forwarded_pkts.fetch_add(pkts, Ordering::Relaxed);
        self.forwarded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count one lost frame: queue overflow or a refused non-blocking
    /// send. Losses are telemetry, never errors.
    pub fn record_drop(&self) {
        self.dropped_pkts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forwarded_pkts(&self) -> u64 {
        self.forwarded_pkts.load(Ordering::Relaxed)
    }

    pub fn forwarded_bytes(&self) -> u64 {
        self.forwarded_bytes.load(Ordering::Relaxed)
    }

    pub fn dropped_pkts(&self) -> u64 {
        self.dropped_pkts.load(Ordering::Relaxed)
    }

    /// Stores a heartbeat timestamp for one direction.
    pub fn beat(&self, dir: Direction, unix_secs: u64) {
        self.heartbeat_slot(dir).store(unix_secs, Ordering::Relaxed);
    }

    /// Reads the last heartbeat for one direction.
    pub fn last_beat(&self, dir: Direction) -> u64 {
        self.heartbeat_slot(dir).load(Ordering::Relaxed)
    }

    fn heartbeat_slot(&self, dir: Direction) -> &AtomicU64 {
        match dir {
            Direction::AToB => &self.heartbeat_a,
            Direction::BToA => &self.heartbeat_b,
        }
    }

    pub fn is_probing(&self) -> bool {
        self.probing.load(Ordering::Relaxed)
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
