//! Per-direction forwarding loop
//!
//! Drains one receive ring in a tight cooperative loop: classify, forward
//! fast-path frames immediately, queue bulk frames into the shaper, release
//! the ring slot, and drain the shaper on every iteration. Nothing on this
//! path blocks; an empty ring costs one CPU pause hint.

use crate::capture::{FrameTx, RxRing, TxSink};
use crate::dataplane::{Classifier, Priority, Shaper};
use crate::telemetry::{now_unix, Direction, Telemetry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Frames between telemetry/heartbeat flushes. Local accumulation keeps
/// cross-core atomic traffic off the per-frame path.
const FLUSH_INTERVAL: u64 = 32;

/// Route one classified frame: fast path for Critical/High, shaper queue
/// for Normal. Returns the priority for the caller's accounting.
fn dispatch<T: FrameTx>(
    frame: &[u8],
    classifier: &mut Classifier,
    shaper: &mut Shaper,
    tx: &mut T,
    telemetry: &Telemetry,
    now: Instant,
) -> Priority {
    let priority = classifier.classify(frame, now);

    match priority {
        Priority::Critical | Priority::High => {
            if !tx.send_frame(frame) {
                telemetry.record_drop();
            }
        }
        Priority::Normal => shaper.enqueue_normal(frame),
    }

    priority
}

/// One direction of the bridge.
pub struct ForwardingEngine {
    rx: RxRing,
    tx: TxSink,
    classifier: Classifier,
    shaper: Shaper,
    telemetry: Arc<Telemetry>,
    direction: Direction,
}

impl ForwardingEngine {
    pub fn new(
        rx: RxRing,
        tx: TxSink,
        classifier: Classifier,
        shaper: Shaper,
        telemetry: Arc<Telemetry>,
        direction: Direction,
    ) -> Self {
        Self {
            rx,
            tx,
            classifier,
            shaper,
            telemetry,
            direction,
        }
    }

    /// Run until the stop flag is raised.
    pub fn run(&mut self, stop: &AtomicBool) {
        let mut local_pkts: u64 = 0;
        let mut local_bytes: u64 = 0;

        while !stop.load(Ordering::Relaxed) {
            if let Some(frame) = self.rx.next_ready() {
                let now = Instant::now();
                dispatch(
                    frame,
                    &mut self.classifier,
                    &mut self.shaper,
                    &mut self.tx,
                    &self.telemetry,
                    now,
                );

                local_pkts += 1;
                local_bytes += frame.len() as u64;
                if local_pkts == FLUSH_INTERVAL {
                    self.telemetry.record_forwarded(local_pkts, local_bytes);
                    self.telemetry.beat(self.direction, now_unix());
                    local_pkts = 0;
                    local_bytes = 0;
                }

                self.rx.release();
            } else {
                std::hint::spin_loop();
            }

            // Unconditional: the queue must keep draining while the link
            // is quiet, not only while new frames arrive.
            self.shaper.drain(&mut self.tx, Instant::now());
        }

        if local_pkts > 0 {
            self.telemetry.record_forwarded(local_pkts, local_bytes);
        }
    }
}
