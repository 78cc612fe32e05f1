//! Kernel packet I/O
//!
//! RX side maps a PACKET_RX_RING shared with the kernel; TX side is a raw
//! socket with non-blocking sends. Neither direction ever blocks the
//! forwarding loop.

mod ring;
mod tx;

pub use ring::{RingConfig, RxRing};
pub use tx::TxSink;

/// Frame transmit seam.
///
/// The forwarding engine and the shaper only need "submit one frame, tell
/// me if it was accepted"; tests substitute an in-memory sink.
pub trait FrameTx {
    /// Submit one frame. Returns false when the frame was dropped
    /// (kernel buffer full, send refused).
    fn send_frame(&mut self, frame: &[u8]) -> bool;
}
