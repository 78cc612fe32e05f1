//! Forwarding logic
//!
//! The per-direction data path: heuristic flow classification, token-bucket
//! shaping of bulk traffic, the forwarding loop, and the supervisor that
//! pins one engine per direction to a dedicated core.

mod classifier;
mod engine;
mod queue;
mod shaper;
mod supervisor;
mod token_bucket;

pub use classifier::{Classifier, ClassifierSettings, FlowKey, FlowStats, Priority};
pub use engine::ForwardingEngine;
pub use queue::{BoundedFrameQueue, SLOT_PAYLOAD_SIZE};
pub use shaper::Shaper;
pub use supervisor::Supervisor;
pub use token_bucket::TokenBucket;
