//! Heuristic traffic classifier
//!
//! Maps each frame to one of three priorities using L3/L4 heuristics and a
//! per-flow table for UDP. The table is owned by one forwarding thread and
//! never shared, so there is no locking; a bridge carries one independent
//! table per direction.
//!
//! The interesting signal is large-packet frequency early in a UDP flow's
//! life: a flow that sends mostly near-MTU datagrams within its first 50
//! packets is bulk transfer no matter what port it picked, and is demoted
//! for its remaining lifetime in the table.

use crate::config::{ClassifierConfig, GamePorts};
use crate::protocol::{ethernet, ipv4, udp};
use crate::Result;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// Flow-table entries expire this long after their last packet.
pub const FLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// The disguise heuristic only inspects a flow's first 50 datagrams.
const PUNISH_WINDOW_PKTS: u32 = 50;

/// TCP frames below this size are handshake/ACK traffic.
const SMALL_TCP_MAX: usize = 64;

/// Unclassified UDP below this size is assumed interactive.
const SMALL_DATAGRAM_MAX: usize = 256;

const DNS_PORT: u16 = 53;
const QUIC_PORT: u16 = 443;

/// Forwarding priority. Only `Normal` passes through the shaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// DNS, TCP handshake/ACK: forwarded immediately, ahead of everything.
    Critical,
    /// Game traffic, QUIC, small datagrams: fast path.
    High,
    /// Everything else: queued and rate-limited.
    Normal,
}

/// UDP flow identity. Bit-exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Per-flow statistics.
#[derive(Debug, Clone)]
pub struct FlowStats {
    pub total_pkts: u32,
    pub large_pkts: u32,
    /// Sticky: once a flow is tagged as disguised bulk it stays Normal
    /// until the entry expires.
    pub is_disguised: bool,
    pub last_seen: Instant,
}

/// Classifier thresholds. Split from `ClassifierConfig` so tests can use
/// short timeouts and cleanup intervals.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub large_threshold: usize,
    pub punish_trigger: u32,
    pub cleanup_interval: u32,
    pub idle_timeout: Duration,
    pub game_ports: GamePorts,
}

impl ClassifierSettings {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            large_threshold: config.large_threshold as usize,
            punish_trigger: config.punish_trigger,
            cleanup_interval: config.cleanup_interval,
            idle_timeout: FLOW_IDLE_TIMEOUT,
            game_ports: GamePorts::parse(&config.game_ports)?,
        })
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default()).expect("builtin defaults parse")
    }
}

/// Per-thread flow classifier. No locking anywhere.
pub struct Classifier {
    flows: HashMap<FlowKey, FlowStats>,
    process_counter: u32,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self {
            flows: HashMap::new(),
            process_counter: 0,
            settings,
        }
    }

    /// Classify one frame. `now` drives flow aging; the forwarding loop
    /// passes the current instant.
    pub fn classify(&mut self, frame: &[u8], now: Instant) -> Priority {
        self.process_counter += 1;
        if self.process_counter >= self.settings.cleanup_interval {
            self.cleanup(now);
            self.process_counter = 0;
        }

        self.classify_frame(frame, now)
    }

    fn classify_frame(&mut self, frame: &[u8], now: Instant) -> Priority {
        let eth = match ethernet::Frame::parse(frame) {
            Ok(eth) => eth,
            Err(_) => return Priority::Normal,
        };

        if eth.ethertype() != ethernet::ethertype::IPV4 {
            return Priority::Normal;
        }

        let ip = match ipv4::Ipv4Header::parse(eth.payload()) {
            Ok(ip) => ip,
            Err(_) => return Priority::Normal,
        };

        match ip.protocol() {
            ipv4::protocol::TCP => {
                // Small TCP segments are SYN/ACK/FIN/pure-ACK traffic; a
                // stalled ACK stream throttles the whole connection.
                if frame.len() < SMALL_TCP_MAX {
                    Priority::Critical
                } else {
                    Priority::Normal
                }
            }
            ipv4::protocol::UDP => self.classify_udp(&ip, frame.len(), now),
            _ => Priority::Normal,
        }
    }

    fn classify_udp(&mut self, ip: &ipv4::Ipv4Header, frame_len: usize, now: Instant) -> Priority {
        let udp = match udp::UdpHeader::parse(ip.payload()) {
            Ok(udp) => udp,
            Err(_) => return Priority::Normal,
        };

        let src_port = udp.src_port();
        let dst_port = udp.dst_port();

        // DNS bypasses the flow table entirely.
        if src_port == DNS_PORT || dst_port == DNS_PORT {
            return Priority::Critical;
        }

        // QUIC carries large packets by design; accelerate it without
        // feeding the large-packet punishment statistics.
        if src_port == QUIC_PORT || dst_port == QUIC_PORT {
            return Priority::High;
        }

        let key = FlowKey {
            src_ip: ip.src_addr(),
            dst_ip: ip.dst_addr(),
            src_port,
            dst_port,
        };

        let stats = self.flows.entry(key).or_insert_with(|| FlowStats {
            total_pkts: 0,
            large_pkts: 0,
            is_disguised: false,
            last_seen: now,
        });

        stats.total_pkts = stats.total_pkts.saturating_add(1);
        stats.last_seen = now;
        if frame_len > self.settings.large_threshold {
            stats.large_pkts = stats.large_pkts.saturating_add(1);
        }

        if !stats.is_disguised
            && stats.total_pkts < PUNISH_WINDOW_PKTS
            && stats.large_pkts > self.settings.punish_trigger
        {
            stats.is_disguised = true;
        }

        if stats.is_disguised {
            return Priority::Normal;
        }

        if self.settings.game_ports.contains(src_port) || self.settings.game_ports.contains(dst_port)
        {
            return Priority::High;
        }

        if frame_len < SMALL_DATAGRAM_MAX {
            return Priority::High;
        }

        Priority::Normal
    }

    /// Drop every flow idle longer than the timeout. Runs inline on the
    /// classifying thread every `cleanup_interval` frames.
    fn cleanup(&mut self, now: Instant) {
        let idle_timeout = self.settings.idle_timeout;
        self.flows
            .retain(|_, stats| now.duration_since(stats.last_seen) < idle_timeout);
    }

    /// Current number of tracked flows.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Entry for one flow, if tracked.
    pub fn flow(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an Ethernet+IPv4+UDP frame padded to `total_len`.
    fn udp_frame(src_port: u16, dst_port: u16, total_len: usize) -> Vec<u8> {
        assert!(total_len >= 42);
        let mut frame = vec![0u8; total_len];
        frame[12] = 0x08; // EtherType IPv4
        frame[13] = 0x00;
        frame[14] = 0x45; // version 4, IHL 5
        frame[23] = 17; // UDP
        frame[26..30].copy_from_slice(&[192, 168, 1, 10]); // src
        frame[30..34].copy_from_slice(&[203, 0, 113, 7]); // dst
        frame[34..36].copy_from_slice(&src_port.to_be_bytes());
        frame[36..38].copy_from_slice(&dst_port.to_be_bytes());
        let udp_len = (total_len - 34) as u16;
        frame[38..40].copy_from_slice(&udp_len.to_be_bytes());
        frame
    }

    /// Build an Ethernet+IPv4 TCP frame padded to `total_len`.
    fn tcp_frame(total_len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; total_len];
        frame[12] = 0x08;
        frame[13] = 0x00;
        frame[14] = 0x45;
        frame[23] = 6; // TCP
        frame
    }

    fn flow_key_of(frame: &[u8]) -> FlowKey {
        FlowKey {
            src_ip: Ipv4Addr::new(frame[26], frame[27], frame[28], frame[29]),
            dst_ip: Ipv4Addr::new(frame[30], frame[31], frame[32], frame[33]),
            src_port: u16::from_be_bytes([frame[34], frame[35]]),
            dst_port: u16::from_be_bytes([frame[36], frame[37]]),
        }
    }

    #[test]
    fn test_dns_is_critical_without_flow_entry() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let frame = udp_frame(54321, 53, 74);

        assert_eq!(
            classifier.classify(&frame, Instant::now()),
            Priority::Critical
        );
        assert_eq!(classifier.flow_count(), 0);
    }

    #[test]
    fn test_small_tcp_is_critical() {
        let mut classifier = Classifier::new(ClassifierSettings::default());

        assert_eq!(
            classifier.classify(&tcp_frame(60), Instant::now()),
            Priority::Critical
        );
        // Full-size TCP segments are bulk.
        assert_eq!(
            classifier.classify(&tcp_frame(1400), Instant::now()),
            Priority::Normal
        );
    }

    #[test]
    fn test_quic_is_high_without_punish_stats() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let frame = udp_frame(443, 60000, 1400);

        assert_eq!(classifier.classify(&frame, Instant::now()), Priority::High);

        let key = flow_key_of(&frame);
        match classifier.flow(&key) {
            None => {}
            Some(stats) => assert_eq!(stats.large_pkts, 0),
        }
    }

    #[test]
    fn test_disguised_flow_is_demoted_and_sticky() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let now = Instant::now();
        let large = udp_frame(40000, 50000, 1200);

        // Frames 1..=20 stay Normal (large datagrams on unknown ports) but
        // are not yet disguised.
        for _ in 0..20 {
            assert_eq!(classifier.classify(&large, now), Priority::Normal);
        }
        let key = flow_key_of(&large);
        assert!(!classifier.flow(&key).unwrap().is_disguised);

        // 21st large frame crosses the punish trigger.
        assert_eq!(classifier.classify(&large, now), Priority::Normal);
        assert!(classifier.flow(&key).unwrap().is_disguised);

        // A small frame on the same key would otherwise be High; the tag
        // is sticky.
        let small = udp_frame(40000, 50000, 100);
        assert_eq!(classifier.classify(&small, now), Priority::Normal);
    }

    #[test]
    fn test_game_port_allowlist_until_disguised() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let now = Instant::now();

        let small = udp_frame(55555, 3074, 120);
        assert_eq!(classifier.classify(&small, now), Priority::High);

        // 20 large frames keep the game-port privilege...
        let large = udp_frame(55555, 3074, 1200);
        for _ in 0..20 {
            assert_eq!(classifier.classify(&large, now), Priority::High);
        }
        // ...the 21st large frame reveals a bulk flow hiding on a game port.
        assert_eq!(classifier.classify(&large, now), Priority::Normal);
        assert_eq!(classifier.classify(&small, now), Priority::Normal);
    }

    #[test]
    fn test_unknown_small_datagram_is_high() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let frame = udp_frame(50001, 50002, 200);

        assert_eq!(classifier.classify(&frame, Instant::now()), Priority::High);
    }

    #[test]
    fn test_unknown_large_datagram_is_normal() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let frame = udp_frame(50001, 50002, 800);

        assert_eq!(
            classifier.classify(&frame, Instant::now()),
            Priority::Normal
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let now = Instant::now();
        let frame = udp_frame(55555, 12500, 120);

        let first = classifier.classify(&frame, now);
        let second = classifier.classify(&frame, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_frames_fall_through_to_normal() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let now = Instant::now();

        // Runt frame.
        assert_eq!(classifier.classify(&[0u8; 10], now), Priority::Normal);

        // Non-IPv4 ethertype.
        let mut arp = vec![0u8; 60];
        arp[12] = 0x08;
        arp[13] = 0x06;
        assert_eq!(classifier.classify(&arp, now), Priority::Normal);

        // IPv4 claimed but header truncated.
        let mut truncated = vec![0u8; 20];
        truncated[12] = 0x08;
        truncated[14] = 0x45;
        assert_eq!(classifier.classify(&truncated, now), Priority::Normal);

        // UDP claimed but no UDP header bytes.
        let mut no_udp = udp_frame(40000, 50000, 42);
        no_udp.truncate(36);
        assert_eq!(classifier.classify(&no_udp, now), Priority::Normal);
    }

    #[test]
    fn test_large_threshold_is_strict() {
        let mut classifier = Classifier::new(ClassifierSettings::default());
        let now = Instant::now();

        // Exactly at the threshold does not count as large.
        let at_threshold = udp_frame(40000, 50000, 1000);
        classifier.classify(&at_threshold, now);
        let key = flow_key_of(&at_threshold);
        assert_eq!(classifier.flow(&key).unwrap().large_pkts, 0);

        let above = udp_frame(40000, 50000, 1001);
        classifier.classify(&above, now);
        assert_eq!(classifier.flow(&key).unwrap().large_pkts, 1);
    }

    #[test]
    fn test_cleanup_expires_idle_flows() {
        let settings = ClassifierSettings {
            cleanup_interval: 1, // sweep on every frame
            ..ClassifierSettings::default()
        };
        let mut classifier = Classifier::new(settings);
        let t0 = Instant::now();

        // Disguise a flow.
        let large = udp_frame(40000, 50000, 1200);
        for _ in 0..21 {
            classifier.classify(&large, t0);
        }
        let small = udp_frame(40000, 50000, 100);
        assert_eq!(classifier.classify(&small, t0), Priority::Normal);

        // 31 simulated seconds later the entry has expired and the flow
        // starts over.
        let later = t0 + Duration::from_secs(31);
        assert_eq!(classifier.classify(&small, later), Priority::High);

        let key = flow_key_of(&small);
        assert_eq!(classifier.flow(&key).unwrap().total_pkts, 1);
    }

    #[test]
    fn test_cleanup_keeps_active_flows() {
        let settings = ClassifierSettings {
            cleanup_interval: 1,
            ..ClassifierSettings::default()
        };
        let mut classifier = Classifier::new(settings);
        let t0 = Instant::now();

        let frame = udp_frame(40000, 50000, 300);
        classifier.classify(&frame, t0);
        classifier.classify(&frame, t0 + Duration::from_secs(20));
        classifier.classify(&frame, t0 + Duration::from_secs(40));

        // Touched every 20s, never idle for 30s: entry survives with full
        // history.
        let key = flow_key_of(&frame);
        assert_eq!(classifier.flow(&key).unwrap().total_pkts, 3);
    }
}
