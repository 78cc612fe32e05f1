//! Configuration types

use crate::{Error, Result};
use serde::Deserialize;

/// User-defined configuration (fastlane.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub shaper: ShaperConfig,
    #[serde(default)]
    pub led: Option<LedConfig>,
    #[serde(default)]
    pub log: LogSection,
}

/// Interfaces to bridge and the CPU cores the two engines pin to.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_iface_a")]
    pub iface_a: String,
    #[serde(default = "default_iface_b")]
    pub iface_b: String,
    #[serde(default = "default_core_a")]
    pub core_a: usize,
    #[serde(default = "default_core_b")]
    pub core_b: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            iface_a: default_iface_a(),
            iface_b: default_iface_b(),
            core_a: default_core_a(),
            core_b: default_core_b(),
        }
    }
}

fn default_iface_a() -> String {
    "eth0".to_string()
}

fn default_iface_b() -> String {
    "eth1".to_string()
}

fn default_core_a() -> usize {
    2
}

fn default_core_b() -> usize {
    3
}

/// Heuristic classifier thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Frame size above which a frame counts as "large".
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// Large-frame count within a flow's first 50 datagrams that marks the
    /// flow as disguised bulk traffic.
    #[serde(default = "default_punish_trigger")]
    pub punish_trigger: u32,
    /// Frames classified between flow-table cleanup sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u32,
    /// UDP ports treated as game traffic. Entries are single ports
    /// ("3074") or inclusive ranges ("12000-12999").
    #[serde(default = "default_game_ports")]
    pub game_ports: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            large_threshold: default_large_threshold(),
            punish_trigger: default_punish_trigger(),
            cleanup_interval: default_cleanup_interval(),
            game_ports: default_game_ports(),
        }
    }
}

fn default_large_threshold() -> u32 {
    1000
}

fn default_punish_trigger() -> u32 {
    20
}

fn default_cleanup_interval() -> u32 {
    5000
}

fn default_game_ports() -> Vec<String> {
    vec![
        "3074".to_string(),
        "27015".to_string(),
        "12000-12999".to_string(),
    ]
}

/// Traffic shaper sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct ShaperConfig {
    /// Overrides the computed shaper rate when set.
    #[serde(default)]
    pub rate_mbps: Option<f64>,
    /// Slot count of the bounded frame queue.
    #[serde(default = "default_capacity_frames")]
    pub capacity_frames: usize,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            rate_mbps: None,
            capacity_frames: default_capacity_frames(),
        }
    }
}

fn default_capacity_frames() -> usize {
    1024
}

/// Status LED GPIO pins (sysfs numbering). LED output is disabled when
/// this section is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct LedConfig {
    pub red_pin: u32,
    pub green_pin: u32,
}

/// Logging settings ([log] section).
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Parsed game-port set: single ports plus inclusive ranges.
#[derive(Debug, Clone, Default)]
pub struct GamePorts {
    singles: Vec<u16>,
    ranges: Vec<(u16, u16)>,
}

impl GamePorts {
    /// Parse config entries like "3074" or "12000-12999".
    pub fn parse(specs: &[String]) -> Result<Self> {
        let mut singles = Vec::new();
        let mut ranges = Vec::new();

        for spec in specs {
            let spec = spec.trim();
            if let Some((low, high)) = spec.split_once('-') {
                let low: u16 = low
                    .trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port range: {}", spec)))?;
                let high: u16 = high
                    .trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port range: {}", spec)))?;
                if low > high {
                    return Err(Error::Config(format!(
                        "port range low > high: {}",
                        spec
                    )));
                }
                ranges.push((low, high));
            } else {
                let port: u16 = spec
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port: {}", spec)))?;
                singles.push(port);
            }
        }

        Ok(Self { singles, ranges })
    }

    pub fn contains(&self, port: u16) -> bool {
        self.singles.contains(&port)
            || self
                .ranges
                .iter()
                .any(|&(low, high)| port >= low && port <= high)
    }
}
