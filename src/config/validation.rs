//! Configuration validation

use super::{Config, GamePorts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One validation finding.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Ordered list of findings from a validation pass. Warnings let startup
/// proceed; any error stops it.
#[derive(Debug, Default)]
pub struct ValidationResult {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_diagnostics(&self) {
        for d in &self.diagnostics {
            let tag = match d.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            eprintln!("{}: {}", tag, d.message);
        }
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_bridge(config, &mut result);
    validate_classifier(config, &mut result);
    validate_shaper(config, &mut result);

    result
}

fn validate_bridge(config: &Config, result: &mut ValidationResult) {
    let bridge = &config.bridge;

    if bridge.iface_a.is_empty() || bridge.iface_b.is_empty() {
        result.push(
            Severity::Error,
            "bridge: interface names must not be empty",
        );
    }

    if bridge.iface_a == bridge.iface_b {
        result.push(
            Severity::Error,
            format!("bridge: iface_a and iface_b are both {}", bridge.iface_a),
        );
    }

    if bridge.core_a == bridge.core_b {
        result.push(
            Severity::Warning,
            format!(
                "bridge: both engines pinned to core {}, they will contend",
                bridge.core_a
            ),
        );
    }
}

fn validate_classifier(config: &Config, result: &mut ValidationResult) {
    let classifier = &config.classifier;

    if let Err(e) = GamePorts::parse(&classifier.game_ports) {
        result.push(Severity::Error, format!("classifier.game_ports: {}", e));
    }

    // The punish window only inspects a flow's first 50 datagrams.
    if classifier.punish_trigger >= 50 {
        result.push(
            Severity::Warning,
            format!(
                "classifier.punish_trigger {} can never fire within the 50-frame window",
                classifier.punish_trigger
            ),
        );
    }

    if classifier.cleanup_interval == 0 {
        result.push(
            Severity::Error,
            "classifier.cleanup_interval must be at least 1",
        );
    }

    if classifier.large_threshold as usize > crate::dataplane::SLOT_PAYLOAD_SIZE {
        result.push(
            Severity::Warning,
            format!(
                "classifier.large_threshold {} exceeds the maximum frame size",
                classifier.large_threshold
            ),
        );
    }
}

fn validate_shaper(config: &Config, result: &mut ValidationResult) {
    let shaper = &config.shaper;

    if let Some(rate) = shaper.rate_mbps {
        if rate <= 0.0 {
            result.push(
                Severity::Error,
                format!("shaper.rate_mbps must be positive, got {}", rate),
            );
        }
    }

    if shaper.capacity_frames == 0 {
        result.push(Severity::Error, "shaper.capacity_frames must be at least 1");
    }
}
