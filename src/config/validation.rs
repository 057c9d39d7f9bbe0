//! Configuration validation

use super::Config;
use crate::telemetry::is_known_format;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_controller(config, &mut result);
    validate_logging(config, &mut result);
    validate_gateways(config, &mut result);
    validate_speaker(config, &mut result);

    result
}

fn validate_controller(config: &Config, result: &mut ValidationResult) {
    if config.controller.queue_depth == 0 {
        result.error("controller.queue_depth: must be at least 1");
    }

    if config.network.internal.is_empty() {
        result.warn("network.internal: no internal networks, every destination is external");
        return;
    }

    let ip = config.controller.ip;
    if !config.network.internal.iter().any(|net| net.contains(&ip)) {
        result.warn(format!(
            "controller.ip: {} is outside every internal network",
            ip
        ));
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    if !is_known_format(&config.logging.format) {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            config.logging.format
        ));
    }
}

fn validate_gateways(config: &Config, result: &mut ValidationResult) {
    let mut peers = HashSet::new();
    for (i, gateway) in config.gateways.iter().enumerate() {
        if !peers.insert(gateway.peer_controller) {
            result.error(format!(
                "gateways[{}]: peer_controller {} is already used by another gateway",
                i, gateway.peer_controller
            ));
        }

        if let Some(net) = config
            .network
            .internal
            .iter()
            .find(|net| net.contains(&gateway.peer_controller))
        {
            result.warn(format!(
                "gateways[{}]: peer_controller {} is inside internal network {}",
                i, gateway.peer_controller, net
            ));
        }
    }
}

fn validate_speaker(config: &Config, result: &mut ValidationResult) {
    let Some(speaker) = &config.speaker else {
        return;
    };

    let mut seen = HashSet::new();
    for (i, neighbor) in speaker.neighbors.iter().enumerate() {
        if !seen.insert(neighbor.address) {
            result.error(format!(
                "speaker.neighbors[{}]: duplicate neighbor {}",
                i, neighbor.address
            ));
        }

        if !config
            .gateways
            .iter()
            .any(|g| g.peer_controller == neighbor.address)
        {
            result.warn(format!(
                "speaker.neighbors[{}]: no gateway for {}, its routes will be dropped",
                i, neighbor.address
            ));
        }
    }
}
