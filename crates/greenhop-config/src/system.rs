//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use greenhop_core::DecisionPolicy;
use greenhop_core::job::DEFAULT_REGION;
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// System-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    /// Decision thresholds and the delay window.
    pub policy: DecisionPolicy,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the API listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between scheduler ticks.
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
        }
    }
}

/// Upstream carbon-intensity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Fixed table from the config file.
    Static,
    WattTime,
    ElectricityMap,
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "static" | "mock" => Ok(ProviderKind::Static),
            "watttime" => Ok(ProviderKind::WattTime),
            "electricitymap" => Ok(ProviderKind::ElectricityMap),
            other => Err(ConfigError::invalid(
                "telemetry provider",
                format!("unknown provider: {}", other),
            )),
        }
    }
}

impl ProviderKind {
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Static => None,
            ProviderKind::WattTime => Some("https://api2.watttime.org"),
            ProviderKind::ElectricityMap => Some("https://api.electricitymap.org"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub provider: ProviderKind,
    /// Region whose samples feed the rolling history.
    pub local_region: String,
    /// Regions considered for ranking and hops.
    pub regions: Vec<String>,
    /// Upper bound on a single upstream fetch.
    pub timeout: Duration,
    /// Intensity assumed when a region has never answered (gCO2/kWh).
    pub fallback_intensity: f64,
    /// Capacity of the rolling history.
    pub history_capacity: usize,
    /// Base URL of the upstream API. Provider default when unset.
    pub url: Option<Url>,
    /// Intensities served by the static provider.
    pub static_intensities: BTreeMap<String, f64>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let regions: Vec<String> = [
            DEFAULT_REGION,
            "ERCOT_ALL",
            "ISONE_ALL",
            "NYISO_NYC",
            "PJM_ALL",
            "NO1",
        ]
        .iter()
        .map(|r| r.to_string())
        .collect();

        let static_intensities = [
            (DEFAULT_REGION, 150.0),
            ("ERCOT_ALL", 400.0),
            ("ISONE_ALL", 250.0),
            ("NYISO_NYC", 300.0),
            ("PJM_ALL", 300.0),
            ("NO1", 20.0),
        ]
        .iter()
        .map(|(r, i)| (r.to_string(), *i))
        .collect();

        Self {
            provider: ProviderKind::Static,
            local_region: DEFAULT_REGION.to_string(),
            regions,
            timeout: Duration::from_secs(2),
            fallback_intensity: 300.0,
            history_capacity: 24,
            url: None,
            static_intensities,
        }
    }
}

impl TelemetryConfig {
    /// Configured URL, or the provider's public endpoint.
    pub fn base_url(&self) -> Option<Url> {
        self.url.clone().or_else(|| {
            self.provider
                .default_url()
                .and_then(|u| Url::parse(u).ok())
        })
    }
}

/// Load configuration from a KDL file. A missing file yields the defaults.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<SystemConfig> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => parse_system_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SystemConfig::default()),
        Err(e) => Err(e.into()),
    }
}

/// Parse system configuration from KDL text.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "server" => parse_server(node, &mut config.server)?,
            "scheduler" => parse_scheduler(node, &mut config)?,
            "thresholds" => parse_thresholds(node, &mut config.policy)?,
            "telemetry" => parse_telemetry(node, &mut config.telemetry)?,
            _ => {} // Ignore unknown nodes
        }
    }

    validate(&config)?;
    Ok(config)
}

fn parse_server(node: &KdlNode, server: &mut ServerConfig) -> ConfigResult<()> {
    for child in children(node) {
        if child.name().value() == "bind" {
            server.bind = get_first_string_arg(child)
                .ok_or_else(|| ConfigError::MissingField("server bind".to_string()))?;
        }
    }
    Ok(())
}

fn parse_scheduler(node: &KdlNode, config: &mut SystemConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "tick-interval-secs" => {
                let secs = require_positive(child, "tick-interval-secs")?;
                config.scheduler.tick_interval = std_duration(secs, "tick-interval-secs")?;
            }
            "delay-window-secs" => {
                let secs = require_positive(child, "delay-window-secs")?;
                config.policy.delay_window = chrono_duration(secs, "delay-window-secs")?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_thresholds(node: &KdlNode, policy: &mut DecisionPolicy) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "low" => policy.low_threshold = require_non_negative(child, "low")?,
            "medium" => policy.medium_threshold = require_non_negative(child, "medium")?,
            "high-priority-bypass" => {
                policy.high_priority_bypass = require_non_negative(child, "high-priority-bypass")?
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_telemetry(node: &KdlNode, telemetry: &mut TelemetryConfig) -> ConfigResult<()> {
    for child in children(node) {
        match child.name().value() {
            "provider" => {
                telemetry.provider = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("telemetry provider".to_string()))?
                    .parse()?;
            }
            "local-region" => {
                telemetry.local_region = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("local-region".to_string()))?;
            }
            "regions" => telemetry.regions = get_all_string_args(child),
            "timeout-ms" => {
                let ms = require_positive(child, "timeout-ms")?;
                telemetry.timeout = std_duration(ms / 1000.0, "timeout-ms")?;
            }
            "fallback-intensity" => {
                telemetry.fallback_intensity = require_non_negative(child, "fallback-intensity")?;
            }
            "history-capacity" => {
                let capacity = require_positive(child, "history-capacity")?;
                if capacity.fract() != 0.0 || capacity > u32::MAX as f64 {
                    return Err(ConfigError::invalid(
                        "history-capacity",
                        format!("{} is not a valid sample count", capacity),
                    ));
                }
                telemetry.history_capacity = capacity as usize;
            }
            "url" => {
                let raw = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("telemetry url".to_string()))?;
                let url = Url::parse(&raw)
                    .map_err(|e| ConfigError::invalid("telemetry url", e.to_string()))?;
                telemetry.url = Some(url);
            }
            "static" => {
                telemetry.static_intensities = parse_static_table(child)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_static_table(node: &KdlNode) -> ConfigResult<BTreeMap<String, f64>> {
    let mut table = BTreeMap::new();
    for child in children(node) {
        if child.name().value() != "region" {
            continue;
        }
        let region = get_first_string_arg(child)
            .ok_or_else(|| ConfigError::MissingField("static region name".to_string()))?;
        let intensity = get_first_number_arg(child)
            .ok_or_else(|| ConfigError::MissingField(format!("intensity for '{}'", region)))?;
        if intensity < 0.0 {
            return Err(ConfigError::invalid(
                "static region",
                format!("'{}' has negative intensity {}", region, intensity),
            ));
        }
        table.insert(region, intensity);
    }
    Ok(table)
}

fn validate(config: &SystemConfig) -> ConfigResult<()> {
    let policy = &config.policy;
    if policy.low_threshold > policy.medium_threshold {
        return Err(ConfigError::invalid(
            "thresholds",
            format!(
                "low ({}) must not exceed medium ({})",
                policy.low_threshold, policy.medium_threshold
            ),
        ));
    }

    let telemetry = &config.telemetry;
    if telemetry.regions.is_empty() {
        return Err(ConfigError::MissingField("telemetry regions".to_string()));
    }
    if !telemetry.regions.contains(&telemetry.local_region) {
        return Err(ConfigError::invalid(
            "local-region",
            format!("'{}' is not in the region list", telemetry.local_region),
        ));
    }

    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn children(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|c| c.nodes().iter())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .find_map(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_first_number_arg(node: &KdlNode) -> Option<f64> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .find_map(|e| {
            let value = e.value();
            value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
        })
}

fn require_non_negative(node: &KdlNode, field: &str) -> ConfigResult<f64> {
    let value = get_first_number_arg(node)
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
    if !value.is_finite() {
        return Err(ConfigError::invalid(field, format!("{} is not a finite number", value)));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(field, format!("{} is negative", value)));
    }
    Ok(value)
}

fn require_positive(node: &KdlNode, field: &str) -> ConfigResult<f64> {
    let value = require_non_negative(node, field)?;
    if value == 0.0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

fn std_duration(secs: f64, field: &str) -> ConfigResult<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::invalid(field, format!("{} seconds: {}", secs, e)))
}

fn chrono_duration(secs: f64, field: &str) -> ConfigResult<chrono::Duration> {
    let ms = (secs * 1000.0).round();
    if ms >= i64::MAX as f64 {
        return Err(ConfigError::invalid(field, format!("{} seconds is too long", secs)));
    }
    chrono::Duration::try_milliseconds(ms as i64)
        .ok_or_else(|| ConfigError::invalid(field, format!("{} seconds is too long", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            server {
                bind "127.0.0.1:9000"
            }

            scheduler {
                tick-interval-secs 1
                delay-window-secs 30
            }

            thresholds {
                low 100
                medium 180.5
                high-priority-bypass 150
            }

            telemetry {
                provider "watttime"
                local-region "NO1"
                regions "NO1" "PJM_ALL"
                timeout-ms 500
                fallback-intensity 250
                history-capacity 48
            }
        "#;

        let config = parse_system_config(kdl).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.scheduler.tick_interval, Duration::from_secs(1));
        assert_eq!(config.policy.delay_window, chrono::Duration::seconds(30));
        assert_eq!(config.policy.low_threshold, 100.0);
        assert_eq!(config.policy.medium_threshold, 180.5);
        assert_eq!(config.policy.high_priority_bypass, 150.0);
        assert_eq!(config.telemetry.provider, ProviderKind::WattTime);
        assert_eq!(config.telemetry.regions, vec!["NO1", "PJM_ALL"]);
        assert_eq!(config.telemetry.timeout, Duration::from_millis(500));
        assert_eq!(config.telemetry.history_capacity, 48);
        assert_eq!(
            config.telemetry.base_url().unwrap().as_str(),
            "https://api2.watttime.org/"
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_system_config("").unwrap();
        assert_eq!(config.policy, DecisionPolicy::default());
        assert_eq!(config.scheduler.tick_interval, Duration::from_secs(5));
        assert_eq!(config.telemetry.history_capacity, 24);
        assert_eq!(config.telemetry.provider, ProviderKind::Static);
        assert_eq!(config.telemetry.static_intensities.get("NO1"), Some(&20.0));
    }

    #[test]
    fn test_parse_static_table() {
        let kdl = r#"
            telemetry {
                local-region "HOME"
                regions "HOME" "WIND"
                static {
                    region "HOME" 250
                    region "WIND" 30.5
                }
            }
        "#;

        let config = parse_system_config(kdl).unwrap();
        let table = &config.telemetry.static_intensities;
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("WIND"), Some(&30.5));
    }

    #[test]
    fn test_reject_unknown_provider() {
        let kdl = r#"telemetry { provider "carrier-pigeon"; }"#;
        assert!(matches!(
            parse_system_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_reject_inverted_thresholds() {
        let kdl = r#"thresholds { low 250; medium 200; }"#;
        assert!(matches!(
            parse_system_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_reject_local_region_outside_list() {
        let kdl = r#"telemetry { local-region "MARS"; }"#;
        assert!(parse_system_config(kdl).is_err());
    }

    #[test]
    fn test_reject_zero_capacity() {
        let kdl = r#"telemetry { history-capacity 0; }"#;
        assert!(parse_system_config(kdl).is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load("/nonexistent/greenhop.kdl").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_reject_non_finite_numbers() {
        for kdl in [
            "scheduler { tick-interval-secs #inf; }",
            "scheduler { delay-window-secs #nan; }",
            "telemetry { timeout-ms #nan; }",
            "telemetry { fallback-intensity #inf; }",
            "thresholds { low #-inf; }",
        ] {
            assert!(
                matches!(
                    parse_system_config(kdl).unwrap_err(),
                    ConfigError::InvalidValue { .. }
                ),
                "accepted {}",
                kdl
            );
        }
    }

    #[test]
    fn test_reject_durations_out_of_range() {
        for kdl in [
            "scheduler { delay-window-secs 1e17; }",
            "scheduler { tick-interval-secs 1e300; }",
            "telemetry { timeout-ms 1e300; }",
        ] {
            assert!(
                matches!(
                    parse_system_config(kdl).unwrap_err(),
                    ConfigError::InvalidValue { .. }
                ),
                "accepted {}",
                kdl
            );
        }
    }

    #[test]
    fn test_reject_fractional_capacity() {
        let kdl = r#"telemetry { history-capacity 2.5; }"#;
        assert!(parse_system_config(kdl).is_err());
    }
}
