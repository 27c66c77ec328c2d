use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::harness::{EventFilter, GateRule, MeasurementPlan, UnitDomain};
use crate::probe::{EventKind, StackPolicy};
use crate::session::SourceSpec;
use crate::workload::{SimProfile, SocketRoundTrip};

/// Top-level scenario configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Workload driver configuration.
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Warm-up/measurement protocol configuration.
    #[serde(default)]
    pub measurement: MeasurementConfig,

    /// Event sources enabled for the session.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Predicates applied to the captured stream before reduction.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Regression gates applied to the reduced aggregate. Empty means a
    /// baseline run: measure and report without failing.
    #[serde(default)]
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub gates: Vec<GateConfig>,
}

/// Workload driver mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadMode {
    /// Drive an HTTP service, one GET per unit.
    Http,
    /// Drive the built-in simulated service.
    #[default]
    Simulated,
}

/// Workload driver configuration.
#[derive(Debug, Deserialize)]
pub struct WorkloadConfig {
    /// Driver mode. Default: simulated.
    #[serde(default)]
    pub mode: WorkloadMode,

    /// HTTP endpoint, e.g. "http://localhost:8081/todo". Required in http
    /// mode.
    #[serde(default)]
    pub endpoint: String,

    /// Path prefix inserted before the unit id, e.g. "with-io-regression/"
    /// to target a deliberately regressed route.
    #[serde(default)]
    pub path_prefix: String,

    /// Per-request timeout. Default: 10s.
    #[serde(default = "default_workload_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Simulated worker thread count. Default: 2.
    #[serde(default = "default_sim_workers")]
    pub workers: usize,

    /// What each simulated unit emits.
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

/// Event emission profile for one simulated unit of work.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedConfig {
    /// In-buffer allocation events per unit, one per listed buffer size.
    #[serde(default)]
    pub alloc_buffer_sizes: Vec<u64>,

    /// Outside-buffer allocation events per unit, one per listed size.
    #[serde(default)]
    pub alloc_outside_sizes: Vec<u64>,

    /// Socket round trips per unit against `remote_port`.
    #[serde(default)]
    pub socket_round_trips: Vec<SocketRoundTripConfig>,

    /// Remote port for all simulated socket events. Default: 5432.
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
}

/// One simulated request/response exchange.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SocketRoundTripConfig {
    pub request_bytes: u64,
    pub response_bytes: u64,
}

/// Warm-up/measurement protocol configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MeasurementConfig {
    /// Warm-up units driven and discarded. Default: 20000.
    #[serde(default = "default_warmup_units")]
    pub warmup_units: u64,

    /// Measured units; the divisor for per-unit values. Default: 10000.
    #[serde(default = "default_measured_units")]
    pub measured_units: u64,

    /// Inclusive lower bound of the unit id domain. Default: 1.
    #[serde(default = "default_unit_id_min")]
    pub unit_id_min: u64,

    /// Inclusive upper bound of the unit id domain. Default: 20.
    #[serde(default = "default_unit_id_max")]
    pub unit_id_max: u64,

    /// Capture events during warm-up. Default: false.
    #[serde(default)]
    pub capture_warmup: bool,
}

/// One configured event source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Event kind label, e.g. "socket_read".
    pub kind: String,

    /// Whether this source is enabled. Default: true. A disabled entry is
    /// validated but contributes nothing to the session.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Source-side suppression threshold; 0 captures everything.
    #[serde(default)]
    pub threshold: i64,

    /// Stack capture policy: "omitted" or "captured". Default: omitted.
    #[serde(default = "default_stack_policy")]
    pub stack_policy: String,
}

/// Stream predicates, combined conjunctively.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Match records of any of these kinds. Empty matches all kinds.
    #[serde(default)]
    pub kinds: Vec<String>,

    /// Match records produced on threads whose name starts with any of
    /// these prefixes. Empty matches all threads.
    #[serde(default)]
    pub thread_prefixes: Vec<String>,

    /// Match socket records against this remote port.
    #[serde(default)]
    pub remote_port: Option<u16>,
}

/// One regression gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateConfig {
    /// Passes iff the per-unit cost is strictly below the limit.
    MeanBelow(u64),
    /// Passes iff the per-unit event count equals the expected value.
    CountPerUnit(u64),
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workload_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_sim_workers() -> usize {
    2
}

fn default_remote_port() -> u16 {
    5432
}

fn default_warmup_units() -> u64 {
    20_000
}

fn default_measured_units() -> u64 {
    10_000
}

fn default_unit_id_min() -> u64 {
    1
}

fn default_unit_id_max() -> u64 {
    20
}

fn default_stack_policy() -> String {
    "omitted".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workload: WorkloadConfig::default(),
            measurement: MeasurementConfig::default(),
            sources: Vec::new(),
            filter: FilterConfig::default(),
            gates: Vec::new(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            mode: WorkloadMode::default(),
            endpoint: String::new(),
            path_prefix: String::new(),
            timeout: default_workload_timeout(),
            workers: default_sim_workers(),
            simulated: SimulatedConfig::default(),
        }
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            alloc_buffer_sizes: Vec::new(),
            alloc_outside_sizes: Vec::new(),
            socket_round_trips: Vec::new(),
            remote_port: default_remote_port(),
        }
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            warmup_units: default_warmup_units(),
            measured_units: default_measured_units(),
            unit_id_min: default_unit_id_min(),
            unit_id_max: default_unit_id_max(),
            capture_warmup: false,
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.measurement.measured_units == 0 {
            bail!("measurement.measured_units must be positive");
        }

        if self.measurement.unit_id_min > self.measurement.unit_id_max {
            bail!(
                "measurement.unit_id_min ({}) must not exceed unit_id_max ({})",
                self.measurement.unit_id_min,
                self.measurement.unit_id_max,
            );
        }

        if !self.sources.iter().any(|s| s.enabled) {
            bail!("at least one event source must be enabled");
        }

        let mut seen_kinds = HashSet::new();
        for source in &self.sources {
            let kind = EventKind::from_name(&source.kind)
                .with_context(|| format!("unknown event source kind: {}", source.kind))?;

            if source.threshold < 0 {
                bail!(
                    "threshold for {} must be >= 0, got {}",
                    source.kind,
                    source.threshold,
                );
            }

            if StackPolicy::from_name(&source.stack_policy).is_none() {
                bail!(
                    "unknown stack policy for {}: {}",
                    source.kind,
                    source.stack_policy,
                );
            }

            if !seen_kinds.insert(kind) {
                bail!("event source appears more than once: {}", source.kind);
            }
        }

        for kind in &self.filter.kinds {
            if EventKind::from_name(kind).is_none() {
                bail!("unknown event kind in filter: {kind}");
            }
        }

        for gate in &self.gates {
            if let GateConfig::MeanBelow(0) = gate {
                bail!("mean_below gate limit must be positive");
            }
        }

        match self.workload.mode {
            WorkloadMode::Http => {
                if self.workload.endpoint.is_empty() {
                    bail!("workload.endpoint is required in http mode");
                }
                if self.workload.timeout.is_zero() {
                    bail!("workload.timeout must be positive");
                }
            }
            WorkloadMode::Simulated => {
                if self.workload.workers == 0 {
                    bail!("workload.workers must be positive in simulated mode");
                }
            }
        }

        Ok(())
    }

    /// Builds the validated source specs for session configuration,
    /// skipping disabled entries.
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources
            .iter()
            .filter(|source| source.enabled)
            .filter_map(|source| {
                let kind = EventKind::from_name(&source.kind)?;
                let stack_policy = StackPolicy::from_name(&source.stack_policy)?;
                Some(SourceSpec {
                    kind,
                    threshold: source.threshold,
                    stack_policy,
                })
            })
            .collect()
    }

    /// Builds the stream filter.
    pub fn event_filter(&self) -> EventFilter {
        let mut filter = EventFilter::new();

        let kinds: Vec<EventKind> = self
            .filter
            .kinds
            .iter()
            .filter_map(|name| EventKind::from_name(name))
            .collect();
        if !kinds.is_empty() {
            filter = filter.any_kind(kinds);
        }

        if !self.filter.thread_prefixes.is_empty() {
            filter = filter.thread_prefixes(self.filter.thread_prefixes.clone());
        }

        if let Some(port) = self.filter.remote_port {
            filter = filter.remote_port(port);
        }

        filter
    }

    /// Builds the measurement plan.
    pub fn measurement_plan(&self) -> MeasurementPlan {
        MeasurementPlan {
            warmup_units: self.measurement.warmup_units,
            measured_units: self.measurement.measured_units,
            unit_domain: UnitDomain {
                min: self.measurement.unit_id_min,
                max: self.measurement.unit_id_max,
            },
            capture_warmup: self.measurement.capture_warmup,
        }
    }

    /// Builds the gate rules.
    pub fn gate_rules(&self) -> Vec<GateRule> {
        self.gates
            .iter()
            .map(|gate| match gate {
                GateConfig::MeanBelow(limit) => GateRule::MeanBelow(*limit),
                GateConfig::CountPerUnit(expected) => GateRule::CountPerUnit(*expected),
            })
            .collect()
    }

    /// Builds the simulated workload profile.
    pub fn sim_profile(&self) -> SimProfile {
        let sim = &self.workload.simulated;
        SimProfile {
            alloc_buffer_sizes: sim.alloc_buffer_sizes.clone(),
            alloc_outside_sizes: sim.alloc_outside_sizes.clone(),
            socket_round_trips: sim
                .socket_round_trips
                .iter()
                .map(|rt| SocketRoundTrip {
                    request_bytes: rt.request_bytes,
                    response_bytes: rt.response_bytes,
                })
                .collect(),
            remote_port: sim.remote_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            sources: vec![SourceConfig {
                kind: "socket_read".to_string(),
                enabled: true,
                threshold: 0,
                stack_policy: default_stack_policy(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.measurement.warmup_units, 20_000);
        assert_eq!(cfg.measurement.measured_units, 10_000);
        assert_eq!(cfg.measurement.unit_id_min, 1);
        assert_eq!(cfg.measurement.unit_id_max, 20);
        assert_eq!(cfg.workload.timeout, Duration::from_secs(10));
        assert_eq!(cfg.workload.simulated.remote_port, 5432);
    }

    #[test]
    fn test_validation_requires_an_enabled_source() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("at least one event source"));

        let mut cfg = valid_config();
        cfg.sources[0].enabled = false;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("at least one event source"));
    }

    #[test]
    fn test_disabled_source_is_excluded_from_specs() {
        let mut cfg = valid_config();
        cfg.sources.push(SourceConfig {
            kind: "socket_write".to_string(),
            enabled: false,
            threshold: 0,
            stack_policy: default_stack_policy(),
        });
        cfg.validate().expect("validate");

        let specs = cfg.source_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, EventKind::SocketRead);
    }

    #[test]
    fn test_validation_rejects_unknown_kind() {
        let mut cfg = valid_config();
        cfg.sources[0].kind = "not_a_kind".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unknown event source kind"));
    }

    #[test]
    fn test_validation_rejects_negative_threshold() {
        let mut cfg = valid_config();
        cfg.sources[0].threshold = -5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("must be >= 0"));
    }

    #[test]
    fn test_validation_rejects_duplicate_source() {
        let mut cfg = valid_config();
        cfg.sources.push(cfg.sources[0].clone());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validation_rejects_unknown_stack_policy() {
        let mut cfg = valid_config();
        cfg.sources[0].stack_policy = "sometimes".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unknown stack policy"));
    }

    #[test]
    fn test_validation_rejects_zero_measured_units() {
        let mut cfg = valid_config();
        cfg.measurement.measured_units = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("measured_units"));
    }

    #[test]
    fn test_validation_rejects_inverted_unit_domain() {
        let mut cfg = valid_config();
        cfg.measurement.unit_id_min = 21;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("unit_id_min"));
    }

    #[test]
    fn test_validation_http_requires_endpoint() {
        let mut cfg = valid_config();
        cfg.workload.mode = WorkloadMode::Http;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("workload.endpoint"));

        cfg.workload.endpoint = "http://localhost:8081/todo".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_mean_below() {
        let mut cfg = valid_config();
        cfg.gates.push(GateConfig::MeanBelow(0));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mean_below"));
    }

    #[test]
    fn test_parse_full_scenario_yaml() {
        let yaml = r#"
log_level: debug
workload:
  mode: simulated
  workers: 2
  simulated:
    socket_round_trips:
      - { request_bytes: 87, response_bytes: 230 }
      - { request_bytes: 15, response_bytes: 60 }
    remote_port: 5432
measurement:
  warmup_units: 100
  measured_units: 10
sources:
  - kind: socket_read
    threshold: 0
    stack_policy: captured
  - kind: socket_write
    threshold: 0
    stack_policy: captured
filter:
  kinds: [socket_read, socket_write]
  remote_port: 5432
gates:
  - count_per_unit: 4
  - mean_below: 480
"#;
        let cfg: Config = serde_yaml::from_str(yaml).expect("parse");
        cfg.validate().expect("validate");

        assert_eq!(cfg.measurement.warmup_units, 100);
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(
            cfg.gate_rules(),
            vec![GateRule::CountPerUnit(4), GateRule::MeanBelow(480)],
        );

        let specs = cfg.source_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].kind, EventKind::SocketRead);
        assert_eq!(specs[0].stack_policy, StackPolicy::Captured);

        let profile = cfg.sim_profile();
        assert_eq!(profile.socket_round_trips.len(), 2);
        assert_eq!(profile.remote_port, 5432);
    }

    #[test]
    fn test_event_filter_from_config() {
        use crate::probe::{EventPayload, EventRecord};
        use std::sync::Arc;

        let cfg = Config {
            filter: FilterConfig {
                kinds: vec!["socket_read".to_string(), "socket_write".to_string()],
                thread_prefixes: vec!["unit-worker".to_string()],
                remote_port: Some(5432),
            },
            ..valid_config()
        };

        let filter = cfg.event_filter();

        let matching = EventRecord {
            timestamp_ns: 0,
            thread: Arc::from("unit-worker-1"),
            payload: EventPayload::SocketRead {
                remote_port: 5432,
                bytes_read: 10,
            },
        };
        assert!(filter.matches(&matching));

        let wrong_port = EventRecord {
            payload: EventPayload::SocketRead {
                remote_port: 8081,
                bytes_read: 10,
            },
            ..matching.clone()
        };
        assert!(!filter.matches(&wrong_port));
    }
}
