//! Configuration for recorders and tracers
//!
//! Both configurations deserialize from partial JSON documents: every field
//! has a default, so `{}` is a valid configuration. Loading files or command
//! lines is left to the embedding application.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TxRecError};
use crate::tracer::{TraceKind, TraceKinds};

static RECORDER_INSTANCES: AtomicU64 = AtomicU64::new(0);

const RECORDER_BASE_NAME: &str = "tlm_recorder";

/// Returns a process-unique recorder name: `tlm_recorder`, `tlm_recorder_1`, ...
pub fn unique_recorder_name() -> String {
    match RECORDER_INSTANCES.fetch_add(1, Ordering::Relaxed) {
        0 => RECORDER_BASE_NAME.to_string(),
        n => format!("{}_{}", RECORDER_BASE_NAME, n),
    }
}

fn default_true() -> bool { true }

/// Transaction recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Base name of all recording streams. Empty means "generate one".
    #[serde(default)]
    pub name: String,

    /// Master switch
    #[serde(default = "default_true")]
    pub enable_tracing: bool,

    /// Record the delay-annotated views
    #[serde(default = "default_true")]
    pub enable_timed_tracing: bool,

    /// Record DMI requests and invalidations
    #[serde(default)]
    pub enable_dmi_tracing: bool,

    /// Reserved for debug transport; no forwarding path consults it
    #[serde(default)]
    pub enable_tr_dbg_tracing: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enable_tracing: true,
            enable_timed_tracing: true,
            enable_dmi_tracing: false,
            enable_tr_dbg_tracing: false,
        }
    }
}

impl RecorderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_timed_tracing(mut self, enabled: bool) -> Self {
        self.enable_timed_tracing = enabled;
        self
    }

    pub fn with_dmi_tracing(mut self, enabled: bool) -> Self {
        self.enable_dmi_tracing = enabled;
        self
    }

    pub fn with_tr_dbg_tracing(mut self, enabled: bool) -> Self {
        self.enable_tr_dbg_tracing = enabled;
        self
    }

    /// Stream names are derived from the base name and must stay single tokens
    pub fn validate(&self) -> Result<()> {
        if self.name.chars().any(char::is_whitespace) {
            return Err(TxRecError::InvalidConfig {
                reason: format!("recorder name '{}' contains whitespace", self.name),
            });
        }
        Ok(())
    }

    /// The configured name, or a generated unique one if empty
    pub fn resolved_name(&self) -> String {
        if self.name.is_empty() {
            unique_recorder_name()
        } else {
            self.name.clone()
        }
    }
}

fn default_kinds() -> Vec<TraceKind> {
    TraceKind::ALL.to_vec()
}

fn default_tracer_name() -> String {
    "tracer".to_string()
}

/// Hierarchy tracer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Name of the tracer object itself
    #[serde(default = "default_tracer_name")]
    pub name: String,

    /// Object shapes the type dispatch may attach to
    #[serde(default = "default_kinds")]
    pub kinds: Vec<TraceKind>,

    /// Trace plain modules even when they are not marked traceable
    #[serde(default)]
    pub trace_all_modules: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            name: default_tracer_name(),
            kinds: default_kinds(),
            trace_all_modules: false,
        }
    }
}

impl TracerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_kinds(mut self, kinds: &[TraceKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn with_trace_all_modules(mut self, enabled: bool) -> Self {
        self.trace_all_modules = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kinds.is_empty() {
            return Err(TxRecError::InvalidConfig {
                reason: "tracer has no object kinds to trace".to_string(),
            });
        }
        Ok(())
    }

    /// The configured kinds as a bitmask
    pub fn trace_kinds(&self) -> TraceKinds {
        self.kinds
            .iter()
            .fold(TraceKinds::NONE, |acc, kind| acc | TraceKinds::from(*kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_defaults() {
        let config = RecorderConfig::default();
        assert!(config.enable_tracing);
        assert!(config.enable_timed_tracing);
        assert!(!config.enable_dmi_tracing);
        assert!(!config.enable_tr_dbg_tracing);
    }

    #[test]
    fn test_recorder_partial_json() {
        let config = RecorderConfig::from_json(r#"{"name": "cpu", "enable_dmi_tracing": true}"#).unwrap();
        assert_eq!(config.name, "cpu");
        assert!(config.enable_tracing);
        assert!(config.enable_dmi_tracing);

        let empty = RecorderConfig::from_json("{}").unwrap();
        assert_eq!(empty, RecorderConfig::default());
    }

    #[test]
    fn test_recorder_name_validation() {
        let err = RecorderConfig::from_json(r#"{"name": "my recorder"}"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let err = RecorderConfig::from_json("{").unwrap_err();
        assert_eq!(err.error_code(), "JSON_ERROR");
    }

    #[test]
    fn test_generated_names_are_unique() {
        let a = RecorderConfig::default().resolved_name();
        let b = RecorderConfig::default().resolved_name();
        assert_ne!(a, b);
        assert!(a.starts_with("tlm_recorder"));
        assert_eq!(RecorderConfig::new("bus").resolved_name(), "bus");
    }

    #[test]
    fn test_tracer_defaults_trace_everything() {
        let config = TracerConfig::default();
        assert_eq!(config.trace_kinds(), TraceKinds::ALL);
        assert!(!config.trace_all_modules);
    }

    #[test]
    fn test_tracer_kinds_from_json() {
        let config = TracerConfig::from_json(r#"{"kinds": ["signals", "ports"]}"#).unwrap();
        assert_eq!(config.trace_kinds(), TraceKinds::SIGNALS | TraceKinds::PORTS);

        let err = TracerConfig::from_json(r#"{"kinds": []}"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
