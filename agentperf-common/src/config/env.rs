//! Environment variable parsing with type safety.
//!
//! Invalid values never abort parsing: the default is used and the problem
//! is recorded so every issue can be reported at once.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix applied to every agentperf-owned variable.
pub const ENV_PREFIX: &str = "AGENTPERF_";

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },
}

/// Where variable values are read from.
#[derive(Debug, Clone)]
enum VarSource {
    Process,
    Fixed(BTreeMap<String, String>),
}

/// Type-safe environment variable parser.
#[derive(Debug, Clone)]
pub struct EnvParser {
    prefix: &'static str,
    source: VarSource,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser over the process environment with the `AGENTPERF_` prefix.
    pub fn new() -> Self {
        Self {
            prefix: ENV_PREFIX,
            source: VarSource::Process,
            errors: Vec::new(),
        }
    }

    /// Parser over a fixed set of variables (full names, prefix included).
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: ENV_PREFIX,
            source: VarSource::Fixed(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Raw lookup by full variable name, bypassing the prefix.
    pub fn raw(&self, full_name: &str) -> Option<String> {
        match &self.source {
            VarSource::Process => env::var(full_name).ok(),
            VarSource::Fixed(vars) => vars.get(full_name).cloned(),
        }
    }

    fn lookup(&self, name: &str) -> Option<(String, String)> {
        let var_name = self.var_name(name);
        self.raw(&var_name).map(|value| (var_name, value))
    }

    /// Get an optional string (None if not set or empty).
    pub fn get_optional_string(&mut self, name: &str) -> Option<String> {
        self.lookup(name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Get an optional path (None if not set or empty).
    pub fn get_optional_path(&mut self, name: &str) -> Option<PathBuf> {
        self.get_optional_string(name).map(PathBuf::from)
    }

    /// Get an optional boolean.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_optional_bool(&mut self, name: &str) -> Option<bool> {
        let (var_name, value) = self.lookup(name)?;
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get an optional u64 with range validation.
    pub fn get_optional_u64_range(&mut self, name: &str, min: u64, max: u64) -> Option<u64> {
        let (var_name, value) = self.lookup(name)?;
        match value.trim().parse::<u64>() {
            Ok(n) if (min..=max).contains(&n) => Some(n),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a log level, lowercased and validated.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> String {
        let Some((var_name, value)) = self.lookup(name) else {
            return default.to_string();
        };
        let lower = value.trim().to_lowercase();
        match lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => lower,
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "log level (trace/debug/info/warn/error/off)".to_string(),
                    value,
                });
                default.to_string()
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_string_trims_and_drops_empty() {
        let mut parser = EnvParser::from_vars([
            ("AGENTPERF_SEARCH_ROOT", "  ./runs  "),
            ("AGENTPERF_TEMPLATE_PATH", "   "),
        ]);
        assert_eq!(parser.get_optional_string("SEARCH_ROOT").as_deref(), Some("./runs"));
        assert_eq!(parser.get_optional_string("TEMPLATE_PATH"), None);
        assert_eq!(parser.get_optional_string("MISSING"), None);
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_bool_values() {
        for val in ["1", "true", "yes", "on", "TRUE", "Yes"] {
            let mut parser = EnvParser::from_vars([("AGENTPERF_FLAG", val)]);
            assert_eq!(parser.get_optional_bool("FLAG"), Some(true), "value {val}");
        }
        for val in ["0", "false", "no", "off", "FALSE", ""] {
            let mut parser = EnvParser::from_vars([("AGENTPERF_FLAG", val)]);
            assert_eq!(parser.get_optional_bool("FLAG"), Some(false), "value {val}");
        }
    }

    #[test]
    fn test_bool_invalid_is_recorded() {
        let mut parser = EnvParser::from_vars([("AGENTPERF_FLAG", "maybe")]);
        assert_eq!(parser.get_optional_bool("FLAG"), None);
        assert!(matches!(
            parser.errors(),
            [EnvError::InvalidValue { var, .. }] if var == "AGENTPERF_FLAG"
        ));
    }

    #[test]
    fn test_u64_range() {
        let mut parser = EnvParser::from_vars([
            ("AGENTPERF_OK", "50"),
            ("AGENTPERF_HIGH", "5000"),
            ("AGENTPERF_BAD", "fifty"),
        ]);
        assert_eq!(parser.get_optional_u64_range("OK", 1, 100), Some(50));
        assert_eq!(parser.get_optional_u64_range("HIGH", 1, 100), None);
        assert_eq!(parser.get_optional_u64_range("BAD", 1, 100), None);

        let errors = parser.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], EnvError::OutOfRange { .. }));
        assert!(matches!(errors[1], EnvError::InvalidValue { .. }));
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_log_level() {
        let mut parser = EnvParser::from_vars([("AGENTPERF_LOG_LEVEL", "DEBUG")]);
        assert_eq!(parser.get_log_level("LOG_LEVEL", "info"), "debug");

        let mut parser = EnvParser::from_vars([("AGENTPERF_LOG_LEVEL", "loud")]);
        assert_eq!(parser.get_log_level("LOG_LEVEL", "info"), "info");
        assert!(parser.has_errors());
    }

    #[test]
    fn test_raw_ignores_prefix() {
        let parser = EnvParser::from_vars([("OLLAMA_ENDPOINT", "http://gpu-box:11434")]);
        assert_eq!(
            parser.raw("OLLAMA_ENDPOINT").as_deref(),
            Some("http://gpu-box:11434")
        );
    }
}
