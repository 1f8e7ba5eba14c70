//! Declared test modes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The workload shape a run declared when it was launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// One prompt per iteration, sequential.
    #[default]
    Standard,
    /// Prompts issued in fixed-size batches.
    Batch,
    /// Prompts issued concurrently.
    Concurrent,
    /// Streamed responses; time to first token is recorded.
    Streaming,
    /// Scripted multi-step scenarios.
    Scenarios,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown test mode '{0}' (expected standard|batch|concurrent|streaming|scenarios)")]
pub struct TestModeParseError(pub String);

impl TestMode {
    pub const ALL: [TestMode; 5] = [
        TestMode::Standard,
        TestMode::Batch,
        TestMode::Concurrent,
        TestMode::Streaming,
        TestMode::Scenarios,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Batch => "batch",
            Self::Concurrent => "concurrent",
            Self::Streaming => "streaming",
            Self::Scenarios => "scenarios",
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = TestModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TestModeParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Streaming".parse::<TestMode>(), Ok(TestMode::Streaming));
        assert_eq!(" batch ".parse::<TestMode>(), Ok(TestMode::Batch));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "soak".parse::<TestMode>().unwrap_err();
        assert_eq!(err, TestModeParseError("soak".to_string()));
        assert!(err.to_string().contains("soak"));
    }

    #[test]
    fn test_serde_uses_lowercase_labels() {
        let json = serde_json::to_string(&TestMode::Concurrent).unwrap();
        assert_eq!(json, "\"concurrent\"");
        let back: TestMode = serde_json::from_str("\"scenarios\"").unwrap();
        assert_eq!(back, TestMode::Scenarios);
    }

    #[test]
    fn test_display_matches_as_str() {
        for mode in TestMode::ALL {
            assert_eq!(mode.to_string(), mode.as_str());
        }
    }
}
