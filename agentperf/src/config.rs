//! Layered settings: defaults, `agentperf.toml`, environment, CLI flags.

use crate::analysis::{DEFAULT_ANALYSIS_TIMEOUT, DEFAULT_OLLAMA_ENDPOINT};
use crate::store::{DEFAULT_ARCHIVE_ROOT, DEFAULT_LANGUAGE_DIRS};
use agentperf_common::{EnvError, EnvParser};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "agentperf.toml";
pub const DEFAULT_TEMPLATE_PATH: &str = "docs/comparison_prompt_template.md";

const MIN_ANALYSIS_TIMEOUT_SECS: u64 = 1;
const MAX_ANALYSIS_TIMEOUT_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// `agentperf.toml` as written on disk. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub search_root: Option<PathBuf>,
    pub archive_root: Option<PathBuf>,
    pub language_dirs: Option<Vec<String>>,
    pub template_path: Option<PathBuf>,
    pub provider_filter: Option<String>,
    pub analysis: AnalysisFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisFileConfig {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit`, or `agentperf.toml` in the working directory.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded config file");
                Self::parse(&content, &path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub enabled: bool,
    pub endpoint: String,
    /// `None` defers to the artifacts' model, then the built-in default.
    pub model: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub search_root: PathBuf,
    pub archive_root: PathBuf,
    pub language_dirs: Vec<String>,
    pub template_path: PathBuf,
    pub provider_filter: Option<String>,
    pub analysis: AnalysisSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_root: PathBuf::from("."),
            archive_root: PathBuf::from(DEFAULT_ARCHIVE_ROOT),
            language_dirs: DEFAULT_LANGUAGE_DIRS.iter().map(|d| d.to_string()).collect(),
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            provider_filter: None,
            analysis: AnalysisSettings {
                enabled: true,
                endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
                model: None,
                timeout: DEFAULT_ANALYSIS_TIMEOUT,
            },
        }
    }
}

impl Settings {
    /// Defaults overlaid with the file, then the environment.
    ///
    /// Invalid environment values keep the lower layer's value and are
    /// returned so the caller can report them together.
    pub fn resolve(file: FileConfig, env: &mut EnvParser) -> (Self, Vec<EnvError>) {
        let mut settings = Self::default();
        settings.apply_file(file);
        settings.apply_env(env);
        let errors = env.take_errors();
        for error in &errors {
            warn!(%error, "ignoring invalid environment value");
        }
        (settings, errors)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(root) = file.search_root {
            self.search_root = root;
        }
        if let Some(root) = file.archive_root {
            self.archive_root = root;
        }
        if let Some(dirs) = file.language_dirs {
            self.language_dirs = dirs;
        }
        if let Some(path) = file.template_path {
            self.template_path = path;
        }
        if file.provider_filter.is_some() {
            self.provider_filter = file.provider_filter;
        }
        let analysis = file.analysis;
        if let Some(enabled) = analysis.enabled {
            self.analysis.enabled = enabled;
        }
        if let Some(endpoint) = analysis.endpoint {
            self.analysis.endpoint = endpoint;
        }
        if analysis.model.is_some() {
            self.analysis.model = analysis.model;
        }
        match analysis.timeout_secs {
            Some(secs) if (MIN_ANALYSIS_TIMEOUT_SECS..=MAX_ANALYSIS_TIMEOUT_SECS).contains(&secs) => {
                self.analysis.timeout = Duration::from_secs(secs);
            }
            Some(secs) => {
                warn!(secs, "analysis.timeout_secs out of range (1..=3600), keeping default");
            }
            None => {}
        }
    }

    fn apply_env(&mut self, env: &mut EnvParser) {
        if let Some(root) = env.get_optional_path("SEARCH_ROOT") {
            self.search_root = root;
        }
        if let Some(root) = env.get_optional_path("ARCHIVE_ROOT") {
            self.archive_root = root;
        }
        if let Some(path) = env.get_optional_path("TEMPLATE_PATH") {
            self.template_path = path;
        }
        if let Some(filter) = env.get_optional_string("PROVIDER_FILTER") {
            self.provider_filter = Some(filter);
        }
        if let Some(enabled) = env.get_optional_bool("ANALYSIS") {
            self.analysis.enabled = enabled;
        }
        if let Some(secs) = env.get_optional_u64_range(
            "ANALYSIS_TIMEOUT_SECS",
            MIN_ANALYSIS_TIMEOUT_SECS,
            MAX_ANALYSIS_TIMEOUT_SECS,
        ) {
            self.analysis.timeout = Duration::from_secs(secs);
        }
        // Ollama's own variable names, shared with the benchmark producers.
        if let Some(endpoint) = non_blank(env.raw("OLLAMA_ENDPOINT")) {
            self.analysis.endpoint = endpoint;
        }
        if let Some(model) = non_blank(env.raw("OLLAMA_MODEL_NAME")) {
            self.analysis.model = Some(model);
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> EnvParser {
        EnvParser::from_vars(vars.iter().copied())
    }

    #[test]
    fn test_defaults() {
        let (settings, errors) = Settings::resolve(FileConfig::default(), &mut env(&[]));
        assert!(errors.is_empty());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.analysis.timeout, Duration::from_secs(180));
        assert_eq!(settings.archive_root, PathBuf::from("tests_results"));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig::parse(
            r#"
            archive_root = "archive"
            provider_filter = "azure"

            [analysis]
            model = "phi4"
            timeout_secs = 60
            "#,
            Path::new("agentperf.toml"),
        )
        .unwrap();
        let mut env = env(&[
            ("AGENTPERF_PROVIDER_FILTER", "ollama"),
            ("OLLAMA_MODEL_NAME", "llama3.2"),
        ]);
        let (settings, errors) = Settings::resolve(file, &mut env);
        assert!(errors.is_empty());
        assert_eq!(settings.archive_root, PathBuf::from("archive"));
        assert_eq!(settings.provider_filter.as_deref(), Some("ollama"));
        assert_eq!(settings.analysis.model.as_deref(), Some("llama3.2"));
        assert_eq!(settings.analysis.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_env_collected_and_ignored() {
        let mut env = env(&[
            ("AGENTPERF_ANALYSIS", "maybe"),
            ("AGENTPERF_ANALYSIS_TIMEOUT_SECS", "0"),
        ]);
        let (settings, errors) = Settings::resolve(FileConfig::default(), &mut env);
        assert_eq!(errors.len(), 2);
        assert!(settings.analysis.enabled);
        assert_eq!(settings.analysis.timeout, DEFAULT_ANALYSIS_TIMEOUT);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FileConfig::parse("serach_root = \".\"", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
