//! Artifact discovery, relocation into result folders, and loading.

use agentperf_common::{ARTIFACT_EXTENSION, ARTIFACT_PREFIX, MetricsArtifact, TestMode};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ARCHIVE_ROOT: &str = "tests_results";
pub const DEFAULT_LANGUAGE_DIRS: [&str; 3] = ["dotnet", "python", "rust"];

/// Suffixes tried when a result folder name is already taken.
const MAX_FOLDER_SUFFIX: u32 = 100;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid discovery pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to create result folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

/// A single file that could not be moved. The file stays where it was.
#[derive(Error, Debug)]
#[error("failed to move {} into {}: {source}", .source_path.display(), .destination.display())]
pub struct RelocationError {
    pub source_path: PathBuf,
    pub destination: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Default)]
pub struct RelocationOutcome {
    /// `(from, to)` pairs in input order.
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub failed: Vec<RelocationError>,
}

/// A parsed artifact and where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub artifact: MetricsArtifact,
}

impl LoadedArtifact {
    /// Same artifact, now living at `path`.
    pub fn relocated(self, path: PathBuf) -> Self {
        Self {
            file_name: file_name_of(&path),
            path,
            artifact: self.artifact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    search_root: PathBuf,
    archive_root: PathBuf,
    language_dirs: Vec<String>,
}

impl ArtifactStore {
    /// A relative `archive_root` is resolved against `search_root`.
    pub fn new(search_root: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        let search_root = search_root.into();
        let archive_root = archive_root.into();
        let archive_root = if archive_root.is_relative() {
            search_root.join(archive_root)
        } else {
            archive_root
        };
        Self {
            search_root,
            archive_root,
            language_dirs: DEFAULT_LANGUAGE_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[must_use]
    pub fn with_language_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.language_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn search_root(&self) -> &Path {
        &self.search_root
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Glob patterns: the search root itself plus every language directory,
    /// recursively.
    pub fn patterns(&self) -> Vec<String> {
        let file_glob = format!("{ARTIFACT_PREFIX}*.{ARTIFACT_EXTENSION}");
        let root = glob::Pattern::escape(&self.search_root.to_string_lossy());
        let mut patterns = vec![format!("{root}/{file_glob}")];
        for dir in &self.language_dirs {
            let dir = glob::Pattern::escape(dir);
            patterns.push(format!("{root}/{dir}/**/{file_glob}"));
        }
        patterns
    }

    /// Find pending artifacts.
    ///
    /// Paths are canonicalized so a file reached by two patterns counts
    /// once; anything under the archive root is excluded. The result is
    /// sorted, which fixes discovery order.
    pub fn discover(&self) -> Result<Vec<PathBuf>, StoreError> {
        let archive = fs::canonicalize(&self.archive_root).ok();
        let mut found = BTreeSet::new();

        for pattern in self.patterns() {
            let entries = glob::glob(&pattern).map_err(|source| StoreError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(error) => {
                        warn!(%error, "skipping unreadable path during discovery");
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                let canonical = fs::canonicalize(&path).unwrap_or(path);
                if archive.as_ref().is_some_and(|a| canonical.starts_with(a)) {
                    debug!(path = %canonical.display(), "skipping archived artifact");
                    continue;
                }
                found.insert(canonical);
            }
        }

        info!(count = found.len(), root = %self.search_root.display(), "discovered artifacts");
        Ok(found.into_iter().collect())
    }

    /// Create a fresh `{timestamp}_{mode}[_{iterations}iter]` folder under
    /// the archive root. An existing folder is never reused; a numeric
    /// suffix is appended instead.
    pub fn create_result_folder(
        &self,
        mode: TestMode,
        iterations: Option<u64>,
        now: NaiveDateTime,
    ) -> Result<PathBuf, StoreError> {
        let base = result_folder_name(mode, iterations, now);
        fs::create_dir_all(&self.archive_root).map_err(|source| StoreError::CreateFolder {
            path: self.archive_root.clone(),
            source,
        })?;

        let mut candidate = self.archive_root.join(&base);
        for attempt in 2..=MAX_FOLDER_SUFFIX + 1 {
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    info!(folder = %candidate.display(), "created result folder");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = self.archive_root.join(format!("{base}_{attempt}"));
                }
                Err(source) => {
                    return Err(StoreError::CreateFolder {
                        path: candidate,
                        source,
                    });
                }
            }
        }
        Err(StoreError::CreateFolder {
            path: self.archive_root.join(base),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free folder name"),
        })
    }

    /// Move each file into `destination`. Each move is independent: a
    /// failure is recorded and the batch continues.
    pub fn relocate(&self, paths: &[PathBuf], destination: &Path) -> RelocationOutcome {
        let mut outcome = RelocationOutcome::default();
        for path in paths {
            let target = destination.join(path.file_name().unwrap_or(path.as_os_str()));
            match move_file(path, &target) {
                Ok(()) => {
                    debug!(from = %path.display(), to = %target.display(), "moved artifact");
                    outcome.moved.push((path.clone(), target));
                }
                Err(source) => {
                    let error = RelocationError {
                        source_path: path.clone(),
                        destination: target,
                        source,
                    };
                    warn!(%error, "artifact relocation failed");
                    outcome.failed.push(error);
                }
            }
        }
        info!(
            moved = outcome.moved.len(),
            failed = outcome.failed.len(),
            destination = %destination.display(),
            "relocation finished"
        );
        outcome
    }

    pub fn load(path: &Path) -> Result<LoadedArtifact, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LoadedArtifact {
            path: path.to_path_buf(),
            file_name: file_name_of(path),
            artifact,
        })
    }

    /// Load every path, keeping input order. Failures are logged and
    /// returned separately.
    pub fn load_all(paths: &[PathBuf]) -> (Vec<LoadedArtifact>, Vec<LoadError>) {
        let mut loaded = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        for path in paths {
            match Self::load(path) {
                Ok(artifact) => loaded.push(artifact),
                Err(error) => {
                    warn!(path = %error.path().display(), %error, "skipping unreadable artifact");
                    skipped.push(error);
                }
            }
        }
        (loaded, skipped)
    }
}

pub fn result_folder_name(mode: TestMode, iterations: Option<u64>, now: NaiveDateTime) -> String {
    let stamp = now.format(agentperf_common::artifact::FILE_TIMESTAMP_FORMAT);
    match iterations {
        Some(n) => format!("{stamp}_{mode}_{n}iter"),
        None => format!("{stamp}_{mode}"),
    }
}

/// The path with the newest modification time, if any can be stat'ed.
pub fn most_recently_modified(paths: &[PathBuf]) -> Option<&PathBuf> {
    paths
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok().map(|t| (t, p)))
        .max_by_key(|(t, _)| *t)
        .map(|(_, p)| p)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination already holds a file with this name",
        ));
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
