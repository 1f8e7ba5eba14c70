//! Discovery → relocation → grouping → prompts → reports.
//!
//! Two variants share the stages. `Organize` archives every pending file
//! and compares per (provider, test mode). `Process` keeps one provider,
//! compares per test mode, reads the prompt template from disk and can
//! hand each prompt to an [`AnalysisDispatcher`].

use crate::analysis::AnalysisDispatcher;
use crate::grouping::{self, GroupDimension};
use crate::prompt::ComparisonPromptBuilder;
use crate::report::{AnalysisSection, ComparisonReport, ReportWriter};
use crate::store::{
    ArtifactStore, LoadError, LoadedArtifact, RelocationError, most_recently_modified,
};
use agentperf_common::{TestMode, parse_artifact_filename};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PROVIDER_FILTER: &str = "ollama";
pub const DEFAULT_ITERATIONS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineVariant {
    Organize,
    Process,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub variant: PipelineVariant,
    /// Used by `Process` only; `Organize` always uses the built-in template.
    pub template_path: PathBuf,
    /// Case-insensitive provider match. `Process` defaults to `ollama`;
    /// `Organize` keeps everything when unset.
    pub provider_filter: Option<String>,
}

/// What a pipeline invocation did.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub discovered: usize,
    /// `None` when there was nothing to process.
    pub destination: Option<PathBuf>,
    pub test_mode: TestMode,
    pub iterations: u64,
    pub moved: Vec<PathBuf>,
    pub failed_moves: Vec<RelocationError>,
    pub skipped: Vec<LoadError>,
    pub comparisons: usize,
    pub report: Option<PathBuf>,
    pub analysis: Option<PathBuf>,
}

pub struct Pipeline {
    store: ArtifactStore,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(store: ArtifactStore, options: PipelineOptions) -> Self {
        Self { store, options }
    }

    /// Run once. `dispatcher` is asked for an analyzer after the artifacts
    /// are known, so it can pick a model from them; returning `None` skips
    /// analysis.
    pub fn run<F>(&self, now: NaiveDateTime, dispatcher: F) -> Result<PipelineOutcome>
    where
        F: FnOnce(&[LoadedArtifact]) -> Option<Box<dyn AnalysisDispatcher>>,
    {
        let discovered = self.store.discover().context("artifact discovery failed")?;
        let mut outcome = PipelineOutcome {
            discovered: discovered.len(),
            ..PipelineOutcome::default()
        };
        if discovered.is_empty() {
            info!("no pending metrics files found");
            return Ok(outcome);
        }

        let (candidates, skipped) = self.select(&discovered);
        if candidates.is_empty() {
            info!(
                filter = self.provider_filter().unwrap_or("*"),
                "no artifacts matched the provider filter"
            );
            outcome.skipped = skipped;
            return Ok(outcome);
        }

        let pending: Vec<PathBuf> = match self.options.variant {
            PipelineVariant::Organize => discovered.clone(),
            PipelineVariant::Process => candidates.iter().map(|c| c.path.clone()).collect(),
        };
        let folder_iterations = match self.options.variant {
            PipelineVariant::Organize => None,
            PipelineVariant::Process => Some(determine_iterations(&candidates)),
        };
        let mode = determine_test_mode(&pending, &candidates);
        let destination = self
            .store
            .create_result_folder(mode, folder_iterations, now)
            .context("could not create result folder")?;

        let relocation = self.store.relocate(&pending, &destination);
        let artifacts = rebase(candidates, &relocation.moved);
        let moved: Vec<PathBuf> = relocation.moved.iter().map(|(_, to)| to.clone()).collect();

        let mode = determine_test_mode(&moved, &artifacts);
        let iterations = determine_iterations(&artifacts);

        let (dimension, builder) = match self.options.variant {
            PipelineVariant::Organize => (
                GroupDimension::ProviderAndTestMode,
                ComparisonPromptBuilder::default(),
            ),
            PipelineVariant::Process => (
                GroupDimension::TestMode,
                ComparisonPromptBuilder::from_path(&self.options.template_path),
            ),
        };
        let groups = grouping::group(&artifacts, dimension);
        let report = ComparisonReport::assemble(&artifacts, &groups, &builder);
        let writer = ReportWriter::new(now);
        let report_path = writer
            .write(&report, &destination, mode, iterations)
            .context("could not write comparison report")?;

        if self.options.variant == PipelineVariant::Process && !report.entries.is_empty() {
            if let Some(analyzer) = dispatcher(&artifacts) {
                outcome.analysis =
                    analyze(&writer, analyzer.as_ref(), &report, &destination, mode, iterations)?;
            }
        }

        outcome.comparisons = report.entries.len();
        outcome.destination = Some(destination);
        outcome.test_mode = mode;
        outcome.iterations = iterations;
        outcome.moved = moved;
        outcome.failed_moves = relocation.failed;
        outcome.skipped = skipped;
        outcome.report = Some(report_path);
        Ok(outcome)
    }

    fn provider_filter(&self) -> Option<&str> {
        match (&self.options.provider_filter, self.options.variant) {
            (Some(filter), _) => Some(filter.as_str()),
            (None, PipelineVariant::Process) => Some(DEFAULT_PROVIDER_FILTER),
            (None, PipelineVariant::Organize) => None,
        }
    }

    /// Load discovered files and keep those matching the provider filter.
    fn select(&self, discovered: &[PathBuf]) -> (Vec<LoadedArtifact>, Vec<LoadError>) {
        let (loaded, skipped) = ArtifactStore::load_all(discovered);
        let Some(filter) = self.provider_filter() else {
            return (loaded, skipped);
        };
        let kept = loaded
            .into_iter()
            .filter(|a| {
                a.artifact
                    .test_info
                    .provider
                    .as_deref()
                    .is_some_and(|p| p.eq_ignore_ascii_case(filter))
            })
            .collect();
        (kept, skipped)
    }
}

fn analyze(
    writer: &ReportWriter,
    analyzer: &dyn AnalysisDispatcher,
    report: &ComparisonReport<'_>,
    destination: &Path,
    mode: TestMode,
    iterations: u64,
) -> Result<Option<PathBuf>> {
    let sections: Vec<AnalysisSection> = report
        .entries
        .iter()
        .map(|entry| {
            info!(title = %entry.title, "dispatching comparison for analysis");
            AnalysisSection {
                title: entry.title.clone(),
                test_mode: entry.test_mode,
                text: analyzer.analyze(&entry.prompt),
            }
        })
        .collect();
    let unavailable = sections.iter().filter(|s| s.text.is_none()).count();
    if unavailable > 0 {
        warn!(unavailable, total = sections.len(), "some comparisons have no analysis");
    }
    let path = writer
        .write_analysis(&analyzer.describe(), &sections, destination, mode, iterations)
        .context("could not write analysis report")?;
    Ok(Some(path))
}

/// Point loaded artifacts at their new location. Artifacts whose file did
/// not move keep their original path.
fn rebase(artifacts: Vec<LoadedArtifact>, moved: &[(PathBuf, PathBuf)]) -> Vec<LoadedArtifact> {
    artifacts
        .into_iter()
        .map(|artifact| {
            match moved.iter().find(|(from, _)| *from == artifact.path) {
                Some((_, to)) => artifact.relocated(to.clone()),
                None => artifact,
            }
        })
        .collect()
}

/// Test mode of the most recently modified file: its `TestInfo` when the
/// artifact is loaded, else its filename, else `standard`.
pub fn determine_test_mode(paths: &[PathBuf], artifacts: &[LoadedArtifact]) -> TestMode {
    let Some(latest) = most_recently_modified(paths) else {
        return TestMode::default();
    };
    artifacts
        .iter()
        .find(|a| a.path == *latest)
        .map(|a| a.artifact.test_mode())
        .or_else(|| parse_artifact_filename(&latest.to_string_lossy()).test_mode)
        .unwrap_or_default()
}

/// First positive `TotalIterations`, else [`DEFAULT_ITERATIONS`].
pub fn determine_iterations(artifacts: &[LoadedArtifact]) -> u64 {
    artifacts
        .iter()
        .find_map(|a| a.artifact.metrics.total_iterations.filter(|n| *n > 0))
        .unwrap_or(DEFAULT_ITERATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentperf_common::{ArtifactMetrics, MetricsArtifact, TestInfo};

    fn loaded(path: &Path, mode: TestMode, iterations: Option<u64>) -> LoadedArtifact {
        LoadedArtifact {
            path: path.to_path_buf(),
            file_name: "m.json".into(),
            artifact: MetricsArtifact {
                test_info: TestInfo {
                    test_mode: mode,
                    ..TestInfo::default()
                },
                metrics: ArtifactMetrics {
                    total_iterations: iterations,
                    ..ArtifactMetrics::default()
                },
                ..MetricsArtifact::default()
            },
        }
    }

    #[test]
    fn test_iterations_skip_zero_and_missing() {
        let p = Path::new("x.json");
        let artifacts = [
            loaded(p, TestMode::Standard, None),
            loaded(p, TestMode::Standard, Some(0)),
            loaded(p, TestMode::Standard, Some(300)),
            loaded(p, TestMode::Standard, Some(50)),
        ];
        assert_eq!(determine_iterations(&artifacts), 300);
        assert_eq!(determine_iterations(&artifacts[..2]), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_mode_falls_back_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics_go_ollama_batch_20240101_000000.json");
        std::fs::write(&path, "{}").unwrap();
        let paths = vec![path.clone()];

        assert_eq!(determine_test_mode(&paths, &[]), TestMode::Batch);
        let artifacts = [loaded(&path, TestMode::Streaming, None)];
        assert_eq!(determine_test_mode(&paths, &artifacts), TestMode::Streaming);
        assert_eq!(determine_test_mode(&[], &artifacts), TestMode::Standard);
    }
}
