//! Markdown rendering of comparison and analysis reports.

use crate::grouping::ArtifactGroup;
use crate::prompt::ComparisonPromptBuilder;
use crate::store::LoadedArtifact;
use agentperf_common::{MachineInfo, TestMode};
use chrono::NaiveDateTime;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NOT_AVAILABLE: &str = "N/A";
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis could not be generated for this prompt.";

const GENERATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One comparable group rendered as a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonEntry {
    pub title: String,
    pub test_mode: TestMode,
    pub files: Vec<String>,
    pub prompt: String,
}

/// Everything a comparison report shows, in render order.
#[derive(Debug, Clone)]
pub struct ComparisonReport<'a> {
    pub entries: Vec<ComparisonEntry>,
    pub artifacts: &'a [LoadedArtifact],
}

impl<'a> ComparisonReport<'a> {
    /// Build one entry per comparable group, in group order. Groups with
    /// fewer than two languages are skipped here but their artifacts still
    /// get individual summaries.
    pub fn assemble(
        artifacts: &'a [LoadedArtifact],
        groups: &[ArtifactGroup<'_>],
        builder: &ComparisonPromptBuilder,
    ) -> Self {
        let entries = groups
            .iter()
            .filter_map(|group| {
                let Some((first, second)) = group.comparison_pair() else {
                    info!(group = %group.key, languages = group.len(), "group has nothing to compare");
                    return None;
                };
                let provider = group
                    .key
                    .provider
                    .as_deref()
                    .unwrap_or_else(|| first.artifact.provider_label());
                Some(ComparisonEntry {
                    title: format!("{provider} - {}", group.key.test_mode),
                    test_mode: group.key.test_mode,
                    files: vec![first.file_name.clone(), second.file_name.clone()],
                    prompt: builder.build(&first.artifact, &second.artifact),
                })
            })
            .collect();

        Self { entries, artifacts }
    }
}

/// Analysis text for one comparison; `None` renders the placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSection {
    pub title: String,
    pub test_mode: TestMode,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportWriter {
    generated_at: NaiveDateTime,
}

impl ReportWriter {
    pub fn new(generated_at: NaiveDateTime) -> Self {
        Self { generated_at }
    }

    pub fn comparison_file_name(mode: TestMode, iterations: u64) -> String {
        format!("comparison_report_{mode}_{iterations}iter.md")
    }

    pub fn analysis_file_name(mode: TestMode, iterations: u64) -> String {
        format!("analysis_report_{mode}_{iterations}iter.md")
    }

    pub fn render(&self, report: &ComparisonReport<'_>) -> String {
        let mut lines: Vec<String> = vec![
            "# Performance Comparison Report".into(),
            String::new(),
            format!("Generated: {}", self.generated_at.format(GENERATED_FORMAT)),
            String::new(),
            "## Overview".into(),
            String::new(),
            format!("Found {} test run(s).", report.artifacts.len()),
            String::new(),
            "## Test Results".into(),
            String::new(),
        ];

        for entry in &report.entries {
            lines.push(format!("### Comparison: {}", entry.title));
            lines.push(String::new());
            lines.push("#### Files Analyzed".into());
            lines.extend(entry.files.iter().map(|f| format!("- {f}")));
            lines.push(String::new());
            lines.push("#### LLM Comparison Prompt".into());
            lines.push(String::new());
            lines.push("```".into());
            lines.push(entry.prompt.clone());
            lines.push("```".into());
            lines.extend([String::new(), "---".to_string(), String::new()]);
        }

        lines.push("## Individual Test Summaries".into());
        lines.push(String::new());
        for loaded in report.artifacts {
            render_summary(&mut lines, loaded);
        }

        lines.join("\n")
    }

    pub fn write(
        &self,
        report: &ComparisonReport<'_>,
        dir: &Path,
        mode: TestMode,
        iterations: u64,
    ) -> io::Result<PathBuf> {
        let path = dir.join(Self::comparison_file_name(mode, iterations));
        std::fs::write(&path, self.render(report))?;
        info!(
            path = %path.display(),
            comparisons = report.entries.len(),
            artifacts = report.artifacts.len(),
            "wrote comparison report"
        );
        Ok(path)
    }

    pub fn render_analysis(&self, provider: &str, sections: &[AnalysisSection]) -> String {
        let mut lines: Vec<String> = vec![
            "# Performance Analysis Report".into(),
            String::new(),
            format!("Generated: {}", self.generated_at.format(GENERATED_FORMAT)),
            String::new(),
            format!("Analysis Provider: {provider}"),
            String::new(),
            "---".into(),
            String::new(),
        ];
        for section in sections {
            lines.push(format!("## {}", section.title));
            lines.push(String::new());
            lines.push(format!("Test Mode: {}", section.test_mode));
            lines.push(String::new());
            lines.push(match &section.text {
                Some(text) => text.trim().to_string(),
                None => ANALYSIS_UNAVAILABLE.to_string(),
            });
            lines.extend([String::new(), "---".to_string(), String::new()]);
        }
        lines.join("\n")
    }

    pub fn write_analysis(
        &self,
        provider: &str,
        sections: &[AnalysisSection],
        dir: &Path,
        mode: TestMode,
        iterations: u64,
    ) -> io::Result<PathBuf> {
        let path = dir.join(Self::analysis_file_name(mode, iterations));
        std::fs::write(&path, self.render_analysis(provider, sections))?;
        info!(path = %path.display(), sections = sections.len(), "wrote analysis report");
        Ok(path)
    }
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn render_summary(lines: &mut Vec<String>, loaded: &LoadedArtifact) {
    let artifact = &loaded.artifact;
    let test = &artifact.test_info;
    let metrics = &artifact.metrics;
    let no_machine = MachineInfo::default();
    let machine = artifact.machine_info.as_ref().unwrap_or(&no_machine);

    lines.push(format!(
        "### {} - {} - {}",
        artifact.language_label(),
        artifact.provider_label(),
        test.test_mode
    ));
    lines.push(String::new());
    lines.push(format!("**File:** `{}`", loaded.file_name));
    lines.push(String::new());

    lines.push("**Test Information:**".into());
    lines.push(format!(
        "- Language/Framework: {} / {}",
        or_na(test.language.as_deref()),
        or_na(test.framework.as_deref())
    ));
    lines.push(format!("- Provider: {}", or_na(test.provider.as_deref())));
    lines.push(format!("- Model: {}", or_na(test.model.as_deref())));
    lines.push(format!("- Test Mode: {}", test.test_mode));
    lines.push(format!("- Endpoint: {}", or_na(test.endpoint.as_deref())));
    lines.push(format!("- Timestamp: {}", or_na(test.timestamp.as_deref())));
    lines.push(format!("- Warmup Successful: {}", test.warmup_successful));
    if let Some(ms) = test.warmup_time_ms {
        lines.push(format!("- Warmup Time: {ms} ms"));
    }
    lines.push(String::new());

    lines.push("**Machine Information:**".into());
    lines.push(format!("- OS: {}", or_na(machine.os_label())));
    lines.push(format!("- Architecture: {}", or_na(machine.architecture.as_deref())));
    lines.push(format!(
        "- Processors: {} cores ({} logical)",
        or_na(machine.processor_count),
        or_na(machine.logical_processor_count)
    ));
    if let Some(model) = &machine.cpu_model {
        lines.push(format!("- CPU Model: {model}"));
    }
    if let Some(ghz) = machine.cpu_max_freq_ghz {
        lines.push(format!("- CPU Max Frequency: {ghz} GHz"));
    }
    if let Some(gb) = machine.total_memory_gb {
        lines.push(format!("- Total Memory: {gb} GB"));
    }
    if let Some(gb) = machine.available_memory_gb {
        lines.push(format!("- Available Memory: {gb} GB"));
    }
    if let Some(gpu) = &machine.gpu_model {
        lines.push(format!("- GPU: {gpu} ({})", or_na(machine.gpu_memory.as_deref())));
    }
    if let Some(runtime) = &machine.runtime_version {
        lines.push(format!("- Runtime Version: {runtime}"));
    }
    lines.push(String::new());

    lines.push("**Performance Metrics:**".into());
    lines.push(format!("- Total Iterations: {}", or_na(metrics.total_iterations)));
    lines.push(format!(
        "- Total Execution Time: {} ms",
        or_na(metrics.total_execution_time_ms)
    ));
    lines.push(format!("- Average Time per Iteration: {} ms", or_na(metrics.mean_ms())));
    lines.push(format!("- Min Iteration Time: {} ms", or_na(metrics.min_ms())));
    lines.push(format!("- Max Iteration Time: {} ms", or_na(metrics.max_ms())));
    lines.push(format!("- Median Iteration Time: {} ms", or_na(metrics.median_ms())));
    if let Some(stats) = &metrics.statistics {
        lines.push(format!(
            "- P90 / P95 / P99: {} / {} / {} ms",
            stats.p90, stats.p95, stats.p99
        ));
    }
    lines.push(format!("- Standard Deviation: {} ms", or_na(metrics.stdev_ms())));
    lines.push(format!("- Memory Used: {} MB", or_na(metrics.memory_used())));
    lines.push(format!(
        "- Average CPU Usage: {}%",
        or_na(metrics.average_cpu_percent())
    ));
    if let Some(gc) = &metrics.garbage_collection {
        lines.push(format!(
            "- GC Collections (gen0/gen1/gen2): {}/{}/{}",
            gc.gen0_collections, gc.gen1_collections, gc.gen2_collections
        ));
    }
    if let Some(ttft) = metrics.time_to_first_token_ms {
        lines.push(format!("- Time to First Token: {ttft} ms"));
    }
    if let Some(summary) = &artifact.summary {
        lines.push(String::new());
        lines.push(format!("**Summary:** {summary}"));
    }

    lines.extend([String::new(), "---".to_string(), String::new()]);
}
