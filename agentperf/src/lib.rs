//! agentperf: timed chat-backend runs and cross-implementation comparison.
//!
//! Runs write one metrics artifact each ([`runner`]). The [`pipeline`]
//! gathers pending artifacts, archives them into a result folder, pairs
//! them by test mode and writes comparison (and optionally analysis)
//! reports.

pub mod analysis;
pub mod backend;
pub mod config;
pub mod grouping;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod session;
pub mod store;

pub use analysis::{AnalysisDispatcher, OllamaAnalyzer, pick_model};
pub use backend::{BackendError, ChatBackend, ChatReply, OllamaChatBackend};
pub use config::{ConfigError, FileConfig, Settings};
pub use grouping::{ArtifactGroup, GroupDimension, GroupKey};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutcome, PipelineVariant};
pub use prompt::ComparisonPromptBuilder;
pub use report::{ComparisonReport, ReportWriter};
pub use runner::{RunConfig, RunError, RunReport, run_session, run_session_with};
pub use session::{CancellationToken, RunProgress, SessionRegistry, SessionState, SessionStatus};
pub use store::{ArtifactStore, LoadError, LoadedArtifact, RelocationError, StoreError};
