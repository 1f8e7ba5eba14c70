//! agentperf - chat backend latency runs and comparison reports
//!
//! `run` drives a backend and writes one metrics artifact. `organize` and
//! `process` archive pending artifacts and write comparison reports.

#![forbid(unsafe_code)]

use agentperf::analysis::{OllamaAnalyzer, pick_model};
use agentperf::{
    AnalysisDispatcher, ArtifactStore, FileConfig, OllamaChatBackend, Pipeline, PipelineOptions,
    PipelineOutcome, PipelineVariant, RunConfig, SessionRegistry, SessionState, Settings,
    run_session,
};
use agentperf_common::{EnvParser, LogConfig, TestMode, init_logging};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "agentperf")]
#[command(author, version, about = "Chat backend latency runs and comparison reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to ./agentperf.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Directory searched for pending metrics files
    #[arg(long)]
    search_root: Option<PathBuf>,

    /// Archive root for result folders (relative paths resolve under the search root)
    #[arg(long)]
    archive_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Time repeated chat round-trips and write a metrics artifact
    Run {
        #[arg(long, default_value = "rust")]
        language: String,

        #[arg(long, default_value = "agentperf")]
        framework: String,

        #[arg(long, default_value = "ollama")]
        provider: String,

        /// Model name (defaults to OLLAMA_MODEL_NAME, then the built-in default)
        #[arg(long)]
        model: Option<String>,

        /// Backend endpoint (defaults to OLLAMA_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,

        /// standard or streaming
        #[arg(long, default_value = "standard")]
        mode: TestMode,

        #[arg(short = 'n', long, default_value_t = agentperf::runner::DEFAULT_ITERATIONS)]
        iterations: u64,

        /// Resource snapshot cadence in iterations (0 disables)
        #[arg(long, default_value_t = agentperf::runner::DEFAULT_SNAPSHOT_EVERY)]
        snapshot_every: u64,

        /// Where the artifact is written
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = agentperf::runner::DEFAULT_PROMPT)]
        prompt: String,
    },

    /// Archive every pending artifact and compare per provider and test mode
    Organize {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Archive one provider's artifacts, compare per test mode and request analysis
    Process {
        #[command(flatten)]
        store: StoreArgs,

        /// Comparison prompt template
        #[arg(long)]
        template: Option<PathBuf>,

        /// Provider to keep (case-insensitive, default ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Model used for analysis
        #[arg(long)]
        model: Option<String>,

        /// Skip the analysis report
        #[arg(long)]
        no_analysis: bool,
    },

    /// List pending artifacts without moving them
    Discover {
        #[command(flatten)]
        store: StoreArgs,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    let file = FileConfig::load(cli.config.as_deref())?;
    let (settings, _env_errors) = Settings::resolve(file, &mut EnvParser::new());

    match cli.command {
        Commands::Run {
            language,
            framework,
            provider,
            model,
            endpoint,
            mode,
            iterations,
            snapshot_every,
            output_dir,
            prompt,
        } => {
            let config = RunConfig {
                language,
                framework,
                provider,
                model: model
                    .or_else(|| settings.analysis.model.clone())
                    .unwrap_or_else(|| agentperf::analysis::DEFAULT_OLLAMA_MODEL.to_string()),
                endpoint: endpoint.unwrap_or_else(|| settings.analysis.endpoint.clone()),
                test_mode: mode,
                iterations,
                snapshot_every,
                output_dir,
                prompt,
            };
            run(config)
        }
        Commands::Organize { store } => {
            let pipeline = Pipeline::new(
                build_store(&settings, &store),
                PipelineOptions {
                    variant: PipelineVariant::Organize,
                    template_path: settings.template_path.clone(),
                    provider_filter: settings.provider_filter.clone(),
                },
            );
            let outcome = pipeline.run(Local::now().naive_local(), |_| None)?;
            print_outcome(&outcome);
            Ok(())
        }
        Commands::Process {
            store,
            template,
            provider,
            model,
            no_analysis,
        } => {
            let pipeline = Pipeline::new(
                build_store(&settings, &store),
                PipelineOptions {
                    variant: PipelineVariant::Process,
                    template_path: template.unwrap_or_else(|| settings.template_path.clone()),
                    provider_filter: provider.or_else(|| settings.provider_filter.clone()),
                },
            );
            let analysis = settings.analysis.clone();
            let enabled = analysis.enabled && !no_analysis;
            let configured_model = model.or(analysis.model);
            let outcome = pipeline.run(Local::now().naive_local(), |artifacts| {
                if !enabled {
                    return None;
                }
                let model = pick_model(configured_model.as_deref(), artifacts);
                info!(model = %model, endpoint = %analysis.endpoint, "analysis enabled");
                let analyzer: Box<dyn AnalysisDispatcher> =
                    Box::new(OllamaAnalyzer::new(analysis.endpoint.clone(), model, analysis.timeout));
                Some(analyzer)
            })?;
            print_outcome(&outcome);
            Ok(())
        }
        Commands::Discover { store, json } => {
            let store = build_store(&settings, &store);
            let found = store.discover()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("No pending metrics files under {}", store.search_root().display());
            } else {
                for path in &found {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
    }
}

fn build_store(settings: &Settings, args: &StoreArgs) -> ArtifactStore {
    let search_root = args
        .search_root
        .clone()
        .unwrap_or_else(|| settings.search_root.clone());
    let archive_root = args
        .archive_root
        .clone()
        .unwrap_or_else(|| settings.archive_root.clone());
    ArtifactStore::new(search_root, archive_root).with_language_dirs(settings.language_dirs.clone())
}

fn run(config: RunConfig) -> Result<()> {
    config.validate()?;
    let backend = OllamaChatBackend::new(
        config.endpoint.clone(),
        config.model.clone(),
        config.test_mode == TestMode::Streaming,
    );

    let registry = SessionRegistry::default();
    let total = config.iterations;
    let id = registry
        .start(total, move |token, progress| {
            run_session(&config, &backend, token, progress)
        })
        .context("failed to start run thread")?;

    let mut reported = 0;
    loop {
        std::thread::sleep(Duration::from_millis(500));
        let Some(status) = registry.status(Some(id)) else {
            bail!("session {id} disappeared");
        };
        if status.state != SessionState::Running {
            break;
        }
        if status.completed != reported {
            reported = status.completed;
            info!(completed = status.completed, total = status.total, "progress");
        }
    }

    let Some(status) = registry.wait(id) else {
        bail!("session {id} disappeared");
    };
    match status.state {
        SessionState::Completed => {
            if let Some(path) = &status.artifact {
                println!("Metrics written to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        SessionState::Cancelled => {
            warn!(completed = status.completed, "run cancelled, no artifact written");
            Ok(())
        }
        SessionState::Failed | SessionState::Running => {
            bail!(
                "run failed: {}",
                status.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    let Some(destination) = &outcome.destination else {
        println!("Nothing to process ({} pending file(s) found).", outcome.discovered);
        for skipped in &outcome.skipped {
            println!("  skipped: {skipped}");
        }
        return;
    };

    println!("Result folder: {}", destination.display());
    println!(
        "Test mode: {} | iterations: {} | moved: {} | comparisons: {}",
        outcome.test_mode,
        outcome.iterations,
        outcome.moved.len(),
        outcome.comparisons
    );
    for failure in &outcome.failed_moves {
        println!("  not moved: {failure}");
    }
    for skipped in &outcome.skipped {
        println!("  skipped: {skipped}");
    }
    if let Some(report) = &outcome.report {
        println!("Comparison report: {}", report.display());
    }
    if let Some(analysis) = &outcome.analysis {
        println!("Analysis report: {}", analysis.display());
    }
}
