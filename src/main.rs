//! Binary entry point for quantix.
//!
//! This binary provides the CLI interface for the quantix math resolver.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use quantix::config::QuantixConfig;
use quantix::models::{Feedback, FeedbackRequest, ProblemRecord, ResolvedAnswer, Topic};
use quantix::observability;
use quantix::services::{QuantixServices, parse_query};
use quantix::split_into_sub_problems;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Quantix - resolves math questions through memo, knowledge base, symbolic
/// and LLM tiers.
#[derive(Parser)]
#[command(name = "quantix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "QUANTIX_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve a question; prints a JSON report.
    Solve {
        /// The question text.
        #[arg(required = true)]
        text: Vec<String>,

        /// Resolve sub-problems in parallel.
        #[arg(long)]
        concurrent: bool,

        /// Operation hint (treats the text as a single problem).
        #[arg(long)]
        operation: Option<String>,

        /// Topic hint (treats the text as a single problem).
        #[arg(long)]
        topic: Option<String>,

        /// Compact JSON output.
        #[arg(long)]
        compact: bool,
    },

    /// Split and classify a question without solving it.
    Parse {
        /// The question text.
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Record whether an answer was right.
    Feedback {
        /// The problem as asked.
        #[arg(long)]
        problem: String,

        /// The answer that was given.
        #[arg(long)]
        answer: String,

        /// `correct` or `incorrect`.
        #[arg(long)]
        feedback: String,

        /// The right answer, for incorrect feedback.
        #[arg(long)]
        correction: Option<String>,

        /// Solution steps, in order.
        #[arg(long = "step")]
        steps: Vec<String>,

        /// Topic of the problem; detected when absent.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Build the knowledge index from a directory of markdown files.
    Ingest {
        /// Directory of `*.md` documents.
        dir: PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

fn main() -> ExitCode {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.data_dir.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from `path`, else the default location.
fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<QuantixConfig> {
    let mut config = match path {
        Some(path) => QuantixConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => QuantixConfig::load_default(),
    };
    if let Some(dir) = data_dir {
        config = config.with_data_dir(dir);
    }
    Ok(config)
}

/// Runs the selected command.
fn run_command(command: Commands, config: &QuantixConfig) -> anyhow::Result<()> {
    match command {
        Commands::Solve {
            text,
            concurrent,
            operation,
            topic,
            compact,
        } => cmd_solve(config, &text.join(" "), concurrent, operation, topic, compact),
        Commands::Parse { text } => print_json(&parse_query(&text.join(" ")), false),
        Commands::Feedback {
            problem,
            answer,
            feedback,
            correction,
            steps,
            topic,
        } => cmd_feedback(config, problem, answer, &feedback, correction, steps, topic),
        Commands::Ingest { dir } => cmd_ingest(config, &dir),
        Commands::Config => print_json(config, false),
    }
}

fn cmd_solve(
    config: &QuantixConfig,
    text: &str,
    concurrent: bool,
    operation: Option<String>,
    topic: Option<String>,
    compact: bool,
) -> anyhow::Result<()> {
    let services = QuantixServices::from_config(config)?;

    let records: Vec<ProblemRecord> = if operation.is_some() || topic.is_some() {
        let mut record = ProblemRecord::new(text);
        record.operation = operation;
        record.topic = topic;
        vec![record]
    } else {
        split_into_sub_problems(text)
            .into_iter()
            .map(ProblemRecord::new)
            .collect()
    };
    if records.is_empty() {
        bail!("no question found in input");
    }

    let report = if concurrent {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("starting worker runtime")?;
        runtime.block_on(Arc::clone(&services.cascade).resolve_concurrent(records))?
    } else {
        services.cascade.resolve(&records)?
    };

    print_json(&report, compact)
}

/// Summary printed after recording feedback.
#[derive(Serialize)]
struct Recorded<'a> {
    id: &'a str,
    feedback: Feedback,
    servable: bool,
}

fn cmd_feedback(
    config: &QuantixConfig,
    problem: String,
    answer: String,
    feedback: &str,
    correction: Option<String>,
    steps: Vec<String>,
    topic: Option<String>,
) -> anyhow::Result<()> {
    let Some(feedback) = Feedback::parse(feedback) else {
        bail!("feedback must be 'correct' or 'incorrect', got '{feedback}'");
    };
    let topic = match topic {
        Some(name) => {
            Some(Topic::parse(&name).with_context(|| format!("unknown topic '{name}'"))?)
        },
        None => None,
    };

    let services = QuantixServices::from_config(config)?;
    let entry = services.record_feedback(FeedbackRequest {
        problem_text: problem,
        topic,
        final_answer: ResolvedAnswer::plain(answer),
        solution_steps: steps,
        feedback,
        correction,
    })?;
    print_json(
        &Recorded {
            id: &entry.id,
            feedback: entry.feedback,
            servable: entry.servable_answer().is_some(),
        },
        false,
    )
}

fn cmd_ingest(config: &QuantixConfig, dir: &Path) -> anyhow::Result<()> {
    let services = QuantixServices::from_config(config)?;
    let stats = services
        .ingest_knowledge(dir)
        .with_context(|| format!("ingesting {}", dir.display()))?;
    eprintln!(
        "Ingested {} chunks from {} files into {}",
        stats.chunks,
        stats.files,
        config.knowledge_index_path().display()
    );
    print_json(&stats, false)
}

fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_solve_args() {
        let cli = Cli::try_parse_from(["quantix", "solve", "derivative", "of", "x^2", "--concurrent"]).unwrap();
        match cli.command {
            Commands::Solve { text, concurrent, .. } => {
                assert_eq!(text.join(" "), "derivative of x^2");
                assert!(concurrent);
            },
            _ => panic!("expected solve"),
        }
    }

    #[test]
    fn test_parse_feedback_steps() {
        let cli = Cli::try_parse_from([
            "quantix", "feedback", "--problem", "p", "--answer", "a", "--feedback", "correct",
            "--step", "one", "--step", "two",
        ])
        .unwrap();
        match cli.command {
            Commands::Feedback { steps, .. } => assert_eq!(steps, vec!["one", "two"]),
            _ => panic!("expected feedback"),
        }
    }
}
