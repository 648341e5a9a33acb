//! Inquest CLI — terminal interface for the research engine.
//!
//! Maps the four core operations onto subcommands: `run`, `resume`,
//! `status`, and `cancel`.

use anyhow::Context;
use clap::Parser;
use inquest_core::{
    EngineConfig, Job, ReasoningEffort, RequestOptions, ResearchOutcome, ResearchReport,
    ResearchService, UserLocation,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Inquest: multi-round, cited web research from the command line
#[derive(Parser, Debug)]
#[command(name = "inquest", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of formatted text
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a research request
    Run {
        /// The research question
        question: String,

        /// Model to use (deep-research models run as background jobs)
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum search rounds (1-10)
        #[arg(long)]
        rounds: Option<usize>,

        /// Accumulated fact budget (5-50)
        #[arg(long)]
        max_facts: Option<usize>,

        /// Restrict facts to these domain suffixes (repeatable)
        #[arg(long = "domain")]
        domains: Vec<String>,

        /// Submit as a background job and return the job id immediately
        #[arg(long)]
        background: bool,

        /// Reasoning effort: low, medium, high
        #[arg(long)]
        effort: Option<String>,

        /// Two-letter country code for localized search
        #[arg(long)]
        country: Option<String>,
    },
    /// Resume a background job by id, polling until it finishes
    Resume {
        /// The job id returned at submission
        job_id: String,
    },
    /// Fetch the current status of a background job
    Status {
        /// The job id
        job_id: String,
    },
    /// Cancel a background job
    Cancel {
        /// The job id
        job_id: String,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "inquest=warn",
        1 => "inquest=info",
        _ => "inquest=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_effort(value: &str) -> anyhow::Result<ReasoningEffort> {
    match value {
        "low" => Ok(ReasoningEffort::Low),
        "medium" => Ok(ReasoningEffort::Medium),
        "high" => Ok(ReasoningEffort::High),
        other => anyhow::bail!("unknown reasoning effort '{other}' (expected low|medium|high)"),
    }
}

fn print_report(report: &ResearchReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}\n", report.answer);
    if !report.facts.is_empty() {
        println!("Sources:");
        for (i, fact) in report.facts.iter().enumerate() {
            println!(
                "  [F{}] {} (trust {}/5, confidence {}/5)",
                i + 1,
                fact.source_url,
                fact.source_quality,
                fact.confidence
            );
        }
    }
    if !report.conflicts.is_empty() {
        println!("\nConflicting sources:");
        for conflict in &report.conflicts {
            println!(
                "  {}: \"{}\" vs \"{}\"",
                conflict.topic, conflict.claim_a, conflict.claim_b
            );
        }
    }
    println!(
        "\n{} facts from {} rounds (stopped: {})",
        report.facts.len(),
        report.rounds.len(),
        report.stop_reason
    );
    Ok(())
}

fn print_job(job: &Job, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }
    println!("job {}: {}", job.id, job.status);
    if let Some(text) = job.output_text() {
        println!("\n{text}");
    }
    if let Some(ref error) = job.error {
        if let Some(ref message) = error.message {
            println!("error: {message}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let _ = dotenvy::dotenv();

    let config = EngineConfig::load(cli.config.as_deref())?;
    tracing::debug!(base_url = %config.base_url, model = %config.default_model, "Configuration loaded");
    let service = ResearchService::new(config).context("failed to initialize provider client")?;

    match cli.command {
        Commands::Run {
            question,
            model,
            rounds,
            max_facts,
            domains,
            background,
            effort,
            country,
        } => {
            let mut options = RequestOptions {
                model,
                force_domains: domains,
                background,
                ..Default::default()
            };
            if let Some(rounds) = rounds {
                options.max_search_rounds = rounds;
            }
            if let Some(max_facts) = max_facts {
                options.max_facts = max_facts;
            }
            if let Some(ref effort) = effort {
                options.reasoning_effort = Some(parse_effort(effort)?);
            }
            if country.is_some() {
                options.user_location = Some(UserLocation {
                    country,
                    ..Default::default()
                });
            }

            match service.run_research(&question, &options).await? {
                ResearchOutcome::Report(report) => print_report(&report, cli.json)?,
                ResearchOutcome::Background(job) => {
                    if !job.status.is_terminal() && !cli.json {
                        println!("submitted; resume later with: inquest resume {}", job.id);
                    }
                    print_job(&job, cli.json)?;
                }
            }
        }
        Commands::Resume { job_id } => {
            let job = service.resume_job(&job_id).await?;
            print_job(&job, cli.json)?;
        }
        Commands::Status { job_id } => {
            let job = service.job_status(&job_id).await?;
            print_job(&job, cli.json)?;
        }
        Commands::Cancel { job_id } => {
            let job = service.cancel_job(&job_id).await?;
            print_job(&job, cli.json)?;
        }
    }

    Ok(())
}
