mod sources;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roster_client::HfInferenceClient;
use roster_core::store::{AgentStore, JobStore, MatchStore};
use roster_core::traits::{CandidateRepository, SkillRepository};
use roster_core::{
    ExtractionOrchestrator, InferenceSkillExtractor, JobStatus, MemoryAgentStore, MemoryJobStore,
    MemoryMatchStore, PipelineConfig, PipelineService, PipelineStores, ProcessingType,
    SkillCatalog, TextSkillExtractor,
};
use roster_db::{Database, DatabaseConfig};

use sources::{JsonCandidateRepository, JsonSkillRepository};

#[derive(Parser)]
#[command(name = "roster", version, about = "Skill extraction and candidate matching")]
struct Cli {
    /// Inference API key (reads from ROSTER_API_KEY env var if not provided)
    #[arg(long, global = true, env = "ROSTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Inference API base URL
    #[arg(long, global = true, env = "ROSTER_INFERENCE_URL")]
    base_url: Option<String>,

    /// JSON skill catalog, used when DATABASE_URL is not set
    #[arg(long, global = true, env = "ROSTER_SKILLS_FILE")]
    skills: Option<PathBuf>,

    /// JSON candidate pool, used when DATABASE_URL is not set
    #[arg(long, global = true, env = "ROSTER_CANDIDATES_FILE")]
    candidates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract skills from a document
    Extract {
        #[command(flatten)]
        input: InputArgs,

        /// candidate_extraction, search_analysis, candidate_matching or generic
        #[arg(short = 't', long = "type", default_value = "candidate_extraction")]
        processing_type: String,
    },

    /// Extract skills from a job description and rank candidates against them
    Match {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Process several files under one tracked job
    Track {
        /// Caller-chosen job identifier
        #[arg(short, long)]
        request_id: String,

        /// Files to extract, one per job slot
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Inspect tracked jobs
    Job {
        #[command(subcommand)]
        action: JobCommand,
    },
}

#[derive(Subcommand)]
enum JobCommand {
    /// Show one job with its per-file extractions
    Get {
        request_id: String,
    },

    /// List recent jobs, newest first
    List {
        /// Only jobs in this status
        #[arg(short, long)]
        status: Option<JobStatus>,

        /// Number of jobs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Inline text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    text: Option<String>,

    /// Read text from a file
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl InputArgs {
    fn read(&self) -> Result<String> {
        match (&self.text, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, None) => anyhow::bail!("Either --text or --file is required"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roster=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let client = inference_client(cli.api_key.as_deref(), cli.base_url.as_deref())?;

    if database_configured() {
        let db = connect_db().await?;
        let stores = PipelineStores {
            jobs: db.job_repo(),
            matches: db.match_repo(),
            agents: db.agent_repo(),
        };
        run(
            cli.command,
            db.skill_repo(),
            db.candidate_repo(),
            stores,
            client,
            config,
        )
        .await
    } else {
        tracing::info!("DATABASE_URL not set, results are kept in memory only");
        let stores = PipelineStores {
            jobs: MemoryJobStore::new(),
            matches: MemoryMatchStore::new(),
            agents: MemoryAgentStore::new(),
        };
        run(
            cli.command,
            JsonSkillRepository::new(cli.skills),
            JsonCandidateRepository::new(cli.candidates),
            stores,
            client,
            config,
        )
        .await
    }
}

fn database_configured() -> bool {
    std::env::var("DATABASE_URL").is_ok_and(|url| !url.trim().is_empty())
}

async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    Ok(db)
}

fn inference_client(api_key: Option<&str>, base_url: Option<&str>) -> Result<HfInferenceClient> {
    let api_key = api_key.unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("ROSTER_API_KEY not set, inference extraction will likely be rejected");
    }
    let client = match base_url {
        Some(url) => HfInferenceClient::with_base_url(api_key, url)?,
        None => HfInferenceClient::new(api_key)?,
    };
    Ok(client)
}

async fn run<R, P, J, M, A>(
    command: Commands,
    skills: R,
    candidates: P,
    stores: PipelineStores<J, M, A>,
    client: HfInferenceClient,
    config: PipelineConfig,
) -> Result<()>
where
    R: SkillRepository + 'static,
    P: CandidateRepository,
    J: JobStore,
    M: MatchStore,
    A: AgentStore,
{
    let catalog = Arc::new(SkillCatalog::with_ttl(skills, config.catalog_ttl));
    if let Err(e) = catalog.load().await {
        tracing::warn!(error = %e, "Skill catalog unavailable, continuing with inference only");
    }

    let inference = InferenceSkillExtractor::new(client)
        .with_model(config.inference_model.clone())
        .with_fallback_model(config.fallback_model.clone())
        .with_defaults(config.extract_options())
        .with_catalog(catalog.clone());
    let text_extractor = TextSkillExtractor::new(catalog.clone());
    let orchestrator = ExtractionOrchestrator::new(text_extractor, inference)
        .with_timeout(config.extraction_timeout);
    let service = PipelineService::new(orchestrator, catalog, candidates, stores, config);

    match command {
        Commands::Extract {
            input,
            processing_type,
        } => {
            let text = input.read()?;
            let output = service
                .extract_and_match(&text, ProcessingType::parse_lenient(&processing_type))
                .await?;
            print_json(&output)?;
        }
        Commands::Match { input } => {
            let text = input.read()?;
            let response = service
                .run_agent_request(ProcessingType::CandidateMatching, &text)
                .await?;
            print_json(&response)?;
        }
        Commands::Track { request_id, files } => {
            let mut texts = Vec::with_capacity(files.len());
            for path in &files {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                texts.push(text);
            }
            let job = service.track_extraction(&request_id, texts).await?;
            let extractions = service.match_store().list_extractions(&request_id).await?;
            print_json(&serde_json::json!({ "job": job, "extractions": extractions }))?;
        }
        Commands::Job { action } => match action {
            JobCommand::Get { request_id } => {
                let job = service
                    .tracker()
                    .get(&request_id)
                    .await?
                    .with_context(|| format!("No job found for request '{request_id}'"))?;
                let extractions = service.match_store().list_extractions(&request_id).await?;
                print_json(&serde_json::json!({ "job": job, "extractions": extractions }))?;
            }
            JobCommand::List { status, limit } => {
                let jobs = service.tracker().list(status, limit).await?;
                if jobs.is_empty() {
                    eprintln!("No jobs found.");
                    return Ok(());
                }
                print_json(&jobs)?;
            }
        },
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
