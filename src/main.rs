mod agent;
mod cleanup;
mod config;
mod connection;
mod error;
mod platform;
mod tools;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent::{campaign_task, CampaignResult, CreatedResources, Orchestrator, PollPolicy};
use cleanup::{
    AssumeYes, CleanupSummary, Confirmer, DeletionReport, LifecycleManager, ManifestCleanup,
    ManifestStore, StdinConfirmer, DEFAULT_MANIFEST_FILE,
};
use config::{load_agent_specs, load_orchestrator_spec, ProvisionSettings, Settings};
use platform::{AgentPlatform, AzureCliToken, HttpPlatform, StaticToken, TokenSource};
use tools::{bind_external_tool, load_api_document, IMAGE_TOOL_DESCRIPTION, IMAGE_TOOL_NAME};

/// Multi-agent marketing campaign generator
#[derive(Debug, Parser)]
#[command(name = "campaign-hive", version, about)]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a campaign for one product
    Run(RunArgs),
    /// Delete agents and threads
    Cleanup(CleanupArgs),
    /// Create the image API connection on the AI project
    Connect,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, default_value = "config/agent_configs.yaml")]
    agents_config: PathBuf,

    #[arg(long, default_value = "config/orchestrator_config.yaml")]
    orchestrator_config: PathBuf,

    /// API description of the image generation tool
    #[arg(long, default_value = "config/image_api_spec.json")]
    tool_spec: PathBuf,

    /// Overrides IMAGE_CONNECTION_ID
    #[arg(long)]
    connection_id: Option<String>,

    /// Overrides MODEL_DEPLOYMENT_NAME
    #[arg(long)]
    model: Option<String>,

    /// Prompted for when absent
    #[arg(long)]
    product: Option<String>,

    #[arg(long, default_value = DEFAULT_MANIFEST_FILE)]
    manifest: PathBuf,

    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// 0 waits forever
    #[arg(long, default_value_t = 600)]
    max_wait_secs: u64,

    /// Delete everything the run created once it finishes
    #[arg(long)]
    cleanup: bool,
}

#[derive(Debug, Args)]
struct CleanupArgs {
    /// Delete all agents
    #[arg(long)]
    agents: bool,

    /// Delete the given threads, or all threads when no ids follow
    #[arg(long, num_args = 0.., value_name = "IDS")]
    threads: Option<Vec<String>>,

    /// Delete all threads
    #[arg(long)]
    all_threads: bool,

    /// Delete all agents and threads
    #[arg(long)]
    full: bool,

    /// Delete the resources recorded in a session file
    #[arg(long, value_name = "PATH")]
    session: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(long)]
    confirm: bool,

    /// Only list agents and threads
    #[arg(long)]
    list_only: bool,

    /// Delay between deletions
    #[arg(long, default_value_t = 500)]
    pacing_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Cleanup(args) => cleanup(args).await,
        Command::Connect => connect().await,
    }
}

fn token_source(preissued: Option<&str>) -> Box<dyn TokenSource> {
    match preissued {
        Some(token) => Box::new(StaticToken::new(token)),
        None => Box::new(AzureCliToken::new()),
    }
}

async fn connect_platform(settings: &Settings) -> anyhow::Result<Arc<dyn AgentPlatform>> {
    let tokens = token_source(settings.token.as_deref());
    let platform = HttpPlatform::connect(settings, tokens.as_ref())
        .await
        .context("failed to authenticate against the agents service")?;
    Ok(Arc::new(platform))
}

/// Read one answer from stdin on a blocking thread
async fn prompt(question: impl Into<String>) -> io::Result<String> {
    let question = question.into();
    tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut out = io::stdout();
        write!(out, "{}", question)?;
        out.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .map_err(io::Error::other)?
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut settings = Settings::from_env()?;
    if let Some(model) = args.model {
        settings.model = model;
    }

    let workers = load_agent_specs(&args.agents_config)?;
    let lead = load_orchestrator_spec(&args.orchestrator_config)?;
    let document = load_api_document(&args.tool_spec)?;

    let Some(connection_id) = args.connection_id.or_else(|| settings.connection_id.clone()) else {
        bail!("no image connection id; set IMAGE_CONNECTION_ID or pass --connection-id");
    };
    let image_tool = bind_external_tool(&document, IMAGE_TOOL_NAME, &connection_id, IMAGE_TOOL_DESCRIPTION)?;

    let product = match args.product {
        Some(product) => product,
        None => prompt("Please enter the product name for the marketing campaign: ").await?,
    };
    if product.trim().is_empty() {
        bail!("product name must not be empty");
    }
    println!("Generating campaign for: {}", product.trim());

    let policy = PollPolicy {
        interval: Duration::from_millis(args.poll_interval_ms),
        max_wait: (args.max_wait_secs > 0).then(|| Duration::from_secs(args.max_wait_secs)),
        max_polls: None,
    };
    let platform = connect_platform(&settings).await?;
    let orchestrator = Orchestrator::new(platform.clone(), &settings.model, policy);

    info!(workers = workers.len(), model = %settings.model, "starting campaign");
    let store = ManifestStore::new(&args.manifest);
    let result = match orchestrator
        .run_campaign(&workers, &lead, &image_tool, &campaign_task(&product))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            if let Some(leftover) = e.leftover() {
                record_session(&store, leftover);
            }
            return Err(e.into());
        }
    };
    print_campaign(&result);

    let mut remaining = result.resources.clone();
    if args.cleanup {
        let manager = LifecycleManager::new(platform, Arc::new(AssumeYes));
        let summary = manager.delete_resources(&result.resources).await;
        print_summary(&summary);
        remaining = surviving(&result.resources, &summary);
    }
    record_session(&store, &remaining);

    if !result.succeeded() {
        bail!("run finished with status {}", result.status);
    }
    Ok(())
}

fn record_session(store: &ManifestStore, resources: &CreatedResources) {
    if resources.is_empty() {
        return;
    }
    match store.record(resources) {
        Ok(_) => println!("Session resources recorded in {}", store.path().display()),
        Err(e) => warn!(error = %e, "could not record session resources"),
    }
}

fn print_campaign(result: &CampaignResult) {
    for agent in &result.resources.agents {
        println!("Created agent {} ({})", agent.name, agent.id);
    }
    for thread in &result.resources.threads {
        println!("Created thread {}", thread.id);
    }

    if result.timed_out {
        println!("Stopped waiting for the run; last status: {}", result.status);
    } else {
        println!("Run finished with status: {}", result.status);
    }
    if let Some(error) = &result.last_error {
        println!("Run failed: {}", error);
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning);
    }

    match &result.reply.text {
        Some(text) => println!("Agent response: {}", text),
        None => println!("No response from the orchestrator"),
    }
    for citation in &result.reply.citations {
        println!("URL Citation: [{}]({})", citation.title, citation.url);
    }
}

/// Resources whose deletion failed
fn surviving(resources: &CreatedResources, summary: &CleanupSummary) -> CreatedResources {
    let failed = |report: &DeletionReport, id: &str| report.failed.iter().any(|f| f.id == id);
    CreatedResources {
        agents: resources
            .agents
            .iter()
            .filter(|a| failed(&summary.agents, &a.id))
            .cloned()
            .collect(),
        threads: resources
            .threads
            .iter()
            .filter(|t| failed(&summary.threads, &t.id))
            .cloned()
            .collect(),
    }
}

async fn cleanup(args: CleanupArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let platform = connect_platform(&settings).await?;
    let confirmer: Arc<dyn Confirmer> = if args.confirm {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinConfirmer)
    };
    let manager = LifecycleManager::new(platform, confirmer)
        .with_pacing(Duration::from_millis(args.pacing_ms));

    if args.list_only {
        list_resources(&manager).await;
    } else if args.full {
        print_summary(&manager.full_cleanup(true).await);
    } else if args.agents {
        print_report(&manager.cleanup_all_agents(true).await);
    } else if args.all_threads {
        print_report(&manager.cleanup_all_threads(true).await);
    } else if let Some(ids) = args.threads {
        let report = if ids.is_empty() {
            manager.cleanup_all_threads(true).await
        } else {
            manager.cleanup_specific_threads(&ids, true).await
        };
        print_report(&report);
    } else if let Some(path) = args.session {
        cleanup_session(&manager, &path).await?;
    } else {
        interactive(&manager).await?;
    }
    Ok(())
}

async fn cleanup_session(manager: &LifecycleManager, path: &Path) -> anyhow::Result<()> {
    let store = ManifestStore::new(path);
    let manifest = store.load()?;
    if manifest.is_none() {
        println!("Session file {} not found", path.display());
    }

    match manager.cleanup_from_manifest(manifest.as_ref(), true).await {
        ManifestCleanup::NothingToDo => println!("Nothing to clean up"),
        ManifestCleanup::Cancelled => println!("Cleanup cancelled"),
        ManifestCleanup::Completed(summary) => {
            print_summary(&summary);
            if summary.agents.failed.is_empty() && summary.threads.failed.is_empty() {
                store.remove()?;
            }
        }
    }
    Ok(())
}

async fn interactive(manager: &LifecycleManager) -> anyhow::Result<()> {
    println!("\nSelect cleanup option:");
    println!("1. Delete all agents");
    println!("2. Delete all threads");
    println!("3. Delete specific threads");
    println!("4. Full cleanup (agents + threads)");
    println!("5. Cleanup from session file");
    println!("6. List current resources");
    println!("7. Exit");

    match prompt("\nEnter your choice (1-7): ").await?.as_str() {
        "1" => print_report(&manager.cleanup_all_agents(true).await),
        "2" => print_report(&manager.cleanup_all_threads(true).await),
        "3" => {
            let input = prompt("Enter thread IDs separated by spaces: ").await?;
            let ids: Vec<String> = input.split_whitespace().map(str::to_string).collect();
            if ids.is_empty() {
                println!("No thread IDs provided");
            } else {
                print_report(&manager.cleanup_specific_threads(&ids, true).await);
            }
        }
        "4" => print_summary(&manager.full_cleanup(true).await),
        "5" => {
            let input = prompt(format!(
                "Enter session file path (or press Enter for '{}'): ",
                DEFAULT_MANIFEST_FILE
            ))
            .await?;
            let path = if input.is_empty() {
                PathBuf::from(DEFAULT_MANIFEST_FILE)
            } else {
                PathBuf::from(input)
            };
            cleanup_session(manager, &path).await?;
        }
        "6" => list_resources(manager).await,
        "7" => println!("Goodbye!"),
        _ => println!("Invalid choice"),
    }
    Ok(())
}

async fn list_resources(manager: &LifecycleManager) {
    let agents = manager.list_agents().await;
    if agents.is_empty() {
        println!("\nNo agents found");
    } else {
        println!("\nFound {} agent(s):", agents.len());
        for agent in &agents {
            println!("   - {} ({})", agent.id, agent.name);
        }
    }

    let threads = manager.list_threads().await;
    if threads.is_empty() {
        println!("\nNo threads found");
    } else {
        println!("\nFound {} thread(s):", threads.len());
        for thread in &threads {
            let created = thread
                .created_at
                .map(|c| c.to_rfc3339())
                .unwrap_or_else(|| "unknown".into());
            println!("   - {} (created: {})", thread.id, created);
        }
    }
}

fn print_report(report: &DeletionReport) {
    if report.cancelled {
        println!("Deletion of {}s cancelled", report.kind);
        return;
    }
    println!(
        "Deleted {}/{} {}(s)",
        report.deleted, report.attempted, report.kind
    );
    for failure in &report.failed {
        println!("   failed: {} ({})", failure.id, failure.reason);
    }
}

fn print_summary(summary: &CleanupSummary) {
    print_report(&summary.agents);
    print_report(&summary.threads);
}

async fn connect() -> anyhow::Result<()> {
    let settings = match ProvisionSettings::from_env() {
        Ok(settings) => settings,
        Err(missing) => {
            for error in &missing {
                println!("{}", error);
            }
            bail!("{} required setting(s) missing", missing.len());
        }
    };

    match connection::provision(&settings, &AzureCliToken::new()).await {
        Ok(()) => {
            println!("Connection '{}' is ready", settings.connection_name);
            Ok(())
        }
        Err(e) => {
            println!("Failed to create connection: {}", e);
            println!("\n{}", connection::manual_instructions(&settings));
            Err(e.into())
        }
    }
}
