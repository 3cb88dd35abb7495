use agent_factory::agents::fallback::FallbackGenerator;
use agent_factory::blueprint::BlueprintDraft;
use agent_factory::cancel::CancelHandle;
use agent_factory::config::FactoryConfig;
use agent_factory::error::FactoryError;
use agent_factory::executor::{DynamicExecutor, PythonExecutor};
use agent_factory::factory_paths;
use agent_factory::human::TerminalInput;
use agent_factory::orchestrator::Orchestrator;
use agent_factory::revision::RevisionCapPolicy;
use agent_factory::state::{Phase, WorkflowState};
use agent_factory::state_machine::{StateSnapshot, WorkflowStateMachine};
use agent_factory::storage::FileStore;
use agent_factory::structured_logger::StructuredLogger;
use agent_factory::validators::validate_code;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agent-factory")]
#[command(about = "Turns a request into a validated multi-agent blueprint and generated code")]
#[command(version)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("AGENT_FACTORY_GIT_SHA"),
    ")"
))]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Configuration file (defaults to the built-in factory.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full workflow for a request
    Create(CreateArgs),

    /// Continue an interrupted workflow from its saved state
    Resume {
        /// Workflow id printed when the workflow started
        workflow_id: String,
    },

    /// Execute a generated module with a query
    Run {
        /// Path to the generated source file
        code: PathBuf,

        /// The query (all remaining arguments are joined)
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },

    /// Validate a blueprint JSON file
    CheckBlueprint { file: PathBuf },

    /// Validate a generated source file
    CheckCode { file: PathBuf },
}

#[derive(Args)]
struct CreateArgs {
    /// What the multi-agent system should do (all arguments are joined)
    #[arg(trailing_var_arg = true, required = true)]
    request: Vec<String>,

    /// Maximum number of blueprint revisions
    #[arg(long)]
    max_revisions: Option<u32>,

    /// What to do when the revision limit is reached: force_approve or fail
    #[arg(long)]
    on_limit: Option<RevisionCapPolicy>,

    /// Where blueprints and generated code are saved
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => FactoryConfig::load(path)?,
        None => FactoryConfig::default_config(),
    };

    match cli.command {
        Command::Create(args) => {
            if let Some(max) = args.max_revisions {
                config.revision.max_revisions = max;
            }
            if let Some(policy) = args.on_limit {
                config.revision.on_limit = policy;
            }
            if let Some(dir) = args.output_dir {
                config.storage.output_dir = Some(dir);
            }
            config.validate().context("Invalid configuration")?;
            run_create(config, &args.request.join(" ")).await
        }
        Command::Resume { workflow_id } => {
            config.validate().context("Invalid configuration")?;
            run_resume(config, &workflow_id).await
        }
        Command::Run { code, query } => run_code(&config, &code, &query.join(" ")).await,
        Command::CheckBlueprint { file } => check_blueprint(&file),
        Command::CheckCode { file } => check_code(&config, &file),
    }
}

async fn run_create(config: FactoryConfig, request: &str) -> Result<()> {
    let state = WorkflowState::new(request)?;
    let workflow_id = state.workflow_id().to_string();
    tracing::info!("starting workflow {}", workflow_id);

    let logs_dir = factory_paths::session_logs_dir(&workflow_id)?;
    let logger = Arc::new(StructuredLogger::new(&workflow_id, &logs_dir)?);
    let (machine, snapshots) = WorkflowStateMachine::new(state, logger);
    run_workflow(config, machine, snapshots).await
}

async fn run_resume(config: FactoryConfig, workflow_id: &str) -> Result<()> {
    let state_path = factory_paths::session_state_path(workflow_id)?;
    if !state_path.exists() {
        anyhow::bail!("No saved state for workflow {}: {}", workflow_id, state_path.display());
    }
    let logs_dir = factory_paths::session_logs_dir(workflow_id)?;
    let logger = Arc::new(StructuredLogger::reopen(workflow_id, &logs_dir)?);
    let (machine, snapshots) = WorkflowStateMachine::resume(&state_path, logger.clone())
        .with_context(|| format!("Failed to resume workflow {}", workflow_id))?;
    if machine.state().workflow_id() != workflow_id {
        anyhow::bail!(
            "State file {} belongs to workflow {}",
            state_path.display(),
            machine.state().workflow_id()
        );
    }
    tracing::info!(
        "resuming workflow {} in phase {} (run {})",
        workflow_id,
        machine.state().phase(),
        logger.run_id()
    );
    run_workflow(config, machine, snapshots).await
}

async fn run_workflow(
    config: FactoryConfig,
    machine: WorkflowStateMachine,
    mut snapshots: watch::Receiver<StateSnapshot>,
) -> Result<()> {
    let workflow_id = machine.state().workflow_id().to_string();
    let logger = machine.logger().clone();
    let generator = FallbackGenerator::from_config(&config)?.with_logger(logger.clone());
    let store = FileStore::new(config.output_dir()?, config.builder.language);
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            tracing::info!("phase: {}", snapshot.label());
        }
    });

    let (cancel, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let mut orchestrator = Orchestrator::new(machine, config, Arc::new(generator), Arc::new(store))
        .with_cancel(token)
        .with_state_path(factory_paths::session_state_path(&workflow_id)?);
    let mut human = TerminalInput::stdio();
    let result = orchestrator.run(&mut human).await;

    let state = orchestrator.state();
    for warning in state.warnings() {
        eprintln!("warning: {}", warning);
    }
    for (kind, path) in orchestrator.artifacts() {
        println!("saved {}: {}", kind, path.display());
    }
    println!("event log: {}", logger.path().display());

    match result {
        Ok(()) if state.phase() == Phase::Failed => anyhow::bail!(
            "Workflow {} failed: {}",
            workflow_id,
            state.failure_reason().unwrap_or("unknown failure")
        ),
        Ok(()) => {
            println!("workflow {} done", workflow_id);
            Ok(())
        }
        Err(FactoryError::Cancelled) => {
            println!(
                "workflow {} cancelled in phase {}; continue with `agent-factory resume {}`",
                workflow_id,
                state.phase(),
                workflow_id
            );
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Workflow {} failed", workflow_id)),
    }
}

async fn run_code(config: &FactoryConfig, code: &Path, query: &str) -> Result<()> {
    let executor = PythonExecutor::default();
    let output = executor
        .execute(code, &config.builder.entry_point, query)
        .await
        .with_context(|| format!("Failed to run {}", code.display()))?;
    println!("{}", output);
    Ok(())
}

fn check_blueprint(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read blueprint file: {}", file.display()))?;
    let blueprint = BlueprintDraft::Raw(content)
        .validate()
        .with_context(|| format!("Invalid blueprint: {}", file.display()))?;
    println!("{}", blueprint.summary());
    Ok(())
}

fn check_code(config: &FactoryConfig, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read code file: {}", file.display()))?;
    let check = config.code_check();
    validate_code(&content, &check).with_context(|| format!("Invalid code: {}", file.display()))?;
    println!("{} is valid {} defining `{}`", file.display(), check.language, check.entry_point);
    Ok(())
}
