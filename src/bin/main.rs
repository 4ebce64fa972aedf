//! Horizon desktop pool CLI

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use horizon_pools::config::{ENV_DOMAIN, ENV_HOST, ENV_PASSWORD, ENV_USERNAME};
use horizon_pools::orchestrator::OrchestratorConfig;
use horizon_pools::validate::violations;
use horizon_pools::{
    cancel_pair, CancelSignal, DesktopPoolSpec, EntitlementSet, Error, HorizonClient,
    InMemoryInventory, InventoryService, Orchestrator, ProviderConfig, Result,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "horizon-pools")]
#[command(about = "Declarative reconciler for Horizon desktop pools and entitlements")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Connection server host name or base URL
    #[arg(long, global = true, env = ENV_HOST)]
    host: Option<String>,
    #[arg(long, global = true, env = ENV_USERNAME)]
    username: Option<String>,
    #[arg(long, global = true, env = ENV_PASSWORD, hide_env_values = true)]
    password: Option<String>,
    /// AD domain of the user
    #[arg(long, global = true, env = ENV_DOMAIN)]
    domain: Option<String>,
    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,
    /// Per-call timeout in seconds
    #[arg(long, global = true, default_value = "60")]
    timeout: u64,
    /// Run against an in-process inventory instead of a server
    #[arg(long, global = true)]
    in_memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a pool declaration without contacting a server
    Validate {
        /// Path to the pool declaration (JSON)
        file: PathBuf,
    },
    /// Desktop pool lifecycle
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },
    /// Pool entitlements
    Entitlements {
        #[command(subcommand)]
        action: EntitlementAction,
    },
}

#[derive(Subcommand)]
enum PoolAction {
    /// Create a pool from its declaration
    Create {
        file: PathBuf,
        #[command(flatten)]
        identities: Identities,
    },
    /// Show a pool as the server reports it
    Show { id: String },
    /// Converge an existing pool to its declaration
    Update { id: String, file: PathBuf },
    /// Delete a pool
    Delete { id: String },
}

#[derive(Subcommand)]
enum EntitlementAction {
    /// List the identities entitled to a pool
    Show { pool_id: String },
    /// Show the changes `apply` would make
    Plan {
        pool_id: String,
        #[command(flatten)]
        identities: Identities,
    },
    /// Converge a pool's entitlements to exactly the given identities
    Apply {
        pool_id: String,
        #[command(flatten)]
        identities: Identities,
    },
    /// Remove every entitlement from a pool
    Clear { pool_id: String },
}

#[derive(Args)]
struct Identities {
    /// AD user or group SID (repeatable)
    #[arg(long = "sid", value_name = "SID")]
    sids: Vec<String>,
    /// JSON array of SIDs, merged with any --sid
    #[arg(long, value_name = "FILE")]
    sids_file: Option<PathBuf>,
}

impl Identities {
    fn load(&self) -> Result<EntitlementSet> {
        let mut set: EntitlementSet = self.sids.iter().cloned().collect();
        if let Some(path) = &self.sids_file {
            let raw = std::fs::read_to_string(path)?;
            let listed: EntitlementSet = serde_json::from_str(&raw)?;
            set.extend(listed);
        }
        Ok(set)
    }

    /// Like [`Identities::load`], but an empty set is refused. Removing every
    /// entitlement goes through `entitlements clear`.
    fn desired(&self) -> Result<EntitlementSet> {
        let set = self.load()?;
        if set.is_empty() {
            return Err(Error::Config(
                "no identities given: pass --sid or --sids-file, or use `entitlements clear`".into(),
            ));
        }
        Ok(set)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging() -> Result<()> {
    let directive = "horizon_pools=info"
        .parse()
        .map_err(|e| Error::Config(format!("invalid log directive: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Validate { file } = &cli.command {
        return cmd_validate(file);
    }

    let timeout = Duration::from_secs(cli.connection.timeout);
    let inventory = connect(&cli.connection, timeout).await?;
    let orch = Orchestrator::with_config(inventory, OrchestratorConfig::new().call_timeout(Some(timeout)));

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight calls");
            handle.cancel();
        }
    });

    match cli.command {
        Commands::Validate { .. } => Ok(()),
        Commands::Pool { action } => cmd_pool(&orch, action, &cancel).await,
        Commands::Entitlements { action } => cmd_entitlements(&orch, action, &cancel).await,
    }
}

async fn connect(connection: &Connection, timeout: Duration) -> Result<Arc<dyn InventoryService>> {
    if connection.in_memory {
        tracing::info!("using in-memory inventory");
        return Ok(Arc::new(InMemoryInventory::new()));
    }

    let config = ProviderConfig::builder()
        .host(connection.host.clone().unwrap_or_default())
        .username(connection.username.clone().unwrap_or_default())
        .password(connection.password.clone().unwrap_or_default())
        .domain(connection.domain.clone().unwrap_or_default())
        .ssl_verify(!connection.insecure)
        .call_timeout(Some(timeout))
        .build_validated()?;

    Ok(Arc::new(HorizonClient::login(&config).await?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let spec = DesktopPoolSpec::load(file)?;
    let found = violations(&spec);
    if found.is_empty() {
        println!("{}: valid", spec.name);
        return Ok(());
    }

    println!("{}: {} violation(s)", spec.name, found.len());
    for violation in &found {
        println!("  {violation}");
    }
    Err(Error::Configuration(found.into()))
}

async fn cmd_pool(orch: &Orchestrator, action: PoolAction, cancel: &CancelSignal) -> Result<()> {
    match action {
        PoolAction::Create { file, identities } => {
            let spec = DesktopPoolSpec::load(&file)?;
            let desired = identities.load()?;
            let state = orch.create_pool(&spec, cancel).await?;
            print_json(&state)?;

            if !desired.is_empty() {
                let report = orch.reconcile_entitlements(&state.id, &desired, cancel).await?;
                print_json(&report)?;
            }
        }
        PoolAction::Show { id } => {
            print_json(&orch.read_pool(&id, cancel).await?)?;
        }
        PoolAction::Update { id, file } => {
            let spec = DesktopPoolSpec::load(&file)?;
            print_json(&orch.update_pool(&id, &spec, cancel).await?)?;
        }
        PoolAction::Delete { id } => {
            orch.delete_pool(&id, cancel).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

async fn cmd_entitlements(
    orch: &Orchestrator,
    action: EntitlementAction,
    cancel: &CancelSignal,
) -> Result<()> {
    match action {
        EntitlementAction::Show { pool_id } => {
            print_json(&orch.read_entitlements(&pool_id, cancel).await?)?;
        }
        EntitlementAction::Plan { pool_id, identities } => {
            let desired = identities.desired()?;
            print_json(&orch.plan_entitlements(&pool_id, &desired, cancel).await?)?;
        }
        EntitlementAction::Apply { pool_id, identities } => {
            let desired = identities.desired()?;
            print_json(&orch.reconcile_entitlements(&pool_id, &desired, cancel).await?)?;
        }
        EntitlementAction::Clear { pool_id } => {
            print_json(&orch.clear_entitlements(&pool_id, cancel).await?)?;
        }
    }
    Ok(())
}
