// Svcreg - Service registry with discovery and health monitoring
// Main entry point

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use svcreg::config::Config;
use svcreg::discovery::{SsPorts, SystemctlUnits};
use svcreg::health::{HealthMonitor, HealthProbeResult, HttpProbe};
use svcreg::registry::{
    FileStore, ReconciliationEngine, RegistryStore, ServicePatch, ServiceRecord, ServiceStatus,
    StatusFilter,
};

#[derive(Parser, Debug)]
#[command(name = "svcreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registry file path (overrides the config file)
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation cycle against systemd and listening sockets
    Scan,
    /// List registered services
    List {
        #[arg(short, long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,
    },
    /// Probe a single health URL
    Health { url: String },
    /// Show the health of every configured service
    Status,
    /// Create or update a service as configured
    Configure {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        health_endpoint: Option<String>,
    },
    /// Remove a service from the registry
    Remove { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_file.as_ref())?;

    let config = Config::load(cli.config.clone())?;
    let registry_path = match &cli.registry {
        Some(path) => path.clone(),
        None => config.registry_path()?,
    };

    let store = FileStore::open(&registry_path)
        .await
        .with_context(|| format!("Failed to open registry {}", registry_path.display()))?;
    tracing::debug!("Using registry {}", store.path().display());
    let store: Arc<dyn RegistryStore> = Arc::new(store);

    match cli.command {
        Command::Scan => scan(&config, store).await,
        Command::List { status } => list(store.as_ref(), status).await,
        Command::Health { url } => {
            // Each invocation starts with an empty cache, so always probe
            let monitor = health_monitor(&config)?;
            let result = monitor.check_health(&url, false).await;
            println!("{}", format_probe(&url, &result));
            Ok(())
        }
        Command::Status => status(&config, store.as_ref()).await,
        Command::Configure {
            name,
            description,
            port,
            base_url,
            health_endpoint,
        } => {
            let patch = ServicePatch {
                description,
                port,
                health_endpoint,
                base_url,
                status: Some(ServiceStatus::Configured),
            };
            configure(store.as_ref(), &name, &patch).await
        }
        Command::Remove { name } => {
            let removed = store.remove(&name).await?;
            println!("Removed {} ({})", removed.name, removed.status);
            Ok(())
        }
    }
}

fn init_logging(debug: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false) // Disable ANSI colors in log file
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

fn health_monitor(config: &Config) -> Result<HealthMonitor> {
    let probe = HttpProbe::new().context("Failed to build HTTP client")?;
    Ok(HealthMonitor::new(Arc::new(probe), config.health_settings()))
}

async fn scan(config: &Config, store: Arc<dyn RegistryStore>) -> Result<()> {
    let runner = config.command_runner();
    let engine = ReconciliationEngine::new(
        Arc::new(SystemctlUnits::new(config.systemctl_path.clone(), runner.clone())),
        Arc::new(SsPorts::new(config.ss_path.clone(), runner)),
        store,
    );

    let stats = engine.scan().await?;
    println!("Scanned:        {}", stats.total_scanned);
    println!("New discovered: {}", stats.new_discovered);
    println!("New raw:        {}", stats.new_raw);
    println!("Updated:        {}", stats.updated);
    Ok(())
}

async fn list(store: &dyn RegistryStore, filter: StatusFilter) -> Result<()> {
    let services = store.list(filter).await?;
    if services.is_empty() {
        println!("No services registered");
        return Ok(());
    }

    println!("{:<40} {:<11} {:<10} {:<6} DESCRIPTION", "NAME", "STATUS", "STATE", "PORT");
    for service in &services {
        println!(
            "{:<40} {:<11} {:<10} {:<6} {}",
            service.name,
            service.status,
            service.supervisor_state,
            service.port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            service.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn status(config: &Config, store: &dyn RegistryStore) -> Result<()> {
    let services = store.list(StatusFilter::Configured).await?;
    if services.is_empty() {
        println!("No configured services");
        return Ok(());
    }

    let monitor = health_monitor(config)?;
    for report in monitor.check_services(&services).await {
        let detail = match &report.probe {
            Some(result) => format_probe(report.health_url.as_deref().unwrap_or(""), result),
            None => "no health URL".to_string(),
        };
        println!("{:<40} {:<10} {}", report.name, report.health.label(), detail);
    }
    Ok(())
}

async fn configure(store: &dyn RegistryStore, name: &str, patch: &ServicePatch) -> Result<()> {
    let record = match store.find(name).await? {
        Some(_) => store.update(name, patch).await?,
        None => {
            let now = Utc::now();
            let mut record = ServiceRecord::configured(name, now);
            patch.apply(&mut record, now);
            store.insert(record.clone()).await?;
            record
        }
    };

    println!("Configured {}", record.name);
    Ok(())
}

fn format_probe(url: &str, result: &HealthProbeResult) -> String {
    let outcome = match (&result.status_code, &result.error) {
        (_, Some(failure)) => failure.message.clone(),
        (Some(code), None) => format!("HTTP {}", code),
        (None, None) => "no response".to_string(),
    };
    let verdict = if result.healthy { "healthy" } else { "unhealthy" };
    format!("{} {} ({})", url, verdict, outcome)
}
