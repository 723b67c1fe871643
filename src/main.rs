use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shopchat_gateway::api::ApiServerBuilder;
use shopchat_gateway::db::{self, InstanceRepo, WebhookLogRepo};
use shopchat_gateway::{Config, DbPool, Tenant};

/// Shopchat - multi-tenant chat commerce gateway
#[derive(Parser)]
#[command(name = "shopchat", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// `SQLite` database path (overrides configuration)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List registered messaging instances of a tenant
    Instances {
        #[arg(long, default_value_t = 1)]
        org: i64,
        #[arg(long, default_value_t = 1)]
        flow: i64,
    },
    /// Show the most recent inbound webhook events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,shopchat_gateway=info",
        1 => "info,shopchat_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(&config.database_path)?;

    match cli.command {
        Some(Command::Instances { org, flow }) => list_instances(pool, Tenant::new(org, flow)),
        Some(Command::Events { limit }) => show_events(pool, limit),
        None => serve(config, pool).await,
    }
}

async fn serve(config: Config, pool: DbPool) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        provider_mock = !config.provider_configured(),
        "starting shopchat gateway"
    );

    let server = ApiServerBuilder::new(config, pool).build()?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

fn list_instances(pool: DbPool, tenant: Tenant) -> anyhow::Result<()> {
    let instances = InstanceRepo::new(pool).list_for_tenant(tenant)?;
    if instances.is_empty() {
        println!("No instances for org {} / flow {}", tenant.org_id, tenant.flow_id);
        return Ok(());
    }

    for instance in instances {
        let status = instance
            .status
            .as_ref()
            .and_then(|s| s.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or("-");
        println!(
            "{}\t{}\t{}",
            instance.instance_id,
            status,
            instance.webhook_url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn show_events(pool: DbPool, limit: usize) -> anyhow::Result<()> {
    for event in WebhookLogRepo::new(pool).recent(limit)? {
        println!(
            "#{} {} {} {} ({} bytes)",
            event.id,
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.source,
            event.instance_id.as_deref().unwrap_or("-"),
            event.payload.len()
        );
    }
    Ok(())
}
