use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tinyform::{
    ListParams, SubmissionService,
    app::{build_service, open_store},
    config::{AppConfig, StoreBackend},
    service::DEFAULT_PAGE_SIZE,
};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tinyform")]
#[command(about = "Store and query form submissions")]
struct Cli {
    /// Storage backend; overrides TINYFORM_BACKEND.
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Directory holding the submissions file; overrides TINYFORM_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Create {
        #[arg(long)]
        form_type: String,
        /// Raw JSON payload.
        #[arg(long)]
        payload: String,
    },
    List {
        #[arg(long)]
        form_type: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    Get {
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = open_store(&config).await?;
    let service = build_service(store);

    let output = match cli.command {
        Command::Create { form_type, payload } => {
            let created = service.create(&form_type, &payload).await?;
            serde_json::to_string_pretty(&created)?
        }
        Command::List {
            form_type,
            search,
            page,
            page_size,
        } => {
            let params = ListParams {
                form_type,
                search,
                page,
                page_size,
            };
            let cancel = CancellationToken::new();
            let results = tokio::select! {
                results = service.list(&params, &cancel) => results?,
                _ = shutdown_signal() => {
                    cancel.cancel();
                    return Err(anyhow!("interrupted"));
                }
            };
            serde_json::to_string_pretty(&results)?
        }
        Command::Get { id } => match service.get(id).await? {
            Some(found) => serde_json::to_string_pretty(&found)?,
            None => return Err(anyhow!("submission {id} not found")),
        },
    };

    println!("{output}");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(raw) = &cli.backend {
        config.backend = StoreBackend::parse(raw)?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tinyform=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "unable to install Ctrl+C signal handler");
        std::future::pending::<()>().await;
    }
}
