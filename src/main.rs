use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obs_store::{config::Config, metrics::PrometheusRequestDuration, open_object_client};

/// obs-store - inspect and modify a chunk storage bucket
///
/// The backend is chosen by STORAGE_BACKEND (local or obs); OBS settings come
/// from OBS_ACCESS_KEY, OBS_SECRET_KEY, OBS_ENDPOINT and OBS_BUCKET.
#[derive(Parser)]
#[command(name = "obs-store")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print request duration metrics in Prometheus text format when done
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream an object to stdout
    Get { key: String },
    /// Upload a file, replacing any existing object
    Put { key: String, file: PathBuf },
    /// Delete an object
    Delete { key: String },
    /// List objects and common prefixes
    List {
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value = "")]
        delimiter: String,
    },
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    // stdout carries object data, so logs go to stderr
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer().with_writer(std::io::stderr))
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "obs-store starting");

    let config = Config::load()?;

    let registry = Registry::new();
    let durations = PrometheusRequestDuration::new()?;
    durations.register(&registry)?;

    let client = open_object_client(&config.storage, Arc::new(durations))?;

    match cli.command {
        Command::Get { key } => {
            let mut reader = client.get_object(&key).await?;
            let mut stdout = tokio::io::stdout();
            let copied = tokio::io::copy(&mut reader, &mut stdout).await?;
            info!(key = %key, bytes = copied, "object downloaded");
        }
        Command::Put { key, file } => {
            let source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("failed to open {}", file.display()))?;
            client.put_object(&key, Box::new(source)).await?;
            info!(key = %key, "object uploaded");
        }
        Command::Delete { key } => {
            client.delete_object(&key).await?;
            info!(key = %key, "object deleted");
        }
        Command::List { prefix, delimiter } => {
            let (objects, prefixes) = client.list(&prefix, &delimiter).await?;
            for prefix in &prefixes {
                println!("PRE {}", prefix.0);
            }
            for object in &objects {
                println!("{} {}", object.modified_at.to_rfc3339(), object.key);
            }
            info!(
                objects = objects.len(),
                common_prefixes = prefixes.len(),
                "listing complete"
            );
        }
    }

    client.stop();

    if cli.print_metrics {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        eprint!("{}", String::from_utf8_lossy(&buffer));
    }

    Ok(())
}
