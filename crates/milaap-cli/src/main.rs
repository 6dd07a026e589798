use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "milaap", about = "Milaap lost-and-found CLI")]
struct Cli {
    /// Base URL of the milaapd daemon
    #[arg(long, default_value = "http://127.0.0.1:8741")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a missing-person sighting
    Report {
        /// JSON file containing a 128-float face descriptor
        descriptor: PathBuf,
        /// URL of the stored photo
        #[arg(long)]
        photo_url: String,
        /// Name, if known
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        /// Where the person was last seen
        #[arg(long)]
        location: Option<String>,
    },
    /// Match a face descriptor against stored persons
    Match {
        /// JSON file containing a 128-float face descriptor
        descriptor: PathBuf,
        /// Only consider persons with this status (missing/found/reunited)
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        max_distance: Option<f32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List persons, optionally by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Transition a person's case status
    Transition {
        /// Person record id
        id: String,
        /// Target status (found/reunited)
        status: String,
        /// Current location to record with the transition
        #[arg(long)]
        location: Option<String>,
    },
    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Report {
            descriptor,
            photo_url,
            name,
            age,
            location,
        } => {
            let descriptor = load_descriptor(&descriptor)?;
            let body = json!({
                "face_descriptor": descriptor,
                "photo_url": photo_url,
                "name": name,
                "age": age,
                "last_seen_location": location,
            });
            let url = format!("{}/api/v1/sightings", cli.server);
            print_json(client.post(url).json(&body).send().await?).await?;
        }
        Commands::Match {
            descriptor,
            status,
            max_distance,
            limit,
        } => {
            let descriptor = load_descriptor(&descriptor)?;
            let body = json!({
                "face_descriptor": descriptor,
                "status_filter": status,
                "max_distance": max_distance,
                "limit": limit,
            });
            let url = format!("{}/api/v1/match", cli.server);
            print_json(client.post(url).json(&body).send().await?).await?;
        }
        Commands::List { status } => {
            let url = match status {
                Some(status) => format!("{}/api/v1/persons?status={status}", cli.server),
                None => format!("{}/api/v1/persons", cli.server),
            };
            print_json(client.get(url).send().await?).await?;
        }
        Commands::Transition {
            id,
            status,
            location,
        } => {
            let body = json!({
                "status": status,
                "current_location": location,
            });
            let url = format!("{}/api/v1/persons/{id}/status", cli.server);
            print_json(client.post(url).json(&body).send().await?).await?;
        }
        Commands::Health => {
            let url = format!("{}/health", cli.server);
            print_json(client.get(url).send().await?).await?;
        }
    }

    Ok(())
}

fn load_descriptor(path: &PathBuf) -> Result<Vec<f32>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptor file {}", path.display()))?;
    let values: Vec<f32> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing descriptor file {}", path.display()))?;
    Ok(values)
}

/// Pretty-print the response body; non-2xx responses exit non-zero after
/// printing the server's error body.
async fn print_json(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{text}"),
    }
    if !status.is_success() {
        bail!("request failed with status {status}");
    }
    Ok(())
}
