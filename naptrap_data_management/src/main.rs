use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use naptrap_data_management::DataManager;
use naptrap_lib::destination::NewDestination;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "NapTrapCLI")]
#[command(about = "A CLI to manage saved destinations", long_about = None)]
struct Cli {
    /// Directory holding the destination database. Defaults to data/ in the project root
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a new destination
    Add {
        name: String,
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// List all destinations
    List,
    /// Set the name of a destination
    Rename { id: i64, name: String },
    /// Move a destination to new coordinates
    Move {
        id: i64,
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Delete a destination
    Delete { id: i64 },
    /// Mark a destination as tracked. Picked up the next time the tracker resumes
    Track { id: i64 },
    /// Clear the tracked mark of a destination
    Untrack { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,naptrap_data_management=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let data_manager = match &cli.data_dir {
        Some(dir) => DataManager::start_in(dir).await,
        None => DataManager::start().await,
    }.context("Failed to open destination store")?;

    match cli.command {
        Commands::Add { name, latitude, longitude } => {
            let dest = data_manager.add_destination(NewDestination::new(name, latitude, longitude)).await?;
            println!("{}", dest.id);
        },
        Commands::List => {
            for dest in data_manager.get_destinations().await? {
                println!("{}\t{}\t{:.6}\t{:.6}\t{}", dest.id, if dest.is_tracked {"T"} else {"."}, dest.latitude, dest.longitude, dest.name);
            }
        },
        Commands::Rename { id, name } => {
            data_manager.rename_destination(id, name).await?;
        },
        Commands::Move { id, latitude, longitude } => {
            let current = data_manager.get_destination(id).await?;
            data_manager.update_destination(id, NewDestination::new(current.name, latitude, longitude)).await?;
        },
        Commands::Delete { id } => {
            data_manager.remove_destination(id).await?;
        },
        Commands::Track { id } => {
            data_manager.set_tracked(id, true).await?;
        },
        Commands::Untrack { id } => {
            data_manager.set_tracked(id, false).await?;
        },
    }

    Ok(())
}
