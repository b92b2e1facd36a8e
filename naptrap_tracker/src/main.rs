use std::{fs::OpenOptions, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use naptrap_data_management::{DataManager, DATA_DIR};
use naptrap_lib::{destination::NewDestination, position_sample::PositionSample};
use naptrap_tracker::{
    alerting::LogAlerter,
    config::TrackerConfig,
    console::{ConsoleCommand, HELP},
    gpx_replay::GpxReplaySource,
    location::{LocationSource, PushLocationSource},
    session::{SessionEvent, SessionHandle},
};
use tokio::{io::{AsyncBufReadExt, BufReader}, sync::broadcast};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "naptrap_tracker")]
#[command(about = "Watches saved destinations and raises an alarm when you get close", long_about = None)]
struct Cli {
    /// Directory holding the destination database and logs. Defaults to data/ in the project root
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON tracker config. Missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay this GPX track as the location source instead of reading `fix` commands
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Milliseconds between replayed GPX fixes. Defaults to the configured location interval,
    /// and is never shorter than the configured minimum interval
    #[arg(long, requires = "gpx")]
    pace_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => project_root::get_project_root().context("Failed to locate project root")?.join(DATA_DIR),
    };

    let log_dir = data_dir.join("log");
    std::fs::create_dir_all(&log_dir).with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("naptrap.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,naptrap_data_management=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    tracing::info!("Starting tracker...");

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => TrackerConfig::default(),
    };

    let data_manager = Arc::new(DataManager::start_in(&data_dir).await?);

    let push_source = Arc::new(PushLocationSource::new());
    let source: Arc<dyn LocationSource> = match &cli.gpx {
        Some(path) => {
            let mut replay = GpxReplaySource::open(path)?;
            if let Some(pace) = cli.pace_ms {
                replay = replay.with_pace(Duration::from_millis(pace));
            }
            Arc::new(replay)
        },
        None => push_source.clone(),
    };

    let alerter = Arc::new(LogAlerter::new());
    let session = SessionHandle::spawn(data_manager.clone(), source, alerter, config);

    tokio::spawn(log_events(session.subscribe()));

    match session.resume().await {
        Ok(ids) if ids.is_empty() => tracing::info!("No tracked destinations, waiting for commands"),
        Ok(ids) => tracing::info!("Resumed tracking of {:?}", ids),
        Err(err) => tracing::error!("Failed to resume tracking: {err}"),
    }

    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            },
        };

        if command == ConsoleCommand::Quit {
            break;
        }

        if let Err(err) = execute(command, &session, &data_manager, &push_source, cli.gpx.is_some()).await {
            println!("error: {err:#}");
        }
    }

    session.shutdown().await?;
    tracing::info!("Tracker stopped");

    Ok(())
}

async fn execute(
    command: ConsoleCommand,
    session: &SessionHandle,
    data_manager: &DataManager,
    push_source: &PushLocationSource,
    replaying: bool,
) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Add { name, latitude, longitude } => {
            let dest = data_manager.add_destination(NewDestination::new(name, latitude, longitude)).await?;
            println!("{}", dest.id);
        },
        ConsoleCommand::List => {
            for dest in data_manager.get_destinations().await? {
                println!("{}\t{}\t{:.6}\t{:.6}\t{}", dest.id, if dest.is_tracked {"T"} else {"."}, dest.latitude, dest.longitude, dest.name);
            }
        },
        ConsoleCommand::Track(id) => session.track(id).await?,
        ConsoleCommand::Untrack(id) => session.untrack(id).await?,
        ConsoleCommand::Stop(id) => session.stop_alarm(id).await?,
        ConsoleCommand::Delete(id) => session.delete(id).await?,
        ConsoleCommand::Resume => {
            let ids = session.resume().await?;
            println!("tracking {:?}", ids);
        },
        ConsoleCommand::Status => {
            let status = session.status().await?;
            println!(
                "{:?} tracked={:?} triggered={:?} samples={:?}",
                status.phase, status.tracked, status.triggered, status.samples
            );
        },
        ConsoleCommand::Fix { latitude, longitude, accuracy } => {
            if replaying {
                anyhow::bail!("fixes come from the GPX replay");
            }
            let mut sample = PositionSample::new(latitude, longitude, Utc::now());
            if let Some(accuracy) = accuracy {
                sample = sample.with_accuracy(accuracy);
            }
            if !push_source.push(sample).await {
                println!("not tracking anything, fix ignored");
            }
        },
        ConsoleCommand::Quit => {},
    }
    Ok(())
}

/// Stands in for the UI's view of the session.
async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Started { tracked }) => tracing::info!("NapTrap running, tracking your destinations {:?}", tracked),
            Ok(SessionEvent::Alarm(alarm)) => println!("ALARM {}: you are near {} (stop with `stop {}`)", alarm.destination_id, alarm.destination_name, alarm.destination_id),
            Ok(SessionEvent::Untracked(id)) => tracing::debug!("Destination {} no longer tracked", id),
            Ok(SessionEvent::Ended) => tracing::info!("Nothing left to track"),
            Ok(SessionEvent::LocationLost(err)) => tracing::warn!("Location lost ({err}). Restore location access and run `resume`"),
            Err(broadcast::error::RecvError::Lagged(missed)) => tracing::warn!("Missed {} session events", missed),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
