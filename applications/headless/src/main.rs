/// Cadenza headless player - plays a remote collection through the playback core
use cadenza_core::CollectionId;
use cadenza_headless::{
    config::HeadlessConfig,
    session::{self, PlayOptions, Session},
};
use cadenza_playback::RepeatMode;
use cadenza_server_client::{CadenzaServerClient, ServerConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadenza-headless")]
#[command(about = "Headless Cadenza player", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./cadenza.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a remote collection until it ends or Ctrl-C
    Play {
        /// Collection ID on the server
        collection: String,
        /// Queue position to start from
        #[arg(short, long, default_value_t = 0)]
        start: usize,
        /// Shuffle the queue after loading it
        #[arg(long)]
        shuffle: bool,
        /// Repeat mode
        #[arg(long, value_enum, default_value_t = RepeatArg::Off)]
        repeat: RepeatArg,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Off,
    All,
    One,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Off => RepeatMode::None,
            RepeatArg::All => RepeatMode::All,
            RepeatArg::One => RepeatMode::One,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadenza_headless=info,cadenza_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = HeadlessConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Play {
            collection,
            start,
            shuffle,
            repeat,
        } => {
            play(
                config,
                PlayOptions {
                    collection_id: CollectionId::new(collection.clone()),
                    name: collection,
                    start_index: start,
                    shuffle,
                    repeat: repeat.into(),
                },
            )
            .await?;
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

async fn play(config: HeadlessConfig, options: PlayOptions) -> anyhow::Result<()> {
    let server = ServerConfig {
        url: config.server.url.clone(),
        access_token: config.server.access_token.clone(),
    };
    let client = CadenzaServerClient::new(server)?;
    tracing::info!(server = %client.url(), "Starting Cadenza headless player");

    let mut session = Session::start(
        &config,
        Arc::new(client.catalog()),
        Arc::new(client.stream_fetcher()),
    );

    if let Err(e) = session.play_collection(options).await {
        session.shutdown().await?;
        return Err(e.into());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            event = session.next_event() => {
                let Some(event) = event else { break };
                if let Some(line) = session::describe(&event) {
                    println!("{line}");
                }
                if session::is_finished(&event) {
                    tracing::info!("Queue finished");
                    break;
                }
            }
        }
    }

    session.shutdown().await?;
    Ok(())
}
