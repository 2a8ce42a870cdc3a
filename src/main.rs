use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liveboard::aggregate::RankingAggregator;
use liveboard::api::state::AppState;
use liveboard::config::AppConfig;
use liveboard::fetch::{FetchError, Fetcher};
use liveboard::models::normalize_entity_id_str;
use liveboard::platform::{PlatformClient, RankingSource};

#[derive(Parser)]
#[command(name = "liveboard")]
#[command(about = "Live-event leaderboard aggregator")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an event's standings and print the top window
    Standing {
        /// Event identifier
        #[arg(long)]
        event: String,

        /// Room to track (always included, even outside the window)
        #[arg(long)]
        target: Option<String>,

        /// Window size
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a single room's profile
    Profile {
        /// Room identifier
        #[arg(long)]
        room: String,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting liveboard v{}", env!("CARGO_PKG_VERSION"));

    let config_path = PathBuf::from(&cli.config);
    let config = if config_path.exists() {
        AppConfig::from_file(&config_path)?
    } else {
        tracing::debug!("No config file at {:?}, using defaults", config_path);
        AppConfig::default()
    };
    config.validate()?;

    let fetcher = Fetcher::new(config.platform.fetcher_config())?;
    let source: Arc<dyn RankingSource> = Arc::new(PlatformClient::new(
        fetcher,
        config.platform.base_url.clone(),
    ));
    let aggregator = Arc::new(RankingAggregator::new(
        source.clone(),
        config.platform.aggregator_config(),
    ));

    match cli.command {
        Commands::Standing {
            event,
            target,
            limit,
            json,
        } => {
            let result = aggregator
                .aggregate(&event, target.as_deref(), limit)
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("\n=== Event {} ===", result.event_id);
            match result.total_participant_count {
                Some(n) => println!("Participants: {}", n),
                None => println!("Participants: unavailable"),
            }

            if let Some(target_id) = &target {
                let standing = &result.target_standing;
                if standing.is_unavailable() {
                    println!("Target {}: not ranked", target_id);
                } else {
                    println!(
                        "Target {}: rank {} with {} points",
                        target_id,
                        standing
                            .rank
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                        standing
                            .score
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                    );
                }
            }

            println!();
            for entry in &result.top_entries {
                let rank = entry
                    .entry
                    .rank
                    .map(|r| format!("#{}", r))
                    .unwrap_or_else(|| "  ".to_string());
                let level = entry
                    .profile
                    .level
                    .map(|l| format!(" (lv {})", l))
                    .unwrap_or_default();
                println!(
                    "  {:>4}  {:<30} {:>12}{}",
                    rank,
                    entry.entry.display_label(),
                    entry.entry.score,
                    level
                );
            }
        }
        Commands::Profile { room, json } => {
            let room_id = match normalize_entity_id_str(&room) {
                Some(id) => id,
                None => {
                    eprintln!("Invalid room id: {:?}", room);
                    std::process::exit(1);
                }
            };

            match source.fetch_profile(&room_id).await {
                Ok(profile) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&profile)?);
                    } else {
                        println!("\n=== Room {} ===", room_id);
                        println!(
                            "Level:      {}",
                            profile
                                .level
                                .map(|l| l.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                        println!(
                            "Tier:       {}",
                            profile.tier_label.as_deref().unwrap_or("-")
                        );
                        println!(
                            "Followers:  {}",
                            profile
                                .follower_count
                                .map(|f| f.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                        println!(
                            "Streak:     {}",
                            profile
                                .streak_days
                                .map(|d| format!("{} days", d))
                                .unwrap_or_else(|| "-".to_string())
                        );
                        if profile.is_verified == Some(true) {
                            println!("Verified:   yes");
                        }
                    }
                }
                Err(FetchError::NotFound) => {
                    eprintln!("Room {} not found", room_id);
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Profile fetch failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let state = AppState { aggregator, source };
            let app = liveboard::api::build_router(state, &config.server.cors_origin);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
