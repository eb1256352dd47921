use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use serenity::all::{Client, GatewayIntents, GuildId};
use tokio::sync::OnceCell;
use tracing::{error, info};

use media_recap::config::Config;
use media_recap::discord::{DiscordPlatform, Handler};
use media_recap::health::{self, HealthState};
use media_recap::logging;
use media_recap::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "media-recap")]
#[command(about = "Discord media contribution recap bot", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory for rolling log files (console only when omitted).
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_dir.as_deref())?;

    let config = Arc::new(Config::load(&cli.config)?);
    info!(
        channels = config.channels.len(),
        categories = config.categories.len(),
        tracked_roles = config.tracked_roles.len(),
        timezone = %config.timezone,
        "configuration loaded"
    );

    let token = std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?;

    let health = HealthState::new();
    let health_port = config.health_port;
    let health_for_server = health.clone();
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port, health_for_server).await {
            error!(error = %e, "health endpoint terminated");
        }
    });

    // The scheduler needs the client's HTTP handle, which only exists once
    // the client is built; the handler receives it through this cell.
    let scheduler_cell: Arc<OnceCell<Arc<Scheduler>>> = Arc::new(OnceCell::new());
    let handler = Handler::new(config.clone(), scheduler_cell.clone(), health);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .context("Failed to build Discord client")?;

    let platform = Arc::new(DiscordPlatform::new(
        client.http.clone(),
        GuildId::new(config.guild_id),
    ));
    let scheduler = Arc::new(Scheduler::new(platform, config)?);
    scheduler.spawn_schedules();
    scheduler_cell
        .set(scheduler)
        .map_err(|_| anyhow::anyhow!("scheduler cell already set"))?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Discord client stopped")?;
    Ok(())
}
