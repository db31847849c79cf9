use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use nutriplay::auth::{self, TokenProvider};
use nutriplay::catalog;
use nutriplay::config;
use nutriplay::console::{self, Command, Player};
use nutriplay::notes;
use nutriplay::progress::ProgressTracker;
use nutriplay::store::{CourseStore, RestCourseStore};

#[derive(Debug, Parser)]
#[command(author, version, about = "Console player for nutrition-coaching courses")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Course slug to open
    #[arg(long, default_value = "masterclass-nutrir-ciclo")]
    course: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/notes.db", cfg.app.data_dir));
    let notes_pool = notes::init_pool(&database_url).await?;
    notes::run_migrations(&notes_pool).await?;

    let tokens = auth::provider_from_config(&cfg);
    let store: Arc<dyn CourseStore> = Arc::new(RestCourseStore::from_config(&cfg, tokens.clone())?);

    let user = match tokens.identity().await {
        Ok(identity) => identity.map(|i| i.user_id),
        Err(err) => {
            warn!(?err, "sign-in failed; browsing anonymously");
            None
        }
    };

    info!(course = %args.course, signed_in = user.is_some(), "loading catalog");
    let loaded = catalog::load_catalog(
        store.as_ref(),
        &args.course,
        user,
        cfg.remote.storage.signed_url_ttl_seconds,
    )
    .await;
    if loaded.is_empty() {
        warn!("no playable videos found");
    }

    let tracker = ProgressTracker::new(store, tokens);
    let mut player = Player::new(
        loaded,
        tracker,
        notes_pool,
        cfg.app.position_save_interval_seconds,
    );
    player.handle_command(Command::List).await?;
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    clock.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed; save and exit like `quit`.
                    player.handle_command(Command::Quit).await?;
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match console::parse_command(&line) {
                    Some(cmd) => {
                        if !player.handle_command(cmd).await? {
                            break;
                        }
                    }
                    None => println!("Unknown command. Type `help`."),
                }
            }
            _ = clock.tick() => {
                player.handle_clock_tick().await;
            }
        }
    }

    Ok(())
}
