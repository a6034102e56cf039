mod checkin;

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use habitual_config::AppConfig;
use habitual_llm::Coach;
use habitual_store::open_store;
use habitual_telegram::format;
use habitual_tracker::{HabitTracker, TrackerError};

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(name = "habitual", version, about = "Daily habit check-ins with streaks and reminders")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the Telegram bot (default).
    Telegram,
    /// Log today's check-in: `[mood 1-5] [message]`.
    Checkin {
        #[arg(long, default_value = "local")]
        user: String,
        /// Overwrite an existing check-in for today without asking.
        #[arg(long)]
        yes: bool,
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    Summary {
        #[arg(long, default_value = "local")]
        user: String,
        /// Print the stats as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show or set the timezone used for "today".
    Timezone {
        #[arg(long, default_value = "local")]
        user: String,
        zone: Option<String>,
    },
    /// Set a daily reminder, e.g. `remind 20:00 CET`.
    Remind {
        #[arg(long, default_value = "local")]
        user: String,
        time: String,
        zone: Option<String>,
    },
    StopReminder {
        #[arg(long, default_value = "local")]
        user: String,
    },
    Reflect {
        #[arg(long, default_value = "local")]
        user: String,
    },
    Rewrite {
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    Idea,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(&config.storage)?;
    info!(backend = store.backend_name(), "storage ready");
    let tracker = Arc::new(HabitTracker::new(store, &config.bot));
    let coach = Coach::from_config(&config.llm)?;
    info!(
        provider = %config.llm.provider,
        model = config.active_model(),
        configured = coach.is_configured(),
        "coach ready"
    );

    match cli.command.unwrap_or(Commands::Telegram) {
        Commands::Telegram => {
            habitual_telegram::start_bot(&config, tracker, coach).await?;
        }
        Commands::Checkin { user, yes, text } => {
            let user = tracker.resolve_user(&user, &user).await?;
            checkin::run_checkin(&tracker, &user, &text.join(" "), yes).await?;
        }
        Commands::Summary { user, json } => {
            let user = tracker.resolve_user(&user, &user).await?;
            let stats = tracker.compute_stats(&user, Utc::now()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", format::summary(&stats));
            }
        }
        Commands::Timezone { user, zone: None } => {
            let user = tracker.resolve_user(&user, &user).await?;
            let tz = tracker
                .store()
                .get_user_timezone(&user.external_id)
                .await?
                .and_then(|name| name.parse().ok());
            println!("{}", format::timezone_current(tz, Utc::now()));
        }
        Commands::Timezone {
            user,
            zone: Some(zone),
        } => {
            let user = tracker.resolve_user(&user, &user).await?;
            match tracker.set_timezone(&user, &zone).await {
                Ok(tz) => println!("{}", format::timezone_set(tz, Utc::now())),
                Err(TrackerError::InvalidTimezone { input }) => {
                    bail!(format::unknown_timezone(&input))
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Remind { user, time, zone } => {
            let user = tracker.resolve_user(&user, &user).await?;
            let setting = tracker
                .set_reminder(&user, &time, zone.as_deref(), Utc::now())
                .await?;
            println!("{}", format::reminder_set(&setting));
        }
        Commands::StopReminder { user } => {
            let user = tracker.resolve_user(&user, &user).await?;
            tracker.clear_reminder(&user).await?;
            println!("{}", format::REMINDER_STOPPED);
        }
        Commands::Reflect { user } => {
            ensure_coach(&coach)?;
            let user = tracker.resolve_user(&user, &user).await?;
            let stats = tracker.compute_stats(&user, Utc::now()).await;
            if stats.total == 0 {
                println!("{}", format::REFLECT_NO_HISTORY);
            } else {
                println!("{}", format::reflection(&coach.reflect(&stats).await?));
            }
        }
        Commands::Rewrite { text } => {
            ensure_coach(&coach)?;
            println!("{}", format::reframed(&coach.rewrite(&text.join(" ")).await?));
        }
        Commands::Idea => {
            ensure_coach(&coach)?;
            println!("{}", format::idea(&coach.idea().await?));
        }
    }

    Ok(())
}

fn ensure_coach(coach: &Coach) -> Result<()> {
    if !coach.is_configured() {
        bail!(format::AI_NOT_CONFIGURED);
    }
    Ok(())
}
