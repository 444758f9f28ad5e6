use std::sync::Arc;

use anyhow::Context;

use order_desk::bot::OrderBot;
use order_desk::channels::{ChannelManager, CliChannel, TelegramChannel};
use order_desk::config::BotConfig;
use order_desk::conversation::{ConversationEngine, SessionStore, SystemClock};
use order_desk::matching::MatchWeights;
use order_desk::store::{LibSqlStore, ReferenceData, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    eprintln!("🧾 Order Desk v{}", env!("CARGO_PKG_VERSION"));

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    if let Some(ref seed_path) = config.seed_file {
        seed::import_seed(&store, seed_path)
            .await
            .with_context(|| format!("failed to import seed {}", seed_path.display()))?;
        eprintln!("   Seed: {}", seed_path.display());
    }

    // ── Matching ─────────────────────────────────────────────────────────
    let weights = match config.weights_file {
        Some(ref path) => MatchWeights::from_json_file(path)
            .with_context(|| format!("failed to load weights {}", path.display()))?,
        None => MatchWeights::default(),
    };

    let reference = ReferenceData::load(store.as_ref(), store.as_ref()).await;
    eprintln!(
        "   Catalog: {} products, {} addresses{}",
        reference.catalog.len(),
        reference.addresses.len(),
        if reference.fallback { " (built-in)" } else { "" }
    );

    // ── Conversation engine ──────────────────────────────────────────────
    let idle_timeout = chrono::Duration::from_std(config.session_idle_timeout)
        .context("session idle timeout out of range")?;
    let sessions = Arc::new(SessionStore::new(Arc::new(SystemClock), idle_timeout));
    let engine = Arc::new(ConversationEngine::new(
        sessions,
        store.clone(),
        reference,
        weights,
    ));

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();

    if config.cli_enabled {
        channels.add(Box::new(CliChannel::default()));
    }

    if let Some(telegram) = config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        let channel = TelegramChannel::new(telegram.bot_token, telegram.allowed_users)
            .with_max_message_len(config.max_message_len)
            .with_part_delay(config.part_delay);
        channels.add(Box::new(channel));
    }

    if channels.is_empty() {
        anyhow::bail!("no channels enabled: set TELEGRAM_BOT_TOKEN or ORDER_DESK_CLI=1");
    }
    eprintln!("   Channels: {}\n", channels.names().join(", "));

    for (name, health) in channels.health_check_all().await {
        if let Err(e) = health {
            tracing::warn!(channel = %name, error = %e, "Channel health check failed");
        }
    }

    OrderBot::new(engine, channels, config.sweep_interval)
        .run()
        .await?;

    Ok(())
}
