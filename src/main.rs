use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use totem_bot::bot::ZooBot;
use totem_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use totem_bot::config::BotConfig;
use totem_bot::quiz::{QuizController, QuizDefinition};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = BotConfig::load_env_file(None);
    let config = match BotConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing: stderr plus <log dir>/bot.log
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(&config.log_dir, "bot.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    eprintln!("🐾 Totem Bot v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &env_file {
        eprintln!("   Env file: {}", path.display());
    }

    let definition = match &config.quiz_path {
        Some(path) => {
            eprintln!("   Quiz: {}", path.display());
            QuizDefinition::load(path)
                .await
                .with_context(|| format!("loading quiz from {}", path.display()))?
        }
        None => {
            eprintln!("   Quiz: built-in");
            QuizDefinition::builtin().context("parsing built-in quiz")?
        }
    };
    let controller: Arc<QuizController> =
        QuizController::from_definition(definition).context("invalid quiz definition")?;
    tracing::info!(
        questions = controller.bank().question_count(),
        "Quiz loaded"
    );

    let mut channels = ChannelManager::new();

    if let Some(token) = config.telegram_token.clone() {
        eprintln!("   Telegram: enabled");
        channels.add(Box::new(TelegramChannel::new(
            token,
            config.allowed_users.clone(),
        )));
    }

    if config.cli_enabled {
        eprintln!("   CLI: enabled (type /start, prefix button tokens with @)");
        channels.add(Box::new(CliChannel::new()));
    }

    eprintln!("   Feedback log: {}", config.feedback_path.display());
    eprintln!();

    let bot = ZooBot::new(config, controller, channels);
    bot.run().await?;

    Ok(())
}
