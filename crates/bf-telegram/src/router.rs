use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use tokio::sync::Mutex;

use bf_core::{aggregator::Aggregator, catalog::QueryCatalog, config::Config};

use crate::cooldown::Cooldown;
use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub catalog: QueryCatalog,
    pub aggregator: Arc<Aggregator>,
    pub cooldown: Arc<Mutex<Cooldown>>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            catalog: cfg.catalog(),
            cooldown: Arc::new(Mutex::new(Cooldown::new(cfg.command_cooldown))),
            cfg,
            aggregator,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>, aggregator: Arc<Aggregator>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    let keys = aggregator.rotator().len().await;
    tracing::info!(
        channels = aggregator.channels().len(),
        keys,
        "search core ready"
    );

    // Command menu in the Telegram client (replaces slash-command autocomplete).
    if let Err(e) = bot.set_my_commands(command_menu()).await {
        tracing::warn!(error = %e, "failed to register command menu");
    }

    let state = Arc::new(AppState::new(cfg, aggregator));

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn command_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("find_bases", "Find base links: /find_bases <level> <type>"),
        BotCommand::new("levels", "List accepted levels and base types"),
        BotCommand::new("status", "Show API key and cache status"),
        BotCommand::new("help", "How to use this bot"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_menu_uses_valid_command_names() {
        for c in command_menu() {
            assert!(c
                .command
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'));
            assert!(!c.description.is_empty());
        }
    }
}
