//! Telegram update handlers.
//!
//! Commands are the only input the bot understands; plain text in a private
//! chat gets the help text, anything else is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(bot, msg, state).await;
    }

    if msg.chat.is_private() {
        commands::send_help(&bot, &msg, &state).await;
    }

    Ok(())
}
