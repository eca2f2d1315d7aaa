use std::{sync::Arc, time::Duration};

use teloxide::{
    prelude::*,
    types::{ChatAction, ParseMode},
};

use bf_core::{
    catalog::{CatalogError, QueryCatalog},
    domain::{Query, UserId},
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn format_duration(d: Duration) -> String {
    // Round up so "0s" is never shown while still cooling down.
    let seconds = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    let mins = seconds / 60;
    let secs = seconds % 60;
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn help_text(catalog: &QueryCatalog) -> String {
    format!(
        "🏰 <b>Base Finder</b>\n\n\
         <code>/find_bases &lt;level&gt; &lt;type&gt;</code> finds fresh base layout links \
         posted by curated YouTube channels.\n\n\
         Example: <code>/find_bases {} {}</code>\n\n\
         /levels lists accepted values, /status shows API quota status.",
        escape_html(catalog.levels().first().map(String::as_str).unwrap_or("TH16")),
        escape_html(catalog.categories().first().map(String::as_str).unwrap_or("War")),
    )
}

fn levels_text(catalog: &QueryCatalog) -> String {
    format!(
        "<b>Levels:</b> {}\n<b>Base types:</b> {}",
        escape_html(&catalog.levels().join(", ")),
        escape_html(&catalog.categories().join(", ")),
    )
}

fn invalid_query_text(catalog: &QueryCatalog, err: &CatalogError) -> String {
    let (what, input, suggestions, all) = match err {
        CatalogError::UnknownLevel(input) => (
            "Town Hall level",
            input,
            catalog.suggest_levels(input),
            catalog.levels(),
        ),
        CatalogError::UnknownCategory(input) => (
            "base type",
            input,
            catalog.suggest_categories(input),
            catalog.categories(),
        ),
    };

    let mut out = format!(
        "❌ Invalid {what} <code>{}</code>. Please use one of: {}.",
        escape_html(input),
        escape_html(&all.join(", "))
    );
    if !input.is_empty() && !suggestions.is_empty() {
        out.push_str(&format!(
            "\nDid you mean: {}?",
            escape_html(&suggestions.join(", "))
        ));
    }
    out
}

fn links_text(query: &Query, links: &[String]) -> String {
    let list = links
        .iter()
        .map(|l| format!("🔗 {}", escape_html(l)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🎯 <b>Clash of Clans base links for {}:</b>\n\n{list}\n\n\
         📌 <b>Please note:</b> these layouts are shared as-is. Inspect them for gaps \
         or issues before use.",
        escape_html(&query.to_string())
    )
}

fn no_links_text(query: &Query, window_days: u32) -> String {
    format!(
        "❌ No valid links found for <b>{}</b> in the last {window_days} days. Please try again later.",
        escape_html(&query.to_string())
    )
}

async fn reply_html(bot: &Bot, msg: &Message, html: String) {
    if let Err(e) = bot
        .send_message(msg.chat.id, html)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true)
        .await
    {
        tracing::warn!(chat = msg.chat.id.0, error = %e, "failed to send reply");
    }
}

pub async fn send_help(bot: &Bot, msg: &Message, state: &AppState) {
    reply_html(bot, msg, help_text(&state.catalog)).await;
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = msg.text().unwrap_or("");
    let (cmd, args) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => send_help(&bot, &msg, &state).await,
        "levels" => reply_html(&bot, &msg, levels_text(&state.catalog)).await,
        "status" => reply_html(&bot, &msg, status_text(&state).await).await,
        "find_bases" | "find" => find_bases(&bot, &msg, &state, &args).await,
        _ => {
            let html = format!(
                "Unknown command: /{}. Try /help.",
                escape_html(&cmd)
            );
            reply_html(&bot, &msg, html).await;
        }
    }

    Ok(())
}

async fn status_text(state: &AppState) -> String {
    let agg = &state.aggregator;
    let keys = agg.rotator().statuses().await;
    let usable = keys.iter().filter(|k| !k.exhausted).count();

    let mut out = format!(
        "📊 <b>Status</b>\n\nChannels: {}\nCached queries: {}\nAPI keys usable: {usable}/{}\n",
        agg.channels().len(),
        agg.cache().len().await,
        keys.len()
    );
    for k in &keys {
        let label = if k.exhausted { "exhausted" } else { "ok" };
        out.push_str(&format!(
            "\n<code>{}</code> {} / {} ({label})",
            escape_html(&k.label),
            k.usage,
            state.cfg.quota_limit
        ));
    }
    out
}

async fn find_bases(bot: &Bot, msg: &Message, state: &AppState, args: &str) {
    let mut parts = args.split_whitespace();
    let (Some(level), Some(category), None) = (parts.next(), parts.next(), parts.next()) else {
        let html = format!(
            "Usage: <code>/find_bases &lt;level&gt; &lt;type&gt;</code>\n\n{}",
            levels_text(&state.catalog)
        );
        reply_html(bot, msg, html).await;
        return;
    };

    let query = match state.catalog.parse(level, category) {
        Ok(q) => q,
        Err(e) => {
            reply_html(bot, msg, invalid_query_text(&state.catalog, &e)).await;
            return;
        }
    };

    let Some(user) = msg.from() else {
        return;
    };
    let user_id = UserId(user.id.0 as i64);

    let (allowed, retry_after) = state.cooldown.lock().await.check(user_id);
    if !allowed {
        let wait = retry_after.map(format_duration).unwrap_or_default();
        let html = format!("⏳ This command is on cooldown. Try again in {wait}.");
        reply_html(bot, msg, html).await;
        return;
    }

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    tracing::info!(user = user_id.0, %query, "find_bases requested");

    let links = state
        .aggregator
        .find_links(&query, state.cfg.max_links_per_request)
        .await;

    if links.is_empty() {
        reply_html(bot, msg, no_links_text(&query, state.cfg.search_window_days)).await;
        return;
    }

    let html = links_text(&query, &links);
    if msg.chat.is_private() {
        reply_html(bot, msg, html).await;
        return;
    }

    // Group chat: deliver privately, confirm in the group.
    let dm = teloxide::types::ChatId(user_id.0);
    match bot
        .send_message(dm, html)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true)
        .await
    {
        Ok(_) => reply_html(bot, msg, "✅ Links have been sent to your DMs!".to_string()).await,
        Err(e) => {
            tracing::info!(user = user_id.0, error = %e, "direct message refused");
            reply_html(
                bot,
                msg,
                "❌ Unable to send you a DM. Please start a private chat with me first.".to_string(),
            )
            .await;
        }
    }
}
