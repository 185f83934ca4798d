use {
    sheetbot_common::Platform,
    sheetbot_dispatch::COMMAND_PREFIX,
    teloxide::{
        prelude::*,
        types::{MediaKind, MessageKind},
    },
    tracing::debug,
};

use crate::{error::Result, state::BotState};

/// Reply to `/start`, which Telegram clients send when a chat is opened.
pub const START_GREETING: &str = "Hi! I can help you update your Google Sheet. \
     Send me data in the format: key1=value1, key2=value2\n\n\
     Type /help to see available commands.";

/// Handle a single inbound Telegram message (called from the polling loop).
pub async fn handle_message_direct(msg: Message, state: &BotState) -> Result<()> {
    let Some(text) = extract_text(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };

    let Some(text) = normalize_command(&text, state.bot_username.as_deref()) else {
        debug!(chat_id = msg.chat.id.0, "ignoring command addressed to another bot");
        return Ok(());
    };

    let reply = if is_start(&text) {
        START_GREETING.to_string()
    } else {
        let sender = msg.chat.id.0.to_string();
        state
            .dispatcher
            .handle(Platform::Telegram, &sender, &text)
            .await
            .text
    };

    state.bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Text content of a plain text message.
fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn is_start(text: &str) -> bool {
    text.strip_prefix(COMMAND_PREFIX)
        .and_then(|rest| rest.split_whitespace().next())
        .is_some_and(|name| name.eq_ignore_ascii_case("start"))
}

/// Strip the `@username` suffix Telegram appends to commands in groups.
///
/// Returns `None` when the command names a different bot. Plain text is
/// returned unchanged.
pub fn normalize_command(text: &str, bot_username: Option<&str>) -> Option<String> {
    let Some(body) = text.strip_prefix(COMMAND_PREFIX) else {
        return Some(text.to_string());
    };
    let (token, rest) = match body.find(char::is_whitespace) {
        Some(idx) => body.split_at(idx),
        None => (body, ""),
    };
    let Some((name, target)) = token.split_once('@') else {
        return Some(text.to_string());
    };
    if let Some(ours) = bot_username
        && !target.eq_ignore_ascii_case(ours)
    {
        return None;
    }
    Some(format!("{COMMAND_PREFIX}{name}{rest}"))
}
