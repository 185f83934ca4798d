use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    sheetbot_config::TelegramConfig,
    sheetbot_dispatch::Dispatcher,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Error, Result},
    handlers,
    state::BotState,
};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Commands advertised to Telegram clients for autocomplete.
fn bot_commands(dispatcher: &Dispatcher) -> Vec<BotCommand> {
    std::iter::once(BotCommand::new("start", "Start the bot"))
        .chain(
            dispatcher
                .registry()
                .list()
                .map(|(name, description)| BotCommand::new(name, description)),
        )
        .collect()
}

/// Connect the bot and start the long-polling loop.
///
/// Spawns a background task that processes updates until the returned
/// `CancellationToken` is cancelled.
pub async fn start_polling(
    config: &TelegramConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<CancellationToken> {
    let token = config.token.expose_secret();
    if token.is_empty() {
        return Err(Error::MissingToken);
    }

    // The HTTP client timeout must outlast the long poll, or requests abort
    // before Telegram answers.
    let poll_timeout = config.poll_timeout_secs;
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(poll_timeout) + 15))
        .build()
        .map_err(|e| Error::external("build telegram http client", e))?;
    let bot = Bot::with_client(token, client);

    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Long polling does not work while a webhook is set.
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(bot_commands(&dispatcher)).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(
        username = ?bot_username,
        "telegram bot connected (webhook cleared)"
    );

    let cancel = CancellationToken::new();
    let state = Arc::new(BotState {
        bot: bot.clone(),
        bot_username,
        dispatcher,
    });

    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = loop_cancel.cancelled() => {
                    info!("telegram polling stopped");
                    break;
                },
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(poll_timeout)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                debug!(chat_id = msg.chat.id.0, "received telegram message");
                                let state = Arc::clone(&state);
                                tokio::spawn(async move {
                                    let chat_id = msg.chat.id.0;
                                    if let Err(e) =
                                        handlers::handle_message_direct(msg, &state).await
                                    {
                                        error!(
                                            chat_id,
                                            error = %e,
                                            "error handling telegram message"
                                        );
                                    }
                                });
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    // Another process is polling with the same token.
                    let is_conflict =
                        matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates));

                    if is_conflict {
                        warn!(
                            "telegram bot disabled: another instance is already running with this token"
                        );
                        loop_cancel.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = loop_cancel.cancelled() => break,
                        () = tokio::time::sleep(RETRY_DELAY) => {},
                    }
                },
            }
        }
    });

    Ok(cancel)
}
