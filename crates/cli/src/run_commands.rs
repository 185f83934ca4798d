//! `sheetbot run`: wire the store, dispatcher and adapters together and
//! serve until Ctrl-C.

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Result, anyhow},
    sheetbot_common::Platform,
    sheetbot_config::{Severity, SheetbotConfig, ensure_ready},
    sheetbot_dispatch::{CommandRegistry, DispatchSettings, Dispatcher, TabularStore},
    sheetbot_sheets::SheetsClient,
    tokio::task::JoinSet,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

pub fn dispatch_settings(config: &SheetbotConfig) -> DispatchSettings {
    let ttl = config.bot.confirmation_ttl_secs;
    DispatchSettings {
        confirmation_required: config.bot.confirmation_required,
        sheet_name: config.sheets.sheet_name.clone(),
        store_timeout: Duration::from_secs(config.bot.store_timeout_secs),
        confirmation_ttl: (ttl > 0).then(|| Duration::from_secs(ttl)),
    }
}

pub async fn run(config: SheetbotConfig) -> Result<()> {
    let report = ensure_ready(&config)?;
    for d in report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
    {
        warn!(path = d.path, "{}", d.message);
    }

    let store: Arc<dyn TabularStore> = Arc::new(SheetsClient::from_config(&config.sheets)?);
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(CommandRegistry::with_builtins()),
        store,
        dispatch_settings(&config),
    ));
    info!(
        confirmation_required = config.bot.confirmation_required,
        sheet = %config.sheets.sheet_name,
        "dispatcher ready"
    );

    let shutdown = CancellationToken::new();
    let mut channels: JoinSet<(Platform, Result<()>)> = JoinSet::new();
    let mut telegram_polling = None;

    if config.bot.platform.includes(Platform::Telegram) {
        let polling =
            sheetbot_telegram::start_polling(&config.telegram, Arc::clone(&dispatcher)).await?;
        let stopped = polling.clone();
        channels.spawn(async move {
            stopped.cancelled().await;
            (Platform::Telegram, Ok(()))
        });
        telegram_polling = Some(polling);
    }

    if config.bot.platform.includes(Platform::Whatsapp) {
        let whatsapp = config.whatsapp.clone();
        let dispatcher = Arc::clone(&dispatcher);
        let cancel = shutdown.clone();
        channels.spawn(async move {
            let result = sheetbot_whatsapp::serve(&whatsapp, dispatcher, cancel).await;
            (Platform::Whatsapp, result.map_err(Into::into))
        });
    }

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("shutdown requested");
                break Ok(());
            },
            joined = channels.join_next() => match joined {
                Some(Ok((platform, Ok(())))) => {
                    warn!(platform = %platform, "channel stopped");
                },
                Some(Ok((platform, Err(e)))) => {
                    error!(platform = %platform, error = %e, "channel failed");
                },
                Some(Err(e)) => {
                    error!(error = %e, "channel task panicked");
                },
                None => break Err(anyhow!("no channels left running")),
            },
        }
    };

    shutdown.cancel();
    if let Some(polling) = telegram_polling {
        polling.cancel();
    }
    while channels.join_next().await.is_some() {}

    outcome?;
    info!("sheetbot stopped");
    Ok(())
}
