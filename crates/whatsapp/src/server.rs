use std::sync::Arc;

use {
    sheetbot_config::WhatsAppConfig,
    sheetbot_dispatch::Dispatcher,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::{
    error::{Error, Result},
    webhook,
};

/// Serve the webhook until `cancel` fires.
pub async fn serve(
    config: &WhatsAppConfig,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(
        addr = %addr,
        path = %config.path,
        number = %config.phone_number,
        "whatsapp webhook listening"
    );

    let app = webhook::router(config, dispatcher);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("whatsapp webhook stopped");
    Ok(())
}
