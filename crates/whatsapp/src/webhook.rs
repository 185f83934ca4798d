//! Twilio inbound-message webhook.

use std::sync::Arc;

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode, Uri, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    secrecy::{ExposeSecret, Secret},
    sheetbot_common::Platform,
    sheetbot_config::WhatsAppConfig,
    sheetbot_dispatch::Dispatcher,
    tracing::{debug, warn},
    url::form_urlencoded,
};

use crate::{signature, twiml};

/// The fields of Twilio's webhook form this adapter reads. Everything else
/// Twilio sends only feeds the signature check.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub body: String,
    pub from: String,
    pub account_sid: String,
}

impl InboundMessage {
    pub fn from_params(params: &[(String, String)]) -> Self {
        let mut message = Self::default();
        for (name, value) in params {
            match name.as_str() {
                "Body" => message.body.clone_from(value),
                "From" => message.from.clone_from(value),
                "AccountSid" => message.account_sid.clone_from(value),
                _ => {},
            }
        }
        message
    }
}

/// Credentials the webhook checks every request against.
pub struct WebhookAuth {
    auth_token: Secret<String>,
    account_sid: String,
    public_url: Option<String>,
}

impl WebhookAuth {
    /// `None` when no auth token is configured, which disables verification.
    pub fn from_config(config: &WhatsAppConfig) -> Option<Self> {
        let token = config.auth_token.expose_secret().trim();
        if token.is_empty() {
            return None;
        }
        let public_url = config.public_url.trim();
        Some(Self {
            auth_token: Secret::new(token.to_string()),
            account_sid: config.account_sid.trim().to_string(),
            public_url: (!public_url.is_empty()).then(|| public_url.to_string()),
        })
    }

    /// The URL Twilio signed: the configured public URL, or one rebuilt from
    /// the request as a reverse proxy forwards it.
    fn signed_url(&self, headers: &HeaderMap, uri: &Uri) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let header_value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let scheme = header_value("x-forwarded-proto").unwrap_or("http");
        let host = header_value("x-forwarded-host")
            .or_else(|| header_value(header::HOST.as_str()))
            .unwrap_or_default();
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("{scheme}://{host}{path}")
    }

    fn verify(&self, headers: &HeaderMap, uri: &Uri, params: &[(String, String)]) -> bool {
        let Some(sig) = headers
            .get(signature::SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let url = self.signed_url(headers, uri);
        let valid =
            signature::verify_signature(self.auth_token.expose_secret(), &url, params, sig);
        if !valid {
            debug!(url = %url, "twilio signature mismatch");
        }
        valid
    }
}

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Option<Arc<WebhookAuth>>,
}

/// Build the webhook router: `POST {config.path}` plus `GET /health`.
pub fn router(config: &WhatsAppConfig, dispatcher: Arc<Dispatcher>) -> Router {
    let path = if config.path.starts_with('/') {
        config.path.clone()
    } else {
        format!("/{}", config.path)
    };
    let auth = WebhookAuth::from_config(config).map(Arc::new);
    if auth.is_none() {
        warn!("no twilio auth token configured, webhook signatures are not verified");
    }
    Router::new()
        .route("/health", get(health_handler))
        .route(&path, post(whatsapp_webhook))
        .with_state(WebhookState { dispatcher, auth })
}

async fn whatsapp_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    let params: Vec<(String, String)> = form_urlencoded::parse(&body).into_owned().collect();
    let message = InboundMessage::from_params(&params);

    if let Some(auth) = &state.auth {
        if !auth.verify(&headers, &uri, &params) {
            warn!("rejecting whatsapp webhook with a missing or invalid signature");
            return (StatusCode::FORBIDDEN, "invalid signature").into_response();
        }
        if !auth.account_sid.is_empty() && message.account_sid != auth.account_sid {
            warn!(
                account_sid = %message.account_sid,
                "rejecting webhook for another twilio account"
            );
            return (StatusCode::FORBIDDEN, "unknown account").into_response();
        }
    }

    let sender = message.from.trim();
    if sender.is_empty() {
        warn!("whatsapp webhook called without a From field");
        return (StatusCode::BAD_REQUEST, "missing From").into_response();
    }

    debug!(sender, "received whatsapp message");
    let reply = state
        .dispatcher
        .handle(Platform::Whatsapp, sender, message.body.trim())
        .await;

    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml::message_response(&reply.text),
    )
        .into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
