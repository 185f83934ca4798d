//! WhatsApp adapter: an axum endpoint for Twilio's inbound-message webhook.
//!
//! Twilio posts each message as a form signed with the account's auth token;
//! the reply goes back in the response body as a TwiML document, so no
//! outbound API call is needed.

pub mod error;
pub mod server;
pub mod signature;
pub mod twiml;
pub mod webhook;

pub use {
    error::{Error, Result},
    server::serve,
    webhook::{InboundMessage, WebhookAuth, WebhookState, router},
};
