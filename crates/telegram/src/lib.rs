//! Telegram long-polling adapter.
//!
//! Receives text messages through the Bot API, hands them to the shared
//! [`Dispatcher`](sheetbot_dispatch::Dispatcher) keyed by chat id, and sends
//! each reply back to the originating chat.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod state;

pub use {
    bot::start_polling,
    error::{Error, Result},
    state::BotState,
};
