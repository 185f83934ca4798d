//! Message dispatch core.
//!
//! Classifies inbound chat text as a command or a data submission, extracts
//! `key=value` fields, and drives the per-sender confirm/cancel exchange in
//! front of a [`TabularStore`].

pub mod classify;
pub mod commands;
pub mod dispatcher;
pub mod extract;
pub mod pending;
pub mod store;

pub use {
    classify::{COMMAND_PREFIX, ParsedCommand, parse_command},
    commands::{CommandCall, CommandContext, CommandRegistry},
    dispatcher::{DispatchSettings, Dispatcher, Reply, ReplyKind},
    extract::extract,
    pending::{PendingStore, SenderKey},
    store::TabularStore,
};
