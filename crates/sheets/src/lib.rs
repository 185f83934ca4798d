//! Google Sheets v4 backend for the dispatcher's [`TabularStore`].
//!
//! [`TabularStore`]: sheetbot_dispatch::TabularStore

pub mod auth;
pub mod client;
pub mod error;

pub use {
    auth::{AccessTokenSource, ServiceAccountAuth, ServiceAccountKey, StaticToken},
    client::{SheetsClient, row_for_headers},
    error::{Error, Result},
};
