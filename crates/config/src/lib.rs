//! Configuration loading, env overrides, and startup validation.
//!
//! Config files: `sheetbot.toml`, `sheetbot.yaml`, or `sheetbot.json`
//! Searched in `./` then `~/.config/sheetbot/`.
//!
//! Supports `${ENV_VAR}` substitution in the raw file, and the well-known
//! environment variables (`SPREADSHEET_ID`, `TELEGRAM_BOT_TOKEN`, ...) override
//! file values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, apply_env_overrides_with, config_dir, discover_and_load,
        find_config_file, load, load_config,
    },
    schema::{
        BotConfig, LoggingConfig, PlatformSelection, SheetbotConfig, SheetsConfig, TelegramConfig,
        WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, ensure_ready, validate},
};
