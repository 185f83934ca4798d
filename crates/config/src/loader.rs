use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SheetbotConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "sheetbot.toml",
    "sheetbot.yaml",
    "sheetbot.yml",
    "sheetbot.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SheetbotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./sheetbot.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/sheetbot/sheetbot.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SheetbotConfig::default()` if no config file is found. A file
/// that exists but fails to load is an error, the same as with `--config`.
/// Settings may still arrive through the environment.
pub fn discover_and_load() -> Result<SheetbotConfig> {
    load_discovered(find_config_file())
}

fn load_discovered(found: Option<PathBuf>) -> Result<SheetbotConfig> {
    match found {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(SheetbotConfig::default())
        },
    }
}

/// Load from `explicit` when given, otherwise discover. Environment
/// overrides are applied on top in both cases.
pub fn load(explicit: Option<&Path>) -> Result<SheetbotConfig> {
    let mut cfg = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load()?,
    };
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/sheetbot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sheetbot").map(|d| d.config_dir().to_path_buf())
}

/// Apply the process environment on top of file settings.
pub fn apply_env_overrides(cfg: &mut SheetbotConfig) -> Result<()> {
    apply_env_overrides_with(cfg, |name| std::env::var(name).ok())
}

/// Apply overrides using a custom lookup, so tests never touch the real
/// process environment. Empty variables count as unset.
pub fn apply_env_overrides_with(
    cfg: &mut SheetbotConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PLATFORM") {
        cfg.bot.platform = v.parse()?;
    }
    if let Some(v) = get("CONFIRMATION_REQUIRED") {
        cfg.bot.confirmation_required = parse_bool("CONFIRMATION_REQUIRED", &v)?;
    }
    if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
        cfg.telegram.token = Secret::new(v);
    }
    if let Some(v) = get("TWILIO_ACCOUNT_SID") {
        cfg.whatsapp.account_sid = v;
    }
    if let Some(v) = get("TWILIO_AUTH_TOKEN") {
        cfg.whatsapp.auth_token = Secret::new(v);
    }
    if let Some(v) = get("TWILIO_PHONE_NUMBER") {
        cfg.whatsapp.phone_number = v;
    }
    if let Some(v) = get("TWILIO_WEBHOOK_URL") {
        cfg.whatsapp.public_url = v;
    }
    if let Some(v) = get("HOST") {
        cfg.whatsapp.bind = v;
    }
    if let Some(v) = get("PORT") {
        cfg.whatsapp.port = v
            .trim()
            .parse()
            .map_err(|_| Error::invalid_value("PORT", &v, "expected a port number"))?;
    }
    if let Some(v) = get("SPREADSHEET_ID") {
        cfg.sheets.spreadsheet_id = v;
    }
    if let Some(v) = get("SHEET_NAME") {
        cfg.sheets.sheet_name = v;
    }
    if let Some(v) = get("GOOGLE_CREDENTIALS_FILE") {
        cfg.sheets.credentials_path = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        cfg.logging.level = v.to_ascii_lowercase();
    }
    if let Some(v) = get("LOG_FILE") {
        cfg.logging.file = Some(v);
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_value(key, value, "expected true or false")),
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<SheetbotConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
