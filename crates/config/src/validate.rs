//! Startup validation: required settings per enabled platform plus a few
//! sanity checks on tunables.

use {secrecy::ExposeSecret, sheetbot_common::Platform};

use crate::{
    error::{Error, Result},
    schema::SheetbotConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted config path, e.g. "sheets.spreadsheet_id".
    pub path: &'static str,
    /// Environment variable that supplies the same setting, if any.
    pub env: Option<&'static str>,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.path)?;
        if let Some(env) = self.env {
            write!(f, " ({env})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Names of missing required settings, env-var names preferred.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.env.unwrap_or(d.path).to_string())
            .collect()
    }

    fn require(&mut self, present: bool, path: &'static str, env: &'static str) {
        if !present {
            self.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                path,
                env: Some(env),
                message: "required setting is not set".into(),
            });
        }
    }

    fn warn(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            env: None,
            message: message.into(),
        });
    }
}

/// Check a resolved config without failing.
#[must_use]
pub fn validate(cfg: &SheetbotConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let platforms = cfg.bot.platform;

    if platforms.includes(Platform::Telegram) {
        result.require(
            !cfg.telegram.token.expose_secret().trim().is_empty(),
            "telegram.token",
            "TELEGRAM_BOT_TOKEN",
        );
    }

    if platforms.includes(Platform::Whatsapp) {
        result.require(
            !cfg.whatsapp.account_sid.trim().is_empty(),
            "whatsapp.account_sid",
            "TWILIO_ACCOUNT_SID",
        );
        result.require(
            !cfg.whatsapp.auth_token.expose_secret().trim().is_empty(),
            "whatsapp.auth_token",
            "TWILIO_AUTH_TOKEN",
        );
        result.require(
            !cfg.whatsapp.phone_number.trim().is_empty(),
            "whatsapp.phone_number",
            "TWILIO_PHONE_NUMBER",
        );
        if !cfg.whatsapp.path.starts_with('/') {
            result.warn("whatsapp.path", "webhook path should start with '/'");
        }
    }

    result.require(
        !cfg.sheets.spreadsheet_id.trim().is_empty(),
        "sheets.spreadsheet_id",
        "SPREADSHEET_ID",
    );
    result.require(
        !cfg.sheets.sheet_name.trim().is_empty(),
        "sheets.sheet_name",
        "SHEET_NAME",
    );

    if cfg.bot.store_timeout_secs == 0 {
        result.warn(
            "bot.store_timeout_secs",
            "a zero timeout makes every sheet update fail",
        );
    }

    result
}

/// Fail with [`Error::Missing`] when any required setting is absent.
pub fn ensure_ready(cfg: &SheetbotConfig) -> Result<ValidationResult> {
    let result = validate(cfg);
    if result.has_errors() {
        return Err(Error::Missing(result.missing()));
    }
    Ok(result)
}
