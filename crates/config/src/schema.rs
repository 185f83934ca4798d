/// Config schema types (bot behaviour, sheets, channels, logging).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    sheetbot_common::Platform,
};

/// Which chat platforms to serve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformSelection {
    Telegram,
    Whatsapp,
    #[default]
    Both,
}

impl PlatformSelection {
    #[must_use]
    pub fn includes(&self, platform: Platform) -> bool {
        matches!(
            (self, platform),
            (Self::Both, _)
                | (Self::Telegram, Platform::Telegram)
                | (Self::Whatsapp, Platform::Whatsapp)
        )
    }

    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        [Platform::Telegram, Platform::Whatsapp]
            .into_iter()
            .filter(|p| self.includes(*p))
            .collect()
    }
}

impl std::str::FromStr for PlatformSelection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::Whatsapp),
            "both" => Ok(Self::Both),
            other => Err(crate::Error::invalid_value(
                "PLATFORM",
                other,
                "expected telegram, whatsapp or both",
            )),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetbotConfig {
    pub bot: BotConfig,
    pub sheets: SheetsConfig,
    pub telegram: TelegramConfig,
    pub whatsapp: WhatsAppConfig,
    pub logging: LoggingConfig,
}

/// Dispatch behaviour shared by every channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Platforms to start. Defaults to both.
    pub platform: PlatformSelection,
    /// Stage extracted rows and ask the sender for yes/no before writing.
    pub confirmation_required: bool,
    /// Upper bound for a single store call, in seconds.
    pub store_timeout_secs: u64,
    /// How long a staged row waits for a reply. 0 keeps it until answered.
    pub confirmation_ttl_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            platform: PlatformSelection::default(),
            confirmation_required: false,
            store_timeout_secs: 15,
            confirmation_ttl_secs: 300,
        }
    }
}

/// Google Sheets target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Tab name inside the spreadsheet.
    pub sheet_name: String,
    /// Path to the service-account JSON key.
    pub credentials_path: String,
    /// A1-notation range holding the header row.
    pub header_range: String,
    pub api_base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".into(),
            credentials_path: "sheet_credentials.json".into(),
            header_range: "A1:Z1".into(),
            api_base_url: "https://sheets.googleapis.com".into(),
        }
    }
}

/// Telegram bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
    /// Long-poll timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u32,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
        }
    }
}

/// Twilio WhatsApp webhook listener.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    #[serde(serialize_with = "serialize_secret")]
    pub auth_token: Secret<String>,
    /// The Twilio number messages are sent to, e.g. `whatsapp:+14155238886`.
    pub phone_number: String,
    pub bind: String,
    pub port: u16,
    /// Route Twilio posts inbound messages to.
    pub path: String,
    /// The full webhook URL as configured in the Twilio console. Request
    /// signatures are computed over it; when empty the URL is rebuilt from
    /// the request's `Host` and `X-Forwarded-Proto` headers.
    pub public_url: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("phone_number", &self.phone_number)
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: Secret::new(String::new()),
            phone_number: String::new(),
            bind: "0.0.0.0".into(),
            port: 5000,
            path: "/whatsapp".into(),
            public_url: String::new(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write logs to this file when set.
    pub file: Option<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            json: false,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
