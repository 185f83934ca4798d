//! Documented config template written by `sheetbot init`.

use std::path::Path;

use crate::error::{Context, Result};

/// Default config with every option and its environment override.
pub fn default_config_template() -> &'static str {
    r##"# sheetbot configuration
# Environment variable substitution is supported: ${ENV_VAR}
# Every setting below can also come from the environment (shown in brackets),
# which takes precedence over this file.

[bot]
platform = "both"               # telegram | whatsapp | both          [PLATFORM]
confirmation_required = false   # ask yes/no before writing a row     [CONFIRMATION_REQUIRED]
store_timeout_secs = 15         # upper bound for a sheet API call
confirmation_ttl_secs = 300     # staged rows expire after this (0 = never)

[sheets]
spreadsheet_id = ""             # from the sheet URL                   [SPREADSHEET_ID]
sheet_name = "Sheet1"           # tab to append rows to               [SHEET_NAME]
credentials_path = "sheet_credentials.json"  # service account key    [GOOGLE_CREDENTIALS_FILE]
header_range = "A1:Z1"          # where column headers live

[telegram]
token = ""                      # from @BotFather                      [TELEGRAM_BOT_TOKEN]
poll_timeout_secs = 30

[whatsapp]
account_sid = ""                #                                      [TWILIO_ACCOUNT_SID]
auth_token = ""                 #                                      [TWILIO_AUTH_TOKEN]
phone_number = ""               # e.g. whatsapp:+14155238886           [TWILIO_PHONE_NUMBER]
bind = "0.0.0.0"                #                                      [HOST]
port = 5000                     #                                      [PORT]
path = "/whatsapp"              # Twilio "when a message comes in" URL path
public_url = ""                 # full webhook URL Twilio signs requests with [TWILIO_WEBHOOK_URL]

[logging]
level = "info"                  # trace | debug | info | warn | error  [LOG_LEVEL]
# file = "bot.log"              # also append logs here                [LOG_FILE]
json = false
"##
}

/// Write the template to `path`, refusing to overwrite an existing file.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(crate::Error::Message(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, default_config_template())
        .with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::schema::SheetbotConfig};

    #[test]
    fn template_parses_to_defaults() {
        let cfg: SheetbotConfig = toml::from_str(default_config_template()).unwrap();
        let defaults = SheetbotConfig::default();
        assert_eq!(cfg.bot.platform, defaults.bot.platform);
        assert_eq!(cfg.bot.store_timeout_secs, defaults.bot.store_timeout_secs);
        assert_eq!(cfg.sheets.sheet_name, defaults.sheets.sheet_name);
        assert_eq!(cfg.whatsapp.port, defaults.whatsapp.port);
        assert_eq!(cfg.logging.file, None);
    }

    #[test]
    fn write_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sheetbot.toml");
        write_template(&path).unwrap();
        assert!(path.exists());
        assert!(write_template(&path).is_err());
    }
}
