use std::path::Path;

use {
    anyhow::{Result, bail},
    sheetbot_config::{Severity, SheetbotConfig, find_config_file, template, validate},
};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// `sheetbot check-config`: print every diagnostic, fail on missing settings.
pub fn check(config: &SheetbotConfig, explicit: Option<&Path>) -> Result<()> {
    match explicit.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => eprintln!("Checking {} (plus environment)\n", path.display()),
        None => eprintln!("No config file found; checking environment and defaults.\n"),
    }

    let result = validate(config);
    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        let env = d.env.map(|e| format!(" [{e}]")).unwrap_or_default();
        eprintln!(
            "  {color}{BOLD}{label}{RESET} {}{env}: {}",
            d.path, d.message
        );
    }

    if result.has_errors() {
        bail!(
            "missing required settings: {}",
            result.missing().join(", ")
        );
    }

    let platforms: Vec<_> = config
        .bot
        .platform
        .platforms()
        .iter()
        .map(ToString::to_string)
        .collect();
    eprintln!(
        "{GREEN}{BOLD}ok{RESET} configuration complete; platforms: {}",
        platforms.join(", ")
    );
    Ok(())
}

/// `sheetbot extract TEXT`: show what the extractor makes of a message.
pub fn extract(text: &str) -> Result<()> {
    let Some(fields) = sheetbot_dispatch::extract(text) else {
        bail!("no key=value fields found in {text:?}");
    };
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

/// `sheetbot init [PATH]`: write the documented config template.
pub fn init(path: &Path) -> Result<()> {
    template::write_template(path)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}
