mod config_commands;
mod run_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    sheetbot_config::LoggingConfig,
    tracing::info,
    tracing_appender::rolling::{RollingFileAppender, Rotation},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "sheetbot", about = "sheetbot: chat messages to Google Sheets rows")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "SHEETBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the enabled chat adapters (default when no subcommand is given).
    Run,
    /// Validate configuration and report missing settings.
    CheckConfig,
    /// Print the fields extracted from TEXT as JSON.
    Extract { text: String },
    /// Write a documented config template.
    Init {
        #[arg(default_value = "sheetbot.toml")]
        path: PathBuf,
    },
}

/// Load `user.env` when present, otherwise `.env`.
fn load_dotenv() -> Option<PathBuf> {
    let user_env = Path::new("user.env");
    if user_env.exists() {
        dotenvy::from_path(user_env).ok().map(|()| user_env.to_path_buf())
    } else {
        dotenvy::dotenv().ok()
    }
}

/// Split a log file setting into the appender's directory and file name.
fn log_file_parts(file: &str) -> Option<(PathBuf, String)> {
    let path = Path::new(file);
    let name = path.file_name()?.to_string_lossy().into_owned();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}

/// Initialise tracing: stdout plus an optional plain-text file layer.
fn init_telemetry(cli: &Cli, logging: &LoggingConfig) {
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = logging
        .file
        .as_deref()
        .and_then(log_file_parts)
        .map(|(dir, name)| {
            fmt::layer()
                .with_writer(RollingFileAppender::new(Rotation::NEVER, dir, name))
                .with_ansi(false)
        });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs || logging.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_dotenv();
    let cli = Cli::parse();

    // `init` must work even when the current config is broken.
    if let Some(Commands::Init { path }) = &cli.command {
        return config_commands::init(path);
    }

    let config = sheetbot_config::load(cli.config.as_deref())?;
    init_telemetry(&cli, &config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env_file = ?env_file,
        "sheetbot starting"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_commands::run(config).await,
        Commands::CheckConfig => config_commands::check(&config, cli.config.as_deref()),
        Commands::Extract { text } => config_commands::extract(&text),
        Commands::Init { path } => config_commands::init(&path),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["sheetbot"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json_logs);
    }

    #[test]
    fn parses_subcommands_and_globals() {
        let cli = Cli::try_parse_from([
            "sheetbot",
            "extract",
            "qty=5, item=pen",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Extract {
                text: "qty=5, item=pen".into()
            })
        );
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.json_logs);

        let cli = Cli::try_parse_from(["sheetbot", "check-config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckConfig));

        let cli = Cli::try_parse_from(["sheetbot", "init"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Init {
                path: PathBuf::from("sheetbot.toml")
            })
        );
    }

    #[rstest]
    #[case("bot.log", Some((".", "bot.log")))]
    #[case("logs/bot.log", Some(("logs", "bot.log")))]
    #[case("/var/log/sheetbot.log", Some(("/var/log", "sheetbot.log")))]
    #[case("", None)]
    fn splits_log_file(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(dir, name)| (PathBuf::from(dir), name.to_string()));
        assert_eq!(log_file_parts(input), expected);
    }
}
