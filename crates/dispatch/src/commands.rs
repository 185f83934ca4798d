//! Command registry and the built-in commands.

use std::{fmt::Write as _, sync::Arc};

use sheetbot_common::Platform;

use crate::classify::COMMAND_PREFIX;

/// Per-invocation data a command handler may read.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub platform: Platform,
    pub sender: String,
    pub sheet_name: String,
    /// Column headers fetched from the store for this invocation. Empty when
    /// the fetch failed.
    pub columns: Vec<String>,
}

/// Everything handed to a command handler.
pub struct CommandCall<'a> {
    pub args: &'a [String],
    pub context: &'a CommandContext,
    pub registry: &'a CommandRegistry,
}

type Handler = Arc<dyn Fn(&CommandCall<'_>) -> String + Send + Sync>;

struct CommandEntry {
    name: String,
    description: String,
    handler: Handler,
}

/// Ordered set of named commands.
///
/// Built once at startup, then shared read-only.
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry holding `help`, `status`, `format`, `columns` and `update`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("help", "Show available commands", help);
        registry.register("status", "Check bot status", status);
        registry.register("format", "Show message format examples", format_examples);
        registry.register("columns", "Show available columns in the sheet", columns);
        registry.register(UPDATE_COMMAND, "Add a row: /update key=value, ...", update_usage);
        registry
    }

    /// Register `handler` under the lower-cased `name`. Re-registering a name
    /// replaces it in place.
    pub fn register<F>(&mut self, name: &str, description: &str, handler: F)
    where
        F: Fn(&CommandCall<'_>) -> String + Send + Sync + 'static,
    {
        let name = name.to_lowercase();
        let entry = CommandEntry {
            name,
            description: description.to_string(),
            handler: Arc::new(handler),
        };
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// `(name, description)` pairs in registration order.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.description.as_str()))
    }

    /// Run the named command, or explain that it does not exist.
    pub fn dispatch(&self, name: &str, args: &[String], context: &CommandContext) -> String {
        match self.entries.iter().find(|e| e.name == name) {
            Some(entry) => (entry.handler)(&CommandCall {
                args,
                context,
                registry: self,
            }),
            None => format!(
                "Unknown command: {name}. Type {COMMAND_PREFIX}help to see available commands."
            ),
        }
    }
}

/// Command whose remainder is treated as a data submission.
pub const UPDATE_COMMAND: &str = "update";

fn help(call: &CommandCall<'_>) -> String {
    let mut text = String::from("Available commands:\n\n");
    for (name, description) in call.registry.list() {
        let _ = writeln!(text, "{COMMAND_PREFIX}{name} - {description}");
    }
    text
}

fn status(call: &CommandCall<'_>) -> String {
    format!(
        "Bot Status: Online\nPlatform: {}\nConnected to sheet: {}",
        call.context.platform, call.context.sheet_name
    )
}

fn format_examples(_call: &CommandCall<'_>) -> String {
    "Message Format Examples:\n\n\
     1. Simple key-value pairs:\n   \
     product=Laptop, quantity=5, price=1200\n\n\
     2. With a command prefix:\n   \
     /update product=Laptop, quantity=5, price=1200\n\n\
     3. Natural language (if advanced NLP is enabled):\n   \
     Please update the sales record for Laptop with 5 units at $1200 each"
        .to_string()
}

/// Reply for `columns` when the header fetch came back empty.
pub const COLUMNS_UNAVAILABLE: &str =
    "Unable to retrieve sheet columns. Please check your Google Sheets connection.";

fn columns(call: &CommandCall<'_>) -> String {
    if call.context.columns.is_empty() {
        return COLUMNS_UNAVAILABLE.to_string();
    }
    let list = call
        .context
        .columns
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Available columns in the sheet:\n{list}")
}

fn update_usage(_call: &CommandCall<'_>) -> String {
    "Usage: /update key1=value1, key2=value2\nType /format to see examples.".to_string()
}
