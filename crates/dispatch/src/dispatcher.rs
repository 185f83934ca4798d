//! Per-sender state machine between chat adapters and the tabular store.
//!
//! A sender is either idle or awaiting confirmation (has a staged row in the
//! [`PendingStore`]). Every inbound message performs exactly one transition
//! and yields one [`Reply`]; store failures become reply text and never
//! propagate to the adapter.

use std::{fmt::Write as _, sync::Arc, time::Duration};

use {
    sheetbot_common::{FieldMap, Platform},
    tracing::{debug, info, warn},
};

use crate::{
    classify::{ParsedCommand, parse_command},
    commands::{CommandContext, CommandRegistry, UPDATE_COMMAND},
    extract::extract,
    pending::{PendingStore, SenderGuard, SenderKey},
    store::TabularStore,
};

pub const UPDATED_MSG: &str = "Google Sheet updated successfully!";
pub const UPDATE_FAILED_MSG: &str = "Failed to update Google Sheet. Please try again.";
pub const CANCELLED_MSG: &str = "Update cancelled.";
pub const NOTHING_TO_CONFIRM_MSG: &str = "There's nothing to confirm.";
pub const EXTRACTION_FAILED_MSG: &str = "I couldn't extract any data from your message. \
     Please use the format: key1=value1, key2=value2\nType /format to see examples.";
pub const REPLACED_MSG: &str = "Your previous pending update was discarded.";

/// Process-wide dispatch settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Stage rows and wait for yes/no instead of writing immediately.
    pub confirmation_required: bool,
    /// Sheet name reported to commands.
    pub sheet_name: String,
    /// Upper bound for each store call.
    pub store_timeout: Duration,
    /// How long a staged row waits for an answer.
    pub confirmation_ttl: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            confirmation_required: false,
            sheet_name: "Sheet1".into(),
            store_timeout: Duration::from_secs(15),
            confirmation_ttl: None,
        }
    }
}

/// Which transition produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Updated,
    UpdateFailed,
    ConfirmationRequested,
    Cancelled,
    NothingToConfirm,
    Command,
    ExtractionFailed,
}

/// Outbound text plus the transition that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
}

impl Reply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    store: Arc<dyn TabularStore>,
    pending: PendingStore,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        store: Arc<dyn TabularStore>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            store,
            pending: PendingStore::new(settings.confirmation_ttl),
            settings,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Handle one inbound message from `sender` on `platform`.
    ///
    /// Messages from the same sender are processed one at a time.
    pub async fn handle(&self, platform: Platform, sender: &str, text: &str) -> Reply {
        let key = SenderKey::new(platform, sender);
        let mut slot = self.pending.lock(&key).await;

        let reply = if slot.pending().is_some() {
            self.answer_pending(&key, &mut slot, text).await
        } else if is_bare_answer(text) {
            Reply::new(ReplyKind::NothingToConfirm, NOTHING_TO_CONFIRM_MSG)
        } else {
            let parsed = parse_command(text);
            match submission_text(&parsed) {
                Some(data) => self.submit(&key, &mut slot, data).await,
                None => self.run_command(&key, &parsed).await,
            }
        };

        debug!(
            platform = %platform,
            sender,
            kind = ?reply.kind,
            "dispatched message"
        );
        reply
    }

    async fn answer_pending(
        &self,
        key: &SenderKey,
        slot: &mut SenderGuard<'_>,
        text: &str,
    ) -> Reply {
        if is_affirmative(text) {
            let Some(fields) = slot.take() else {
                return Reply::new(ReplyKind::NothingToConfirm, NOTHING_TO_CONFIRM_MSG);
            };
            return self.write(key, &fields).await;
        }

        // A fresh data message replaces the staged row instead of cancelling.
        let parsed = parse_command(text);
        if let Some(fields) = submission_text(&parsed).and_then(extract) {
            slot.stage(fields.clone());
            info!(
                platform = %key.platform,
                sender = %key.sender,
                fields = fields.len(),
                "replaced staged row"
            );
            return Reply::new(
                ReplyKind::ConfirmationRequested,
                format!("{REPLACED_MSG}\n\n{}", confirmation_prompt(&fields)),
            );
        }

        slot.take();
        info!(platform = %key.platform, sender = %key.sender, "staged row cancelled");
        Reply::new(ReplyKind::Cancelled, CANCELLED_MSG)
    }

    async fn submit(&self, key: &SenderKey, slot: &mut SenderGuard<'_>, text: &str) -> Reply {
        let Some(fields) = extract(text) else {
            debug!(platform = %key.platform, sender = %key.sender, "no fields extracted");
            return Reply::new(ReplyKind::ExtractionFailed, EXTRACTION_FAILED_MSG);
        };

        if self.settings.confirmation_required {
            let prompt = confirmation_prompt(&fields);
            slot.stage(fields);
            info!(platform = %key.platform, sender = %key.sender, "staged row for confirmation");
            return Reply::new(ReplyKind::ConfirmationRequested, prompt);
        }

        self.write(key, &fields).await
    }

    async fn write(&self, key: &SenderKey, fields: &FieldMap) -> Reply {
        let result =
            tokio::time::timeout(self.settings.store_timeout, self.store.write_row(fields)).await;
        match result {
            Ok(Ok(())) => {
                info!(
                    platform = %key.platform,
                    sender = %key.sender,
                    fields = fields.len(),
                    "row written"
                );
                Reply::new(ReplyKind::Updated, UPDATED_MSG)
            },
            Ok(Err(e)) => {
                warn!(platform = %key.platform, sender = %key.sender, error = %e, "row write failed");
                Reply::new(ReplyKind::UpdateFailed, UPDATE_FAILED_MSG)
            },
            Err(_) => {
                warn!(
                    platform = %key.platform,
                    sender = %key.sender,
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "row write timed out"
                );
                Reply::new(ReplyKind::UpdateFailed, UPDATE_FAILED_MSG)
            },
        }
    }

    async fn run_command(&self, key: &SenderKey, parsed: &ParsedCommand) -> Reply {
        let columns = if self.registry.contains(&parsed.name) {
            self.columns().await
        } else {
            Vec::new()
        };
        let context = CommandContext {
            platform: key.platform,
            sender: key.sender.clone(),
            sheet_name: self.settings.sheet_name.clone(),
            columns,
        };
        debug!(platform = %key.platform, sender = %key.sender, command = %parsed.name, "running command");
        let text = self
            .registry
            .dispatch(&parsed.name, &parsed.args, &context);
        Reply::new(ReplyKind::Command, text)
    }

    /// Column headers, or empty when the store fails or times out.
    async fn columns(&self) -> Vec<String> {
        match tokio::time::timeout(self.settings.store_timeout, self.store.columns()).await {
            Ok(Ok(columns)) => columns,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to fetch sheet columns");
                Vec::new()
            },
            Err(_) => {
                warn!("fetching sheet columns timed out");
                Vec::new()
            },
        }
    }
}

/// The text to extract from, if this message is a data submission.
///
/// Plain text, a bare prefix, and `/update <fields>` are submissions; any
/// other command is not.
fn submission_text(parsed: &ParsedCommand) -> Option<&str> {
    if !parsed.is_command() {
        return Some(&parsed.remainder);
    }
    (parsed.name == UPDATE_COMMAND && !parsed.remainder.trim().is_empty())
        .then_some(parsed.remainder.as_str())
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn is_affirmative(text: &str) -> bool {
    matches!(normalize(text).as_str(), "yes" | "y")
}

fn is_bare_answer(text: &str) -> bool {
    matches!(normalize(text).as_str(), "yes" | "y" | "no" | "n")
}

/// Prompt listing the staged fields in extraction order.
pub fn confirmation_prompt(fields: &FieldMap) -> String {
    let mut text = String::from("I extracted the following data:\n");
    for (key, value) in fields.iter() {
        let _ = writeln!(text, "- {key}: {value}");
    }
    text.push_str("\nShould I update the sheet? (yes/no)");
    text
}
