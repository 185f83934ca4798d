use std::sync::Arc;

use sheetbot_dispatch::Dispatcher;

/// Runtime state shared by every update handler task.
pub struct BotState {
    pub bot: teloxide::Bot,
    /// Username from `getMe`, used to recognise `/cmd@username`.
    pub bot_username: Option<String>,
    pub dispatcher: Arc<Dispatcher>,
}
