use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use crate::channels::telegram::start_telegram_bot;
use crate::chat_commands::{handle_chat_command, parse_command};
use crate::config::Config;
use crate::history::HistoryResponder;
use crate::ingest::{record_message, InboundMessage};
use chatlog_channels::channel_adapter::{deliver, ReplySink};
use chatlog_storage::db::Database;

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub history: HistoryResponder<Arc<Database>>,
    pub bot_username: String,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>, bot_username: impl Into<String>) -> Self {
        let history = HistoryResponder::new(config.owners(), db.clone())
            .with_default_limit(config.default_history_limit)
            .with_inline_text_limit(config.inline_text_limit);
        AppState {
            config,
            db,
            history,
            bot_username: bot_username.into(),
        }
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Command { delivered: bool },
    Logged,
    Dropped,
}

/// Route one message: bot commands get a reply, everything else is logged.
pub async fn process_inbound(
    state: &AppState,
    sink: &dyn ReplySink,
    message: &InboundMessage,
) -> Handled {
    let command = message
        .text
        .as_deref()
        .and_then(|text| parse_command(text, &state.bot_username));

    if let Some(command) = command {
        let reply =
            handle_chat_command(state, &command, message.sender_id(), message.chat_id).await;
        let delivered = deliver(sink, message.chat_id, reply).await;
        return Handled::Command { delivered };
    }

    match record_message(state.db.clone(), message).await {
        Some(_) => Handled::Logged,
        None => Handled::Dropped,
    }
}

pub async fn run(config: Config, db: Database) -> anyhow::Result<()> {
    let token = config.require_bot_token()?.to_string();
    let bot = Bot::new(token);
    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    info!("Connected to Telegram as @{bot_username}");

    let owners = config.owners();
    if owners.is_empty() {
        warn!("No owner ids configured; /get_history will deny everyone");
    } else {
        info!("{} owner(s) may read history", owners.len());
    }

    let state = Arc::new(AppState::new(config, Arc::new(db), bot_username));
    start_telegram_bot(state, bot).await
}
