use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::ChatLogError;
use crate::owners::OwnerSet;
use chatlog_channels::channel_adapter::OutboundReply;
use chatlog_storage::db::{call_blocking, Database, LogEntry};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const DEFAULT_INLINE_TEXT_LIMIT: usize = 4000;
pub const HISTORY_FILE_NAME: &str = "history.txt";
/// Shown when a logged message has neither a username nor a user id.
pub const UNKNOWN_SENDER: &str = "unknown";

pub const PERMISSION_DENIED_NOTICE: &str = "❌ Permission denied.";
pub const NO_HISTORY_NOTICE: &str = "⚠️ No messages logged yet.";
pub const HISTORY_FAILED_NOTICE: &str = "⚠️ Failed to load history.";

/// Read side of the message log, as seen by the responder.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn recent_entries(&self, chat_id: i64, limit: i64)
        -> Result<Vec<LogEntry>, ChatLogError>;
}

#[async_trait]
impl HistorySource for Arc<Database> {
    async fn recent_entries(
        &self,
        chat_id: i64,
        limit: i64,
    ) -> Result<Vec<LogEntry>, ChatLogError> {
        call_blocking(self.clone(), move |db| db.query(chat_id, limit)).await
    }
}

/// Successful outcomes of a history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryReply {
    Empty,
    Inline(String),
    Document { file_name: String, bytes: Vec<u8> },
}

impl HistoryReply {
    pub fn into_outbound(self) -> OutboundReply {
        match self {
            HistoryReply::Empty => OutboundReply::text(NO_HISTORY_NOTICE),
            HistoryReply::Inline(text) => OutboundReply::Text(text),
            HistoryReply::Document { file_name, bytes } => {
                OutboundReply::Document { file_name, bytes }
            }
        }
    }
}

pub fn parse_limit_argument(raw: &str) -> Result<i64, ChatLogError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ChatLogError::MalformedArgument(raw.to_string()))
}

/// Named fallback for the limit argument: missing or malformed means `default`.
pub fn effective_limit(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    match parse_limit_argument(raw) {
        Ok(limit) => limit,
        Err(e) => {
            debug!("{e}; falling back to limit {default}");
            default
        }
    }
}

pub fn display_name(entry: &LogEntry) -> String {
    match (&entry.username, entry.user_id) {
        (Some(username), _) => username.clone(),
        (None, Some(user_id)) => user_id.to_string(),
        (None, None) => UNKNOWN_SENDER.to_string(),
    }
}

/// One `name: text` line per entry, in the order given.
pub fn render_history(entries: &[LogEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}: {}", display_name(entry), entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inline up to `inline_limit` characters, file attachment beyond that.
pub fn choose_delivery(rendered: String, inline_limit: usize) -> HistoryReply {
    if rendered.chars().count() > inline_limit {
        HistoryReply::Document {
            file_name: HISTORY_FILE_NAME.to_string(),
            bytes: rendered.into_bytes(),
        }
    } else {
        HistoryReply::Inline(rendered)
    }
}

pub struct HistoryResponder<S> {
    owners: OwnerSet,
    source: S,
    default_limit: i64,
    inline_text_limit: usize,
}

impl<S: HistorySource> HistoryResponder<S> {
    pub fn new(owners: OwnerSet, source: S) -> Self {
        HistoryResponder {
            owners,
            source,
            default_limit: DEFAULT_HISTORY_LIMIT,
            inline_text_limit: DEFAULT_INLINE_TEXT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_inline_text_limit(mut self, limit: usize) -> Self {
        self.inline_text_limit = limit;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn handle(
        &self,
        requester_id: i64,
        chat_id: i64,
        limit_argument: Option<&str>,
    ) -> Result<HistoryReply, ChatLogError> {
        if !self.owners.contains(requester_id) {
            return Err(ChatLogError::PermissionDenied { requester_id });
        }

        let limit = effective_limit(limit_argument, self.default_limit);
        let entries = self.source.recent_entries(chat_id, limit).await?;
        if entries.is_empty() {
            return Ok(HistoryReply::Empty);
        }

        let rendered = render_history(&entries);
        Ok(choose_delivery(rendered, self.inline_text_limit))
    }

    /// Like [`HistoryResponder::handle`], with every outcome turned into a chat reply.
    pub async fn respond(
        &self,
        requester_id: i64,
        chat_id: i64,
        limit_argument: Option<&str>,
    ) -> OutboundReply {
        match self.handle(requester_id, chat_id, limit_argument).await {
            Ok(reply) => reply.into_outbound(),
            Err(ChatLogError::PermissionDenied { requester_id }) => {
                info!("History request from non-owner {requester_id} in chat {chat_id} denied");
                OutboundReply::text(PERMISSION_DENIED_NOTICE)
            }
            Err(e) => {
                error!("History query for chat {chat_id} failed: {e}");
                OutboundReply::text(HISTORY_FAILED_NOTICE)
            }
        }
    }
}
