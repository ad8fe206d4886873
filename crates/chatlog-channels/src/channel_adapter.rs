use async_trait::async_trait;
use tracing::warn;

/// What the bot wants to say back to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundReply {
    Text(String),
    Document { file_name: String, bytes: Vec<u8> },
}

impl OutboundReply {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundReply::Text(text.into())
    }

    pub fn is_document(&self) -> bool {
        matches!(self, OutboundReply::Document { .. })
    }
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Unique name: "telegram", "memory"
    fn name(&self) -> &str;

    /// Send an inline text reply to a chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String>;

    /// Send a named byte payload as a file attachment. Default: not supported.
    async fn send_document(
        &self,
        _chat_id: i64,
        _file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<(), String> {
        Err(format!("documents not supported for {}", self.name()))
    }
}

/// Hand a reply to the sink. Failures are logged and not retried.
pub async fn deliver(sink: &dyn ReplySink, chat_id: i64, reply: OutboundReply) -> bool {
    let result = match reply {
        OutboundReply::Text(text) => sink.send_text(chat_id, &text).await,
        OutboundReply::Document { file_name, bytes } => {
            sink.send_document(chat_id, &file_name, bytes).await
        }
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Delivery via {} to chat {chat_id} failed: {e}", sink.name());
            false
        }
    }
}
