use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageKind};
use tracing::debug;

use crate::ingest::{InboundMessage, Sender};
use crate::runtime::{process_inbound, AppState, Handled};
use chatlog_channels::channel_adapter::ReplySink;

pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        TelegramSink { bot }
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send Telegram message: {e}"))
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let file = InputFile::memory(bytes).file_name(file_name.to_string());
        self.bot
            .send_document(ChatId(chat_id), file)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send Telegram document: {e}"))
    }
}

/// Chat status updates (joins, pins, title changes, topic and video chat
/// events). Everything else, dice and invoices included, is logged.
fn is_service_message(msg: &Message) -> bool {
    matches!(
        msg.kind,
        MessageKind::NewChatMembers(_)
            | MessageKind::LeftChatMember(_)
            | MessageKind::NewChatTitle(_)
            | MessageKind::NewChatPhoto(_)
            | MessageKind::DeleteChatPhoto(_)
            | MessageKind::GroupChatCreated(_)
            | MessageKind::SupergroupChatCreated(_)
            | MessageKind::ChannelChatCreated(_)
            | MessageKind::MessageAutoDeleteTimerChanged(_)
            | MessageKind::Pinned(_)
            | MessageKind::ProximityAlertTriggered(_)
            | MessageKind::WriteAccessAllowed(_)
            | MessageKind::ForumTopicCreated(_)
            | MessageKind::ForumTopicEdited(_)
            | MessageKind::ForumTopicClosed(_)
            | MessageKind::ForumTopicReopened(_)
            | MessageKind::GeneralForumTopicHidden(_)
            | MessageKind::GeneralForumTopicUnhidden(_)
            | MessageKind::VideoChatScheduled(_)
            | MessageKind::VideoChatStarted(_)
            | MessageKind::VideoChatEnded(_)
            | MessageKind::VideoChatParticipantsInvited(_)
    )
}

pub fn inbound_from_telegram(msg: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: i64::from(msg.id.0),
        sender: msg.from.as_ref().map(|user| Sender {
            id: user.id.0 as i64,
            username: user.username.clone(),
        }),
        text: msg.text().map(str::to_string),
        timestamp: msg.date.timestamp(),
    }
}

pub async fn start_telegram_bot(state: Arc<AppState>, bot: Bot) -> anyhow::Result<()> {
    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if is_service_message(&msg) {
        return Ok(());
    }

    let inbound = inbound_from_telegram(&msg);
    let sink = TelegramSink::new(bot);
    match process_inbound(&state, &sink, &inbound).await {
        Handled::Command { delivered } => {
            debug!(
                "Handled command in chat {} (delivered={delivered})",
                inbound.chat_id
            );
        }
        Handled::Logged | Handled::Dropped => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 17,
            "date": 1_700_000_123,
            "chat": {"id": -1001234, "type": "supergroup", "title": "logged group"},
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    fn alice() -> serde_json::Value {
        json!({"id": 42, "is_bot": false, "first_name": "Alice", "username": "alice"})
    }

    #[test]
    fn test_inbound_from_text_message() {
        let msg = message(json!({"from": alice(), "text": "hello"}));
        assert!(!is_service_message(&msg));

        let inbound = inbound_from_telegram(&msg);
        assert_eq!(inbound.chat_id, -1001234);
        assert_eq!(inbound.message_id, 17);
        assert_eq!(inbound.timestamp, 1_700_000_123);
        assert_eq!(inbound.text.as_deref(), Some("hello"));
        assert_eq!(
            inbound.sender,
            Some(Sender {
                id: 42,
                username: Some("alice".into())
            })
        );
    }

    #[test]
    fn test_inbound_without_username_or_text() {
        let msg = message(json!({
            "from": {"id": 7, "is_bot": false, "first_name": "Seven"},
            "photo": [{"file_id": "f", "file_unique_id": "u", "file_size": 10, "width": 90, "height": 90}]
        }));
        assert!(!is_service_message(&msg));
        let inbound = inbound_from_telegram(&msg);
        assert_eq!(inbound.sender_id(), Some(7));
        assert_eq!(inbound.sender.and_then(|s| s.username), None);
        assert_eq!(inbound.text, None);
    }

    #[test]
    fn test_dice_is_logged() {
        let msg = message(json!({"from": alice(), "dice": {"emoji": "🎲", "value": 4}}));
        assert!(!is_service_message(&msg));
    }

    #[test]
    fn test_status_updates_are_skipped() {
        let title = message(json!({"from": alice(), "new_chat_title": "renamed"}));
        assert!(is_service_message(&title));

        let joined = message(json!({"from": alice(), "new_chat_members": [alice()]}));
        assert!(is_service_message(&joined));

        let left = message(json!({"from": alice(), "left_chat_member": alice()}));
        assert!(is_service_message(&left));
    }
}
