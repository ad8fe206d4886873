use std::sync::Arc;

use tracing::error;

use chatlog_storage::db::{call_blocking, Database, NewLogEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
}

/// A chat message as delivered by the transport, with every optional field
/// made explicit before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender: Option<Sender>,
    pub text: Option<String>,
    pub timestamp: i64,
}

impl InboundMessage {
    pub fn sender_id(&self) -> Option<i64> {
        self.sender.as_ref().map(|s| s.id)
    }

    pub fn to_log_entry(&self) -> NewLogEntry {
        NewLogEntry {
            chat_id: self.chat_id,
            message_id: self.message_id,
            user_id: self.sender_id(),
            username: self.sender.as_ref().and_then(|s| s.username.clone()),
            text: self.text.clone().unwrap_or_default(),
            timestamp: self.timestamp,
        }
    }
}

/// Append the message to the log. A storage failure drops the message and is
/// only visible in the operator log.
pub async fn record_message(db: Arc<Database>, message: &InboundMessage) -> Option<i64> {
    let entry = message.to_log_entry();
    let chat_id = entry.chat_id;
    let message_id = entry.message_id;
    match call_blocking(db, move |db| db.append(&entry)).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to log message {message_id} in chat {chat_id}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Arc<Database>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("chatlog_ingest_{}", uuid::Uuid::new_v4()));
        let db = Database::new(dir.to_str().unwrap()).unwrap();
        (Arc::new(db), dir)
    }

    #[test]
    fn test_to_log_entry_fills_defaults() {
        let msg = InboundMessage {
            chat_id: -100,
            message_id: 3,
            sender: None,
            text: None,
            timestamp: 1_700_000_000,
        };
        let entry = msg.to_log_entry();
        assert_eq!(entry.user_id, None);
        assert_eq!(entry.username, None);
        assert_eq!(entry.text, "");
        assert_eq!(entry.chat_id, -100);
    }

    #[test]
    fn test_to_log_entry_copies_sender() {
        let msg = InboundMessage {
            chat_id: 1,
            message_id: 2,
            sender: Some(Sender {
                id: 77,
                username: Some("bob".into()),
            }),
            text: Some("hello".into()),
            timestamp: 5,
        };
        let entry = msg.to_log_entry();
        assert_eq!(entry.user_id, Some(77));
        assert_eq!(entry.username.as_deref(), Some("bob"));
        assert_eq!(entry.text, "hello");
        assert_eq!(msg.sender_id(), Some(77));
    }

    #[tokio::test]
    async fn test_record_message_appends() {
        let (db, dir) = test_db();
        let msg = InboundMessage {
            chat_id: 9,
            message_id: 1,
            sender: Some(Sender {
                id: 4,
                username: None,
            }),
            text: Some("stored".into()),
            timestamp: 10,
        };
        let id = record_message(db.clone(), &msg).await;
        assert!(id.is_some());
        let rows = db.query(9, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "stored");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_record_message_drops_on_storage_failure() {
        let (db, dir) = test_db();
        let conn = rusqlite::Connection::open(dir.join(chatlog_storage::db::DB_FILE_NAME)).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_inserts BEFORE INSERT ON messages
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        let msg = InboundMessage {
            chat_id: 9,
            message_id: 1,
            sender: None,
            text: Some("lost".into()),
            timestamp: 10,
        };
        assert_eq!(record_message(db.clone(), &msg).await, None);
        assert!(db.query(9, 10).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }
}
