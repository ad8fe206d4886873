use rusqlite::OptionalExtension;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use chatlog_core::error::ChatLogError;

pub const DB_FILE_NAME: &str = "chatlog.db";

const SCHEMA_VERSION_CURRENT: i64 = 1;

pub struct Database {
    conn: Mutex<Connection>,
}

/// Run a store operation on the blocking pool so SQLite I/O never stalls the dispatcher.
pub async fn call_blocking<T, F>(db: Arc<Database>, f: F) -> Result<T, ChatLogError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, ChatLogError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(db.as_ref()))
        .await
        .map_err(|e| ChatLogError::Task(format!("DB task join error: {e}")))?
}

/// One logged chat message as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: i64,
}

/// A message about to be appended. The store assigns the `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: i64,
}

fn get_schema_version(conn: &Connection) -> Result<i64, ChatLogError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS db_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM db_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<(), ChatLogError> {
    conn.execute(
        "INSERT INTO db_meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![version.to_string()],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO db_meta(key, value) VALUES('schema_updated_at', ?1)",
        params![chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn apply_schema_migrations(conn: &Connection) -> Result<(), ChatLogError> {
    let version = get_schema_version(conn)?;
    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                user_id INTEGER,
                username TEXT,
                text TEXT NOT NULL DEFAULT '',
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat_id
                ON messages(chat_id, id);",
        )?;
        set_schema_version(conn, 1)?;
    }
    if version > SCHEMA_VERSION_CURRENT {
        return Err(ChatLogError::Config(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION_CURRENT}"
        )));
    }
    Ok(())
}

impl Database {
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn new(data_dir: &str) -> Result<Self, ChatLogError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = Path::new(data_dir).join(DB_FILE_NAME);

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        apply_schema_migrations(&conn)?;

        info!("Message log opened at {}", db_path.display());
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one message and return its surrogate id. Each call is its own
    /// autocommit unit, so the row is durable once this returns.
    pub fn append(&self, entry: &NewLogEntry) -> Result<i64, ChatLogError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO messages (chat_id, message_id, user_id, username, text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.chat_id,
                entry.message_id,
                entry.user_id,
                entry.username,
                entry.text,
                entry.timestamp,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The last `limit` messages of a chat, oldest first.
    ///
    /// `limit` goes straight into the SQL `LIMIT`: zero yields nothing and a
    /// negative value is unbounded.
    pub fn query(&self, chat_id: i64, limit: i64) -> Result<Vec<LogEntry>, ChatLogError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, message_id, user_id, username, text, timestamp
             FROM messages
             WHERE chat_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let mut entries = stmt
            .query_map(params![chat_id, limit], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    message_id: row.get(2)?,
                    user_id: row.get(3)?,
                    username: row.get(4)?,
                    text: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    timestamp: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        entries.reverse();
        Ok(entries)
    }

    pub fn count_for_chat(&self, chat_id: i64) -> Result<i64, ChatLogError> {
        let conn = self.lock_conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Database, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("chatlog_test_{}", uuid::Uuid::new_v4()));
        let db = Database::new(dir.to_str().unwrap()).unwrap();
        (db, dir)
    }

    fn cleanup(dir: &std::path::Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn entry(chat_id: i64, message_id: i64, username: Option<&str>, text: &str) -> NewLogEntry {
        NewLogEntry {
            chat_id,
            message_id,
            user_id: Some(1000 + message_id),
            username: username.map(str::to_string),
            text: text.to_string(),
            timestamp: 1_700_000_000 + message_id,
        }
    }

    #[test]
    fn test_new_database_creates_tables() {
        let (db, dir) = test_db();
        let rows = db.query(1, 10).unwrap();
        assert!(rows.is_empty());
        assert_eq!(db.count_for_chat(1).unwrap(), 0);
        cleanup(&dir);
    }

    #[test]
    fn test_schema_version_is_tracked() {
        let (db, dir) = test_db();
        let conn = db.lock_conn();
        let version: String = conn
            .query_row(
                "SELECT value FROM db_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION_CURRENT.to_string());
        drop(conn);
        cleanup(&dir);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let (db, dir) = test_db();
        db.append(&entry(5, 1, Some("alice"), "persisted")).unwrap();
        drop(db);

        let reopened = Database::new(dir.to_str().unwrap()).unwrap();
        let rows = reopened.query(5, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "persisted");
        cleanup(&dir);
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let (db, dir) = test_db();
        let first = db.append(&entry(1, 1, Some("a"), "one")).unwrap();
        let second = db.append(&entry(2, 1, Some("b"), "two")).unwrap();
        let third = db.append(&entry(1, 2, None, "three")).unwrap();
        assert!(first < second);
        assert!(second < third);
        cleanup(&dir);
    }

    #[test]
    fn test_query_returns_last_n_oldest_first() {
        let (db, dir) = test_db();
        for i in 1..=5 {
            db.append(&entry(10, i, Some("u"), &format!("msg {i}")))
                .unwrap();
        }
        let rows = db.query(10, 3).unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 3", "msg 4", "msg 5"]);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
        cleanup(&dir);
    }

    #[test]
    fn test_query_limit_larger_than_count() {
        let (db, dir) = test_db();
        db.append(&entry(10, 1, Some("u"), "only")).unwrap();
        let rows = db.query(10, 50).unwrap();
        assert_eq!(rows.len(), 1);
        cleanup(&dir);
    }

    #[test]
    fn test_query_filters_by_chat() {
        let (db, dir) = test_db();
        db.append(&entry(1, 1, Some("a"), "chat one")).unwrap();
        db.append(&entry(2, 1, Some("b"), "chat two")).unwrap();
        db.append(&entry(1, 2, Some("a"), "chat one again")).unwrap();

        let rows = db.query(1, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.chat_id == 1));
        assert!(db.query(999, 10).unwrap().is_empty());
        cleanup(&dir);
    }

    #[test]
    fn test_query_zero_and_negative_limit() {
        let (db, dir) = test_db();
        for i in 1..=3 {
            db.append(&entry(7, i, None, "x")).unwrap();
        }
        assert!(db.query(7, 0).unwrap().is_empty());
        assert_eq!(db.query(7, -1).unwrap().len(), 3);
        cleanup(&dir);
    }

    #[test]
    fn test_optional_sender_fields_round_trip() {
        let (db, dir) = test_db();
        db.append(&NewLogEntry {
            chat_id: 3,
            message_id: 9,
            user_id: None,
            username: None,
            text: String::new(),
            timestamp: 1_700_000_123,
        })
        .unwrap();
        let rows = db.query(3, 1).unwrap();
        assert_eq!(rows[0].user_id, None);
        assert_eq!(rows[0].username, None);
        assert_eq!(rows[0].text, "");
        assert_eq!(rows[0].message_id, 9);
        assert_eq!(rows[0].timestamp, 1_700_000_123);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_call_blocking_runs_on_shared_db() {
        let (db, dir) = test_db();
        let db = Arc::new(db);
        let id = call_blocking(db.clone(), |db| db.append(&entry(4, 1, Some("z"), "hi")))
            .await
            .unwrap();
        let rows = call_blocking(db.clone(), |db| db.query(4, 10)).await.unwrap();
        assert_eq!(rows[0].id, id);
        cleanup(&dir);
    }
}
