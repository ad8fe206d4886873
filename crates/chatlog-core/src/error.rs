use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatLogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Permission denied for user {requester_id}")]
    PermissionDenied { requester_id: i64 },

    #[error("Malformed argument: {0}")]
    MalformedArgument(String),

    #[error("Background task error: {0}")]
    Task(String),
}

impl ChatLogError {
    /// Storage failures are the ones an operator needs to see in the log.
    pub fn is_storage(&self) -> bool {
        matches!(self, ChatLogError::Database(_) | ChatLogError::Io(_))
    }
}
