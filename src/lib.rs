pub mod channels;
pub mod chat_commands;
pub mod config;
pub mod history;
pub mod ingest;
pub mod owners;
pub mod runtime;

pub use chatlog_app::logging;
pub use chatlog_channels::channel_adapter;
pub use chatlog_core::error;
pub use chatlog_storage::db;
