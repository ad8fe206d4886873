//! Shared error types for chatlog.

pub mod error;
