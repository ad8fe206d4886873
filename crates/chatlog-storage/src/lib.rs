//! Append-only message log backed by SQLite.

pub mod db;
