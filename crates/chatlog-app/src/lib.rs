//! Process-level plumbing for the chatlog binary.

pub mod logging;
