//! Outbound delivery abstraction shared by the bot runtime and its tests.

pub mod channel_adapter;
