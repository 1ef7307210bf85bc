//! Realtime command channel.

pub mod client;
pub mod dispatch;
pub mod messages;

pub use client::{RealtimeSession, SessionStatus};
pub use dispatch::KeyDispatcher;
