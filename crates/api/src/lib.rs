//! Keeper notification adapters.
//!
//! This crate provides `Notifier` implementations:
//! - Telegram Bot API (`sendMessage`)
//! - Log-only fallback

mod log_notifier;
mod telegram;

pub use log_notifier::LogNotifier;
pub use telegram::TelegramNotifier;
