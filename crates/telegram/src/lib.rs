//! Telegram adapter for herald.
//!
//! Long-polls the Bot API for subscription commands and provides the
//! [`TelegramSender`] used by broadcast runs.

pub mod bot;
pub mod error;
pub mod sender;

pub use {
    bot::{PollMode, TelegramBot},
    error::{Error, Result},
    sender::{SendError, TelegramSender},
};
