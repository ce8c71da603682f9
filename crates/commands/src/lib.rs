//! Subscription management commands.
//!
//! Validates `subscribe`, `unsubscribe` and `status` requests coming from a
//! chat and applies them to the registry. Callers outside the allow-list are
//! dropped without a reply.

pub mod access;
pub mod command;
pub mod error;
pub mod processor;

pub use {
    access::{Access, AccessControl, AccessDenied},
    command::{InboundCommand, ParsedCommand, Principal, parse_command_text},
    error::{Error, Result},
    processor::{CommandOutcome, CommandProcessor},
};
