//! Bot command parsing and response formatting.
//!
//! This module provides the complete command processing pipeline of the bot,
//! turning Matrix messages into game actions.
//!
//! # Architecture
//!
//! ```text
//! Matrix Message
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Commander  │  ← Entry point: parse() + parse_command()
//! └─────────────┘
//!      │
//!      ├── parse() ────────────────────┐
//!      │                               ▼
//!                          ┌──────────────────┐
//!                          │  command::Command│
//!                          └──────────────────┘
//!      │
//!      └── parse_command() ───────────┐
//!                                     ▼
//!                          ┌─────────────────────┐
//!                          │ Action Handlers     │
//!                          │  - handle_help      │
//!                          │  - handle_who_said  │
//!                          │  - handle_geo       │
//!                          │  - handle_koler     │
//!                          └─────────────────────┘
//!                                     │
//!                                     ▼
//!                          ┌────────────────────┐
//!                          │  CommandResult     │
//!                          │  - response (MD)   │
//!                          └────────────────────┘
//! ```
//!
//! # Command Structure
//!
//! All commands follow the format: `!boti <subcommand> [args...]`
//!
//! | Command | Arguments | Description |
//! |---------|-----------|-------------|
//! | `help` | None | Display help information |
//! | `ws` | `[story]` | Start a who-said-this round |
//! | `ws` | `<user>` | Guess the author of the current message |
//! | `ws lb` | `[normal\|story]` | Show the leaderboard |
//! | `geo play` | None | Start a location round |
//! | `gg`, `geo guess` | `<location>` | Guess the location of the current picture |
//! | `geo logs` | `[match_id]` | List past matches or the guesses of one |
//! | `geo add` | `<image_url> <location>` | Add a catalog entry |
//! | `geo remove` | `<image_url>` | Remove a catalog entry |
//! | `koler` | None | Play a pressure turn |
//!
//! # Error Handling
//!
//! - **Silent Errors** ([`CommandParseError::NotForBot`]): Messages that aren't commands
//!   or are for a different bot. These should not generate responses.
//! - **User Errors** ([`CommandParseError::InvalidCommand`]): Invalid command syntax
//!   or arguments, with a usage message for the user.
//!
//! Game errors (a round already running, a duplicate guess...) are not parse errors,
//! the handlers turn them into responses.

mod actions;
mod command;
mod commander;
mod markdown_response;

pub use crate::commands::commander::Commander;

/// Runtime context for command execution.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Matrix room ID where the command was issued
    pub room_id: String,
    /// Matrix user ID of the command issuer
    pub user_id: String,
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Markdown-formatted response message
    pub response: String,
}

/// Errors that can occur during command parsing.
///
/// # Variants
///
/// * `NotForBot` - Message is not a command or is for a different bot.
///   Should be handled silently without responding to the user.
///
/// * `InvalidCommand` - Command syntax or arguments are invalid.
///   Contains a user-friendly error message to display.
#[derive(Debug)]
pub enum CommandParseError {
    /// Message is not for this bot (silent error)
    NotForBot,
    /// Invalid command syntax with error message
    InvalidCommand(String),
}
