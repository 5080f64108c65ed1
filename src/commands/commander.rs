//! Command orchestration and execution.
//!
//! This module provides the [`Commander`] struct, which serves as the main entry point
//! for processing bot commands. It coordinates command parsing and execution, routing
//! commands to their appropriate handlers.
//!
//! # Architecture
//!
//! The Commander follows a two-phase processing model:
//!
//! 1. **Parsing Phase** - Validates and parses raw message text into structured [`Command`] enums
//! 2. **Execution Phase** - Routes parsed commands to the game handlers that produce results
//!
//! # Flow
//!
//! ```text
//! Matrix Message → parse() → Command → parse_command() → CommandResult
//! ```
//!
//! Round events that don't answer a command, such as a countdown reminder or a
//! timeout, are formatted by [`Commander::get_announcement_message`].

use command_parser::Parser;

use crate::{
    commands::{
        CommandContext, CommandParseError, CommandResult,
        actions::{handle_geo, handle_help, handle_koler, handle_who_said},
        command::{Command, format_command_error},
        markdown_response::format_round_event,
    },
    games::{GameHub, Geocoder, MessageSource, RoundEvent},
};

/// Command orchestrator for parsing and executing bot commands.
///
/// # Command Prefix
///
/// All commands must start with the `!boti` prefix. Messages without this prefix
/// are silently ignored (returning [`CommandParseError::NotForBot`]).
///
/// # Supported Commands
///
/// - `help` - Display help information
/// - `ws [story|<user>|lb [mode]]` - Who-said-this game
/// - `geo <play|guess|logs|add|remove>` and `gg <location>` - Location game
/// - `koler` - Pressure game
pub struct Commander {
    /// Command parser for processing user commands
    parser: Parser,
}

impl Commander {
    /// Creates a new Commander instance with a configured command parser.
    ///
    /// The parser is configured to recognize commands starting with `!` as the command
    /// prefix and `-` as the option prefix.
    pub fn new() -> Self {
        let parser = Parser::new('!', '-');
        Commander { parser }
    }

    /// Parses a Matrix message body into a structured command.
    ///
    /// # Returns
    ///
    /// * `Ok(Command)` - Successfully parsed and validated command
    /// * `Err(CommandParseError::NotForBot)` - Message is not a command or for a different bot
    /// * `Err(CommandParseError::InvalidCommand)` - Command syntax is invalid
    ///
    /// # Examples
    ///
    /// ```
    /// # use boti::commands::Commander;
    /// let commander = Commander::new();
    ///
    /// assert!(commander.parse("!boti help").is_ok());
    /// assert!(commander.parse("Hello, world!").is_err());
    /// ```
    pub fn parse(&self, body: &str) -> Result<Command, CommandParseError> {
        match Command::parse(&self.parser, body) {
            Ok(command) => Ok(command),
            // Return silently if the command is not for the bot
            // Otherwise, send an error message
            Err(error) => match format_command_error(error) {
                Some(message) => Err(CommandParseError::InvalidCommand(message)),
                None => Err(CommandParseError::NotForBot),
            },
        }
    }

    /// Executes a parsed command and returns the result.
    ///
    /// # Arguments
    ///
    /// * `command` - The parsed command to execute
    /// * `context` - Room and sender of the command
    /// * `games` - Games the command runs against
    ///
    /// # Command Handlers
    ///
    /// - [`Command::Help`] → [`handle_help`]
    /// - [`Command::WhoSaid`] → [`handle_who_said`]
    /// - [`Command::Geo`] → [`handle_geo`]
    /// - [`Command::Koler`] → [`handle_koler`]
    pub async fn parse_command<S: MessageSource, G: Geocoder>(
        &self,
        command: &Command,
        context: &CommandContext,
        games: &GameHub<S, G>,
    ) -> CommandResult {
        match command {
            Command::Help => handle_help(),
            Command::WhoSaid(action) => handle_who_said(context, action, games).await,
            Command::Geo(action) => handle_geo(context, action, games).await,
            Command::Koler => handle_koler(context, games).await,
        }
    }

    /// Generates the message announcing a round event to its room.
    ///
    /// # Examples
    ///
    /// ```
    /// # use boti::commands::Commander;
    /// # use boti::games::RoundEvent;
    /// let message = Commander::get_announcement_message(&RoundEvent::Milestone { seconds_left: 60 });
    /// assert!(message.contains("60 seconds"));
    /// ```
    pub fn get_announcement_message(event: &RoundEvent) -> String {
        format_round_event(event)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::actions::test_utils::{create_test_context, create_test_hub},
        games::{MockGeocoder, MockMessageSource, Resolution},
    };

    #[test]
    fn test_parse_valid_help_command() {
        let commander = Commander::new();
        let result = commander.parse("!boti help");
        assert!(matches!(result, Ok(Command::Help)));
    }

    #[test]
    fn test_parse_empty_command() {
        let commander = Commander::new();
        let result = commander.parse("!boti");
        assert!(matches!(result, Ok(Command::Help)));
    }

    #[test]
    fn test_parse_invalid_command_returns_error() {
        let commander = Commander::new();
        match commander.parse("!boti unknown_command") {
            Err(CommandParseError::InvalidCommand(msg)) => {
                assert!(msg.contains("Unknown command"));
            }
            other => panic!("Expected InvalidCommand error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_geo_returns_usage() {
        let commander = Commander::new();
        match commander.parse("!boti geo add https://i.imgur.com/a.jpg") {
            Err(CommandParseError::InvalidCommand(msg)) => {
                assert!(msg.contains("Invalid geo"));
            }
            other => panic!("Expected InvalidCommand error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_for_bot() {
        let commander = Commander::new();
        assert!(matches!(
            commander.parse("!other_bot help"),
            Err(CommandParseError::NotForBot)
        ));
        assert!(matches!(
            commander.parse("This is just a regular message"),
            Err(CommandParseError::NotForBot)
        ));
    }

    #[tokio::test]
    async fn test_parse_command_help() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;
        let commander = Commander::new();

        let result = commander
            .parse_command(
                &Command::Help,
                &create_test_context("@user:example.com"),
                &games,
            )
            .await;

        assert!(result.response.contains("Commands:"));
    }

    #[tokio::test]
    async fn test_parse_command_routes_to_games() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;
        let commander = Commander::new();
        let context = create_test_context("@user:example.com");

        let command = commander.parse("!boti gg paris").unwrap();
        let result = commander.parse_command(&command, &context, &games).await;
        assert!(result.response.starts_with("No round is running here."));

        let command = commander.parse("!boti koler").unwrap();
        let result = commander.parse_command(&command, &context, &games).await;
        assert!(result.response.contains("pressure"));
    }

    #[test]
    fn test_get_announcement_message() {
        assert_eq!(
            Commander::get_announcement_message(&RoundEvent::Milestone { seconds_left: 30 }),
            "⏳ 30 seconds left!"
        );
        assert_eq!(
            Commander::get_announcement_message(&RoundEvent::Expired(Resolution::Identity {
                target: "karl".to_string(),
                original_message: None,
            })),
            "⌛ Time's up, it was **karl**."
        );
    }
}
