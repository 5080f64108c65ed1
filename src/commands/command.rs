//! Command parsing and handling.
//!
//! This module provides command parsing functionality for the bot, converting
//! Matrix message text into structured [`Command`] enums that can be processed
//! by the application.

use command_parser::{Command as ParserCommand, Parser};
use log::debug;

use crate::{
    commands::markdown_response::{format_invalid_geo, format_invalid_guess, format_unknown_command},
    games::IdentityMode,
};

/// Represents a parsed bot command.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Display help information
    Help,
    /// Who-said-this game
    WhoSaid(WhoSaidAction),
    /// Location game
    Geo(GeoAction),
    /// Pressure game turn
    Koler,
}

#[derive(Debug, PartialEq)]
pub enum WhoSaidAction {
    /// `ws` or `ws story`
    Start(IdentityMode),
    /// `ws <user>`
    Guess(String),
    /// `ws lb [normal|story]`, all modes when no table is given
    Leaderboard(Option<IdentityMode>),
}

#[derive(Debug, PartialEq)]
pub enum GeoAction {
    Play,
    /// `gg <location>` or `geo guess <location>`
    Guess(String),
    /// `geo logs [match_id]`, the list of matches when no id is given
    Logs(Option<String>),
    Add {
        image_url: String,
        location: String,
    },
    Remove(String),
}

/// Errors that can occur during command parsing.
#[derive(Debug)]
pub enum CommandParsingError {
    /// The message could not be parsed as a command
    UnableToParse,
    /// The command is not for this bot (wrong prefix)
    NotBoti,
    /// The command is not recognized
    Unknown,
    /// The guess command has no guess
    InvalidGuess,
    /// A geo command has invalid syntax or arguments
    InvalidGeo,
}

impl Command {
    /// Parses a message string into a Command.
    ///
    /// # Arguments
    ///
    /// * `parser` - The command parser instance configured for the bot
    /// * `body` - The message text to parse
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The message is not a command format - [`CommandParsingError::UnableToParse`]
    /// - The command is for a different bot - [`CommandParsingError::NotBoti`]
    /// - The command is not recognized - [`CommandParsingError::Unknown`]
    /// - A guess has no text - [`CommandParsingError::InvalidGuess`]
    /// - A geo command has missing arguments - [`CommandParsingError::InvalidGeo`]
    ///
    /// # Examples
    ///
    /// ```
    /// # use command_parser::Parser;
    /// # use boti::commands::command::Command;
    /// let parser = Parser::new('!', '-');
    /// let result = Command::parse(&parser, "!boti koler");
    /// assert!(result.is_ok());
    /// ```
    pub fn parse(parser: &Parser, body: &str) -> Result<Self, CommandParsingError> {
        // For an unknown reason the parser ignores the last word, so we add a dummy word at the end
        let body = body.to_string() + " dummy";

        // This is normal to fails if the message is not a command
        let command = match parser.parse(&body) {
            Ok(cmd) => cmd,
            Err(_) => return Err(CommandParsingError::UnableToParse),
        };

        // Ignore commands that are not for the bot
        if command.name != "boti" {
            return Err(CommandParsingError::NotBoti);
        }

        debug!("Parsing command: {:?}", command);

        // If no arguments, return help
        if command.arguments.is_empty() {
            return Ok(Command::Help);
        }

        match command.arguments[0].as_str() {
            "help" => Ok(Command::Help),
            "ws" => Ok(Command::WhoSaid(Self::parse_who_said(&command)?)),
            "geo" => Ok(Command::Geo(Self::parse_geo(&command)?)),
            "gg" => Ok(Command::Geo(GeoAction::Guess(Self::joined_from(
                &command, 1,
            )
            .ok_or(CommandParsingError::InvalidGeo)?))),
            "koler" => Ok(Command::Koler),
            _ => Err(CommandParsingError::Unknown),
        }
    }

    /// Joins the arguments from `index` on, `None` if there are none.
    fn joined_from(command: &ParserCommand, index: usize) -> Option<String> {
        let words = command.arguments.get(index..)?;
        if words.is_empty() {
            return None;
        }
        Some(words.join(" "))
    }

    fn parse_who_said(command: &ParserCommand) -> Result<WhoSaidAction, CommandParsingError> {
        debug!("Parsing ws command: {:?}", command);

        let Some(first) = command.arguments.get(1) else {
            return Ok(WhoSaidAction::Start(IdentityMode::Normal));
        };

        match first.as_str() {
            "story" => Ok(WhoSaidAction::Start(IdentityMode::Story)),
            "lb" => match command.arguments.get(2).map(String::as_str) {
                None => Ok(WhoSaidAction::Leaderboard(None)),
                Some("normal") => Ok(WhoSaidAction::Leaderboard(Some(IdentityMode::Normal))),
                Some("story") => Ok(WhoSaidAction::Leaderboard(Some(IdentityMode::Story))),
                Some(_) => Err(CommandParsingError::Unknown),
            },
            // `@` lets a guess use a reserved word, `ws @lb` guesses the user `lb`
            _ => Self::joined_from(command, 1)
                .map(|guess| guess.strip_prefix('@').map(str::to_string).unwrap_or(guess))
                .filter(|guess| !guess.trim().is_empty())
                .map(WhoSaidAction::Guess)
                .ok_or(CommandParsingError::InvalidGuess),
        }
    }

    fn parse_geo(command: &ParserCommand) -> Result<GeoAction, CommandParsingError> {
        debug!("Parsing geo command: {:?}", command);

        let Some(subcommand) = command.arguments.get(1) else {
            return Err(CommandParsingError::InvalidGeo);
        };

        match subcommand.as_str() {
            "play" => Ok(GeoAction::Play),
            "guess" => Self::joined_from(command, 2)
                .map(GeoAction::Guess)
                .ok_or(CommandParsingError::InvalidGeo),
            "logs" => Ok(GeoAction::Logs(command.arguments.get(2).cloned())),
            "add" => {
                // 4 arguments at least: geo, add, image url and a location of one or more words
                let image_url = command
                    .arguments
                    .get(2)
                    .cloned()
                    .ok_or(CommandParsingError::InvalidGeo)?;
                let location =
                    Self::joined_from(command, 3).ok_or(CommandParsingError::InvalidGeo)?;
                Ok(GeoAction::Add {
                    image_url,
                    location,
                })
            }
            "remove" => command
                .arguments
                .get(2)
                .cloned()
                .map(GeoAction::Remove)
                .ok_or(CommandParsingError::InvalidGeo),
            _ => Err(CommandParsingError::InvalidGeo),
        }
    }
}

/// Formats a command error into a user-friendly message.
///
/// # Returns
///
/// * `Some(String)` - A formatted error message for user-facing errors
/// * `None` - For messages that are not for the bot and should not produce a response
pub fn format_command_error(error: CommandParsingError) -> Option<String> {
    match error {
        CommandParsingError::Unknown => Some(format_unknown_command()),
        CommandParsingError::InvalidGuess => Some(format_invalid_guess()),
        CommandParsingError::InvalidGeo => Some(format_invalid_geo()),
        CommandParsingError::UnableToParse | CommandParsingError::NotBoti => None,
    }
}
