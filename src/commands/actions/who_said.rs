//! Who-said-this command handler.
//!
//! Starts rounds, submits guesses of the author and shows the leaderboard. The
//! room of the command is the room of the round and the sender is the guesser.

use log::debug;

use crate::{
    commands::{
        CommandContext, CommandResult,
        command::WhoSaidAction,
        markdown_response::{
            format_game_error, format_guess_outcome, format_identity_start, format_leaderboard,
        },
    },
    games::{GameHub, Geocoder, MessageSource},
};

/// Number of users shown in the leaderboard.
const LEADERBOARD_SIZE: usize = 5;

pub async fn handle_who_said<S: MessageSource, G: Geocoder>(
    context: &CommandContext,
    action: &WhoSaidAction,
    games: &GameHub<S, G>,
) -> CommandResult {
    debug!("handling ws command: {:?}", action);

    let CommandContext { room_id, user_id } = context;

    let response = match action {
        WhoSaidAction::Start(mode) => match games.who_said.start(room_id, *mode).await {
            Ok(start) => format_identity_start(&start),
            Err(e) => format_game_error(&e),
        },
        WhoSaidAction::Guess(name) => match games.who_said.guess(room_id, user_id, name).await {
            Ok(outcome) => format_guess_outcome(&outcome),
            Err(e) => format_game_error(&e),
        },
        WhoSaidAction::Leaderboard(mode) => {
            let entries = games
                .leaderboard
                .top(mode.map(|m| m.table()), LEADERBOARD_SIZE)
                .await;
            format_leaderboard(&entries, *mode)
        }
    };

    CommandResult { response }
}
