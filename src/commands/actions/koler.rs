//! Pressure game command handler.

use log::debug;

use crate::{
    commands::{
        CommandContext, CommandResult,
        markdown_response::{format_game_error, format_pressure},
    },
    games::{GameHub, Geocoder, MessageSource},
};

/// Plays a pressure turn for the sender in the room of the command.
pub async fn handle_koler<S: MessageSource, G: Geocoder>(
    context: &CommandContext,
    games: &GameHub<S, G>,
) -> CommandResult {
    debug!("handling koler command from {}", context.user_id);

    let response = match games.koler.play(&context.room_id, &context.user_id).await {
        Ok(outcome) => format_pressure(&outcome),
        Err(e) => format_game_error(&e),
    };

    CommandResult { response }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::actions::test_utils::{create_test_context, create_test_hub},
        games::{MockGeocoder, MockMessageSource},
    };

    #[tokio::test]
    async fn test_first_turn_and_same_player() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;
        let context = create_test_context("@alice:example.com");

        // Round 1 is at 9% pressure whether the balloon bursts or not
        let first = handle_koler(&context, &games).await;
        assert!(first.response.contains("9% pressure"));

        let again = handle_koler(&context, &games).await;
        assert_eq!(
            again.response,
            "You pumped last, let someone else have a go."
        );
    }
}
