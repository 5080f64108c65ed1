//! Location game command handler.

use log::debug;

use crate::{
    commands::{
        CommandContext, CommandResult,
        command::GeoAction,
        markdown_response::{
            format_game_error, format_guess_outcome, format_location_added,
            format_location_removed, format_location_start, format_match_guesses,
            format_match_ids,
        },
    },
    games::{GameHub, Geocoder, MessageSource},
};

/// Handles the `geo` commands and the `gg` shortcut.
///
/// Rounds and guesses are scoped to the room of the command. The catalog and the
/// match history are shared by every room.
pub async fn handle_geo<S: MessageSource, G: Geocoder>(
    context: &CommandContext,
    action: &GeoAction,
    games: &GameHub<S, G>,
) -> CommandResult {
    debug!("handling geo command: {:?}", action);

    let CommandContext { room_id, user_id } = context;

    let response = match action {
        GeoAction::Play => match games.geo.start(room_id).await {
            Ok(start) => format_location_start(&start),
            Err(e) => format_game_error(&e),
        },
        GeoAction::Guess(guess) => match games.geo.guess(room_id, user_id, guess).await {
            Ok(outcome) => format_guess_outcome(&outcome),
            Err(e) => format_game_error(&e),
        },
        GeoAction::Logs(None) => format_match_ids(&games.geo.match_ids().await),
        GeoAction::Logs(Some(match_id)) => {
            format_match_guesses(match_id, &games.geo.match_guesses(match_id).await)
        }
        GeoAction::Add {
            image_url,
            location,
        } => match games.geo.add_location(image_url, location).await {
            Ok(place) => format_location_added(&place),
            Err(e) => format_game_error(&e),
        },
        GeoAction::Remove(image_url) => match games.geo.remove_location(image_url).await {
            Ok(removed) => format_location_removed(image_url, removed),
            Err(e) => format_game_error(&e),
        },
    };

    CommandResult { response }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::actions::test_utils::{create_test_context, create_test_hub},
        games::{Coordinates, MockGeocoder, MockMessageSource},
    };

    const IMAGE: &str = "https://i.imgur.com/berlin.jpg";

    fn berlin() -> Coordinates {
        Coordinates {
            lat: 52.52,
            lon: 13.405,
        }
    }

    #[tokio::test]
    async fn test_play_without_locations() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;

        let result = handle_geo(
            &create_test_context("@alice:example.com"),
            &GeoAction::Play,
            &games,
        )
        .await;

        assert!(result.response.starts_with("No locations yet."));
    }

    #[tokio::test]
    async fn test_add_play_and_guess() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_resolve()
            .with(eq("Berlin"))
            .times(1)
            .returning(|_| Some(berlin()));
        geocoder
            .expect_resolve()
            .with(eq("potsdam"))
            .times(1)
            .returning(|_| {
                Some(Coordinates {
                    lat: 52.39,
                    lon: 13.06,
                })
            });
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), geocoder).await;
        let context = create_test_context("@alice:example.com");

        let added = handle_geo(
            &context,
            &GeoAction::Add {
                image_url: IMAGE.to_string(),
                location: "Berlin".to_string(),
            },
            &games,
        )
        .await;
        assert_eq!(added.response, "Added **Berlin** (52.5200, 13.4050).");

        let start = handle_geo(&context, &GeoAction::Play, &games).await;
        assert!(start.response.starts_with("Where was this picture taken?"));
        assert!(start.response.contains(IMAGE));

        let guess = handle_geo(&context, &GeoAction::Guess("Potsdam".to_string()), &games).await;
        assert_eq!(guess.response, "📍 **potsdam** recorded. ⏳ 30 seconds left!");

        let busy = handle_geo(&context, &GeoAction::Play, &games).await;
        assert_eq!(busy.response, "A round is already running in this room.");
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_url() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;

        let result = handle_geo(
            &create_test_context("@alice:example.com"),
            &GeoAction::Add {
                image_url: "ftp://example.com/a.jpg".to_string(),
                location: "Berlin".to_string(),
            },
            &games,
        )
        .await;

        assert_eq!(
            result.response,
            "`ftp://example.com/a.jpg` is not a valid http(s) image link."
        );
    }

    #[tokio::test]
    async fn test_remove_unknown_location() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;

        let result = handle_geo(
            &create_test_context("@alice:example.com"),
            &GeoAction::Remove(IMAGE.to_string()),
            &games,
        )
        .await;

        assert_eq!(
            result.response,
            "No location uses `https://i.imgur.com/berlin.jpg`."
        );
    }

    #[tokio::test]
    async fn test_logs_without_matches() {
        let dir = TempDir::new().unwrap();
        let (games, _announcements) =
            create_test_hub(&dir, MockMessageSource::new(), MockGeocoder::new()).await;
        let context = create_test_context("@alice:example.com");

        let ids = handle_geo(&context, &GeoAction::Logs(None), &games).await;
        assert_eq!(ids.response, "No matches recorded yet.");

        let guesses = handle_geo(
            &context,
            &GeoAction::Logs(Some("20240309_1".to_string())),
            &games,
        )
        .await;
        assert_eq!(
            guesses.response,
            "No guesses found for match `20240309_1`."
        );
    }
}
