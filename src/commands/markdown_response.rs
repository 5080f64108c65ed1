//! Markdown response formatters for bot commands.
//!
//! This module provides functions to format bot responses in Markdown format
//! for display in Matrix chat rooms. Round events that are not replies to a command
//! (countdown reminders, timeouts) are formatted here as well.

use crate::games::{
    GameError, GuessOutcome, IdentityMode, IdentityStart, LeaderboardEntry, LocationResult,
    LocationStart, MatchGuess, Place, PressureOutcome, Resolution, RoundEvent, display_score,
};

/// Formats the help message showing available bot commands.
///
/// # Examples
///
/// ```
/// # use boti::commands::markdown_response::format_help;
/// let help = format_help();
/// assert!(help.contains("Commands:"));
/// ```
pub fn format_help() -> String {
    let body = "Commands:\n\
        - `ws`: start a round of *who said this*, guess the author of a random message of this room\n\
        - `ws story`: same, but the author is also hidden in the message and points are worth 25% more\n\
        - `ws <user>`: guess the author of the current message, write `ws @lb` or `ws @story` for users named `lb` or `story`\n\
        - `ws lb [normal|story]`: show the leaderboard\n\
        - `geo play`: start a location round, guess where the picture was taken\n\
        - `gg <location>` or `geo guess <location>`: guess the location, the closest guess wins\n\
        - `geo logs [match_id]`: list past matches or the guesses of a match\n\
        - `geo add <image_url> <location>`: add a picture to the locations\n\
        - `geo remove <image_url>`: remove a picture from the locations\n\
        - `koler`: pump the balloon and hope it doesn't burst\n\
        - `help`: show this help message\n\n\
        A room hosts one round at a time. Who said this rounds allow 3 guesses in total, location rounds 5 guesses per player.\n\
        > *boti* is a free open source chat games bot.";

    body.to_owned()
}

/// Formats a response for an unknown command.
pub fn format_unknown_command() -> String {
    "Unknown command. Type `!boti help` for more information.".to_owned()
}

pub fn format_invalid_guess() -> String {
    "Invalid guess command. Usage: `!boti ws <user>`".to_owned()
}

/// Formats an error response for invalid `geo` command syntax.
pub fn format_invalid_geo() -> String {
    "Invalid geo command. Usage:\n\
        - `!boti geo play`\n\
        - `!boti gg <location>`\n\
        - `!boti geo logs [match_id]`\n\
        - `!boti geo add <image_url> <location>`\n\
        - `!boti geo remove <image_url>`"
        .to_owned()
}

/// Formats a game error into a user-facing message.
///
/// # Examples
///
/// ```
/// # use boti::commands::markdown_response::format_game_error;
/// # use boti::games::GameError;
/// let message = format_game_error(&GameError::NoLocations);
/// assert!(message.contains("geo add"));
/// ```
pub fn format_game_error(error: &GameError) -> String {
    match error {
        GameError::AlreadyActive(_) => "A round is already running in this room.".to_owned(),
        GameError::NoActiveRound(_) => {
            "No round is running here. Start one with `!boti ws` or `!boti geo play`.".to_owned()
        }
        GameError::DuplicateGuess(guess) => format!("**{}** was already guessed.", guess),
        GameError::AttemptBudgetExceeded { max, .. } => {
            format!("You already used your {} guesses.", max)
        }
        GameError::GeocodeUnavailable(query) => {
            format!("Could not find **{}** on the map, try another name.", query)
        }
        GameError::Persistence { .. } => "Error: the game data could not be saved.".to_owned(),
        GameError::ContentUnavailable(_) => {
            "Could not fetch a message, try again later.".to_owned()
        }
        GameError::NoLocations => {
            "No locations yet. Add one with `!boti geo add <image_url> <location>`.".to_owned()
        }
        GameError::LogChannelMissing(_) => "No message log is set up for this room.".to_owned(),
        GameError::SamePlayer(_) => "You pumped last, let someone else have a go.".to_owned(),
        GameError::InvalidImageUrl(url) => {
            format!("`{}` is not a valid http(s) image link.", url)
        }
    }
}

/// Appends the unredacted message of a story round, if any.
fn with_original(text: String, original_message: &Option<String>) -> String {
    match original_message {
        Some(message) => format!("{}\n\n> {}", text, message),
        None => text,
    }
}

/// Formats the opening message of a who-said round.
pub fn format_identity_start(start: &IdentityStart) -> String {
    let question = match start.mode {
        IdentityMode::Normal => "Who wrote this message?",
        IdentityMode::Story => "Who is this story about?",
    };

    format!(
        "{} {} tries, {} minutes. Guess with `!boti ws <user>`.\n\n> {}",
        question,
        start.attempt_budget,
        start.time_limit_secs / 60,
        start.prompt
    )
}

/// Formats the opening message of a location round.
pub fn format_location_start(start: &LocationStart) -> String {
    format!(
        "Where was this picture taken? {} guesses each, {} seconds. Guess with `!boti gg <location>`.\n\n{}\n\nMatch `{}`",
        start.attempt_budget, start.time_limit_secs, start.image_url, start.match_id
    )
}

/// Formats the result of a guess.
///
/// # Examples
///
/// ```
/// # use boti::commands::markdown_response::format_guess_outcome;
/// # use boti::games::GuessOutcome;
/// let message = format_guess_outcome(&GuessOutcome::Wrong {
///     attempts_used: 1,
///     attempt_budget: 3,
///     seconds_left: 120,
/// });
/// assert_eq!(message, "❌ [1/3] [120s left]");
/// ```
pub fn format_guess_outcome(outcome: &GuessOutcome) -> String {
    match outcome {
        GuessOutcome::Won {
            target,
            points,
            original_message,
        } => with_original(
            format!(
                "✅ Correct, it was **{}**! +{} points",
                target,
                display_score(*points)
            ),
            original_message,
        ),
        GuessOutcome::Wrong {
            attempts_used,
            attempt_budget,
            seconds_left,
        } => format!(
            "❌ [{}/{}] [{}s left]",
            attempts_used, attempt_budget, seconds_left
        ),
        GuessOutcome::Lost {
            target,
            original_message,
        } => with_original(
            format!("❌ No tries left, it was **{}**.", target),
            original_message,
        ),
        GuessOutcome::Recorded {
            guess,
            clamped,
            seconds_left,
            ..
        } => {
            if *clamped {
                format!(
                    "📍 **{}** recorded. ⏳ {} seconds left!",
                    guess, seconds_left
                )
            } else {
                format!("📍 **{}** recorded.", guess)
            }
        }
    }
}

fn format_location_result(result: &LocationResult) -> String {
    let Some(winner) = &result.winner else {
        return format!(
            "⌛ Time's up, no one guessed. It was **{}**.",
            result.location
        );
    };

    let ranking = result
        .ranking
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "{}. {}: {} ({:.1} km)",
                i + 1,
                record.user,
                record.guess,
                record.distance_km
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        "🏆 **{}** wins with **{}**, {:.1} km away from **{}**!\n\n{}",
        winner.user, winner.guess, winner.distance_km, result.location, ranking
    )
}

/// Formats an event pushed by a round countdown.
///
/// # Examples
///
/// ```
/// # use boti::commands::markdown_response::format_round_event;
/// # use boti::games::RoundEvent;
/// let message = format_round_event(&RoundEvent::Milestone { seconds_left: 30 });
/// assert_eq!(message, "⏳ 30 seconds left!");
/// ```
pub fn format_round_event(event: &RoundEvent) -> String {
    match event {
        RoundEvent::Milestone { seconds_left } => format!("⏳ {} seconds left!", seconds_left),
        RoundEvent::Expired(Resolution::Identity {
            target,
            original_message,
        }) => with_original(
            format!("⌛ Time's up, it was **{}**.", target),
            original_message,
        ),
        RoundEvent::Expired(Resolution::Location(result)) => format_location_result(result),
    }
}

/// Formats a leaderboard.
pub fn format_leaderboard(entries: &[LeaderboardEntry], mode: Option<IdentityMode>) -> String {
    if entries.is_empty() {
        return "No scores yet.".to_owned();
    }

    let title = match mode {
        Some(mode) => mode.table(),
        None => "all modes",
    };
    let rows = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{}. **{}**: {}",
                i + 1,
                entry.username,
                display_score(entry.score)
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!("Leaderboard ({}):\n\n{}", title, rows)
}

pub fn format_match_ids(match_ids: &[String]) -> String {
    if match_ids.is_empty() {
        return "No matches recorded yet.".to_owned();
    }

    let ids = match_ids
        .iter()
        .map(|id| format!("`{}`", id))
        .collect::<Vec<String>>()
        .join(", ");

    format!("Matches: {}", ids)
}

/// Formats the recorded guesses of a match, closest first.
pub fn format_match_guesses(match_id: &str, guesses: &[MatchGuess]) -> String {
    let Some(first) = guesses.first() else {
        return format!("No guesses found for match `{}`.", match_id);
    };

    let rows = guesses
        .iter()
        .enumerate()
        .map(|(i, g)| {
            format!(
                "{}. {}: {} ({:.1} km)",
                i + 1,
                g.record.user,
                g.record.guess,
                g.record.distance_km
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        "Match `{}`, location **{}**:\n\n{}",
        match_id, first.match_location, rows
    )
}

pub fn format_location_added(place: &Place) -> String {
    format!(
        "Added **{}** ({:.4}, {:.4}).",
        place.name, place.lat, place.lon
    )
}

pub fn format_location_removed(image_url: &str, removed: bool) -> String {
    if removed {
        format!("Removed `{}` from the locations.", image_url)
    } else {
        format!("No location uses `{}`.", image_url)
    }
}

/// Formats the result of a koler turn.
pub fn format_pressure(outcome: &PressureOutcome) -> String {
    match outcome {
        PressureOutcome::Burst { pressure, odds } => format!(
            "💥 The balloon burst at {}% pressure ({}% chance)! Back to round 1.",
            pressure, odds
        ),
        PressureOutcome::Holding {
            pressure,
            odds,
            next_round,
        } => format!(
            "🎈 {}% pressure, {}% chance to burst. It held! Round {} is next.",
            pressure, odds, next_round
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GuessRecord;

    fn record(user: &str, guess: &str, distance_km: f64) -> GuessRecord {
        GuessRecord {
            channel: "!room:example.com".to_string(),
            user: user.to_string(),
            guess: guess.to_string(),
            distance_km,
        }
    }

    #[test]
    fn test_format_help() {
        let help = format_help();
        assert!(help.contains("Commands:"));
        assert!(help.contains("`koler`"));
        assert!(help.contains("`ws @lb`"));
    }

    #[test]
    fn test_format_identity_start() {
        let start = IdentityStart {
            mode: IdentityMode::Normal,
            prompt: "01.02.2024, 13:37 | x: hello".to_string(),
            attempt_budget: 3,
            time_limit_secs: 180,
        };

        assert_eq!(
            format_identity_start(&start),
            "Who wrote this message? 3 tries, 3 minutes. Guess with `!boti ws <user>`.\n\n> 01.02.2024, 13:37 | x: hello"
        );
    }

    #[test]
    fn test_format_won_story_reveals_message() {
        let message = format_guess_outcome(&GuessOutcome::Won {
            target: "karl".to_string(),
            points: 1.25,
            original_message: Some("karl is here".to_string()),
        });

        assert_eq!(
            message,
            "✅ Correct, it was **karl**! +31 points\n\n> karl is here"
        );
    }

    #[test]
    fn test_format_recorded_guess() {
        let clamped = format_guess_outcome(&GuessOutcome::Recorded {
            user: "alice".to_string(),
            guess: "paris".to_string(),
            distance_km: 3.0,
            clamped: true,
            seconds_left: 30,
        });
        assert_eq!(clamped, "📍 **paris** recorded. ⏳ 30 seconds left!");

        let quiet = format_guess_outcome(&GuessOutcome::Recorded {
            user: "alice".to_string(),
            guess: "paris".to_string(),
            distance_km: 3.0,
            clamped: false,
            seconds_left: 12,
        });
        assert_eq!(quiet, "📍 **paris** recorded.");
    }

    #[test]
    fn test_format_location_result() {
        let result = LocationResult {
            match_id: "20240309_1".to_string(),
            location: "Berlin".to_string(),
            winner: Some(record("b", "potsdam", 3.1)),
            ranking: vec![record("b", "potsdam", 3.1), record("a", "hamburg", 12.44)],
        };

        let message = format_round_event(&RoundEvent::Expired(Resolution::Location(result)));

        assert_eq!(
            message,
            "🏆 **b** wins with **potsdam**, 3.1 km away from **Berlin**!\n\n1. b: potsdam (3.1 km)\n2. a: hamburg (12.4 km)"
        );
    }

    #[test]
    fn test_format_location_without_guesses() {
        let result = LocationResult {
            match_id: "20240309_1".to_string(),
            location: "Berlin".to_string(),
            winner: None,
            ranking: vec![],
        };

        let message = format_round_event(&RoundEvent::Expired(Resolution::Location(result)));

        assert_eq!(message, "⌛ Time's up, no one guessed. It was **Berlin**.");
    }

    #[test]
    fn test_format_leaderboard() {
        assert_eq!(format_leaderboard(&[], None), "No scores yet.");

        let entries = vec![LeaderboardEntry {
            mode: "combined".to_string(),
            username: "@u:example.com".to_string(),
            score: 1.5,
        }];
        assert_eq!(
            format_leaderboard(&entries, None),
            "Leaderboard (all modes):\n\n1. **@u:example.com**: 37"
        );
    }

    #[test]
    fn test_format_match_guesses() {
        assert_eq!(
            format_match_guesses("20240309_9", &[]),
            "No guesses found for match `20240309_9`."
        );

        let guesses = vec![MatchGuess {
            match_id: "20240309_1".to_string(),
            record: record("a", "potsdam", 25.0),
            match_location: "Berlin".to_string(),
        }];
        assert_eq!(
            format_match_guesses("20240309_1", &guesses),
            "Match `20240309_1`, location **Berlin**:\n\n1. a: potsdam (25.0 km)"
        );
    }

    #[test]
    fn test_format_game_errors() {
        assert_eq!(
            format_game_error(&GameError::DuplicateGuess("otto".to_string())),
            "**otto** was already guessed."
        );
        assert_eq!(
            format_game_error(&GameError::AttemptBudgetExceeded {
                user: "alice".to_string(),
                max: 5
            }),
            "You already used your 5 guesses."
        );
    }

    #[test]
    fn test_format_pressure() {
        assert_eq!(
            format_pressure(&PressureOutcome::Holding {
                pressure: 9,
                odds: 1,
                next_round: 2
            }),
            "🎈 9% pressure, 1% chance to burst. It held! Round 2 is next."
        );
    }
}
