//! State of a single round.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Instant};

use crate::games::{location::Coordinates, timer::Countdown};

/// Identifier of a round, unique for the lifetime of the process.
///
/// Timer tasks carry the id of the round that armed them so that a tick arriving
/// after the round ended is recognized as stale.
pub type SessionId = u64;

/// Which game a round belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Who said this message
    Identity,
    /// Where was this picture taken
    Location,
}

impl Variant {
    /// Maximum number of guesses.
    ///
    /// Identity rounds share the budget between all players, location rounds count
    /// it per user.
    pub fn attempt_budget(&self) -> u32 {
        match self {
            Variant::Identity => 3,
            Variant::Location => 5,
        }
    }
}

/// Flavour of an identity round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// The message is shown with its author hidden.
    Normal,
    /// The author's name is also redacted from the message body, points get a bonus.
    Story,
}

impl IdentityMode {
    /// Leaderboard table the points of this mode go to.
    pub fn table(&self) -> &'static str {
        match self {
            IdentityMode::Normal => "normal",
            IdentityMode::Story => "story",
        }
    }

    pub fn time_limit(&self) -> Duration {
        match self {
            IdentityMode::Normal => Duration::from_secs(180),
            IdentityMode::Story => Duration::from_secs(300),
        }
    }
}

/// A catalog entry of the location game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Link to the picture shown to players
    pub image_url: String,
    /// Human readable name, revealed at the end of the round
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Place {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// One resolved location guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessRecord {
    /// Room the guess was made in
    pub channel: String,
    /// Author of the guess
    pub user: String,
    /// Normalized guess text
    pub guess: String,
    /// Great-circle distance to the answer
    pub distance_km: f64,
}

/// Data that only one of the games needs.
#[derive(Debug)]
pub enum RoundDetails {
    Identity {
        mode: IdentityMode,
        /// Unredacted message, revealed at the end of story rounds
        original_message: Option<String>,
    },
    Location {
        match_id: String,
        place: Place,
        /// Accepted guesses in submission order
        guesses: Vec<GuessRecord>,
    },
}

/// A live round in one room.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Room hosting the round
    pub channel: String,
    /// Normalized answer
    pub target: String,
    pub variant: Variant,
    /// Wrong guesses so far (identity rounds)
    pub attempts_used: u32,
    /// Normalized guesses in submission order
    pub guessed: Vec<String>,
    pub started_at: Instant,
    pub time_limit: Duration,
    pub countdown: Countdown,
    pub details: RoundDetails,
    /// Handle of the countdown task
    pub timer: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        channel: &str,
        target: String,
        time_limit: Duration,
        details: RoundDetails,
    ) -> Self {
        let variant = match details {
            RoundDetails::Identity { .. } => Variant::Identity,
            RoundDetails::Location { .. } => Variant::Location,
        };

        Session {
            id,
            channel: channel.to_string(),
            target,
            variant,
            attempts_used: 0,
            guessed: Vec::new(),
            started_at: Instant::now(),
            time_limit,
            countdown: Countdown::new(time_limit),
            details,
            timer: None,
        }
    }

    /// Number of guesses `user` made in this round.
    pub fn attempts_of(&self, user: &str) -> u32 {
        match &self.details {
            RoundDetails::Identity { .. } => self.attempts_used,
            RoundDetails::Location { guesses, .. } => {
                guesses.iter().filter(|g| g.user == user).count() as u32
            }
        }
    }

    /// Whether `guess` was already submitted.
    ///
    /// Identity rounds reject a guess made by anyone before, location rounds only
    /// reject a user repeating their own guess.
    pub fn is_duplicate(&self, user: &str, guess: &str) -> bool {
        match &self.details {
            RoundDetails::Identity { .. } => self.guessed.iter().any(|g| g == guess),
            RoundDetails::Location { guesses, .. } => guesses
                .iter()
                .any(|g| g.user == user && g.guess == guess),
        }
    }

    /// Stops the countdown task, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}
