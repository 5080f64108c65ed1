//! Channel-scoped guessing games.
//!
//! This module holds the round engine and the three mini-games that run on top of it:
//!
//! - [`WhoSaidGame`] - guess the author of a random message from the room's chat log
//! - [`GeoGame`] - guess the location shown on a picture, closest guess wins
//! - [`PressureGame`] - push-your-luck turns that alternate between players
//!
//! # Architecture
//!
//! ```text
//! command ──► WhoSaidGame / GeoGame ──► RoundEngine ──► SessionRegistry
//!                  │                        │    └────► timer task (1 tick/s)
//!                  ▼                        ▼
//!      MessageSource / Geocoder     LeaderboardStore, MatchLog
//! ```
//!
//! The [`RoundEngine`] owns every live round. A room can host at most one round at a
//! time, whatever the game. Rounds end exactly once: on a winning guess, when the
//! attempt budget runs out, or when the countdown reaches zero. Events that happen
//! without a command (countdown milestones, expiry) are pushed as [`Announcement`]s
//! on a channel that the bot forwards to the chat.
//!
//! Stores keep their rows in memory and are written to JSON files under the data
//! directory after every change and periodically by [`GameHub::start_persistence_task`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{error, info};
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time,
};

mod engine;
mod identity;
mod leaderboard;
mod location;
mod normalize;
mod pressure;
mod registry;
mod scoring;
mod session;
mod store;
mod timer;

pub use crate::games::{
    engine::{Announcement, GuessOutcome, LocationResult, Resolution, RoundEvent},
    identity::{IdentityStart, LogsRequester, MessageSource, WhoSaidGame},
    leaderboard::{LeaderboardEntry, LeaderboardStore},
    location::{GeoGame, Geocoder, LocationStart, MatchGuess, OpenCageGeocoder},
    pressure::{PressureGame, PressureOutcome},
    scoring::display_score,
    session::{IdentityMode, Place},
};
#[cfg(test)]
pub use crate::games::{
    identity::{MockMessageSource, RoundContent},
    location::{Coordinates, MockGeocoder},
    session::GuessRecord,
};

use crate::{
    games::{
        engine::RoundEngine,
        location::{LocationCatalog, MatchLog},
    },
    utils::get_path,
};

/// Interval in seconds between automatic persistence of all game stores.
const SAVE_INTERVAL_SECS: u64 = 60;

/// Errors surfaced by the games.
///
/// Every variant is recoverable: the caller turns it into a chat message and the
/// round (if any) keeps its state.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    /// A round is already running (or loading) in the room.
    #[error("a round is already running in {0}")]
    AlreadyActive(String),
    /// No round of the requested game is running in the room.
    #[error("no active round in {0}")]
    NoActiveRound(String),
    /// The same normalized guess was already submitted in this round.
    #[error("{0} was already guessed")]
    DuplicateGuess(String),
    /// The user used all their guesses for this round.
    #[error("{user} already made {max} guesses")]
    AttemptBudgetExceeded { user: String, max: u32 },
    /// The geocoder found no coordinates for the given text.
    #[error("no coordinates found for {0}")]
    GeocodeUnavailable(String),
    /// A store could not be written to disk.
    #[error("failed to persist {path}: {reason}")]
    Persistence { path: String, reason: String },
    /// No usable message could be fetched from the chat log.
    #[error("no message could be fetched from the log of {0}")]
    ContentUnavailable(String),
    /// The location catalog is empty.
    #[error("no locations available")]
    NoLocations,
    /// The room has no chat log channel configured.
    #[error("no message log configured for room {0}")]
    LogChannelMissing(String),
    /// The user played the previous pressure turn.
    #[error("{0} played the previous turn")]
    SamePlayer(String),
    /// The image link of a catalog entry is not an http(s) URL.
    #[error("invalid image url {0}")]
    InvalidImageUrl(String),
}

/// All games of the bot, wired to a shared [`RoundEngine`].
///
/// Generic over the external collaborators so tests can plug mocks in place of the
/// HTTP clients.
pub struct GameHub<S: MessageSource, G: Geocoder> {
    /// Who-said-this game
    pub who_said: WhoSaidGame<S>,
    /// Location guessing game
    pub geo: GeoGame<G>,
    /// Pressure game
    pub koler: Arc<PressureGame>,
    /// Identity game scores
    pub leaderboard: Arc<LeaderboardStore>,
    /// Location catalog, kept for persistence
    catalog: Arc<LocationCatalog>,
    /// Location match history, kept for persistence
    match_log: Arc<MatchLog>,
}

impl<S: MessageSource, G: Geocoder> GameHub<S, G> {
    /// Creates all games and loads their stores from `data_path`.
    ///
    /// # Arguments
    ///
    /// * `data_path` - Directory holding the `leaderboard`, `matches`, `locations`
    ///   and `pressure` files
    /// * `source` - Provider of random chat messages for the who-said game
    /// * `geocoder` - Geocoder used by the location game
    /// * `log_channels` - Map of room id to chat log channel name
    ///
    /// # Returns
    ///
    /// The hub and the receiving end of the announcement channel. The bot forwards
    /// every [`Announcement`] to the room it names.
    pub async fn new(
        data_path: &str,
        source: S,
        geocoder: G,
        log_channels: HashMap<String, String>,
    ) -> (Self, UnboundedReceiver<Announcement>) {
        let (announcer, announcements) = mpsc::unbounded_channel();

        let leaderboard = Arc::new(LeaderboardStore::new(get_path(data_path, "leaderboard")).await);
        let match_log = Arc::new(MatchLog::new(get_path(data_path, "matches")).await);
        let catalog = Arc::new(LocationCatalog::new(get_path(data_path, "locations")).await);
        let koler = Arc::new(PressureGame::new(get_path(data_path, "pressure")).await);

        let engine = RoundEngine::new(Arc::clone(&leaderboard), Arc::clone(&match_log), announcer);

        let hub = GameHub {
            who_said: WhoSaidGame::new(engine.clone(), source, log_channels),
            geo: GeoGame::new(
                engine,
                geocoder,
                Arc::clone(&catalog),
                Arc::clone(&match_log),
            ),
            koler,
            leaderboard,
            catalog,
            match_log,
        };

        (hub, announcements)
    }

    /// Starts a background task that writes every store to disk each
    /// [`SAVE_INTERVAL_SECS`] seconds.
    pub fn start_persistence_task(&self) {
        let leaderboard = Arc::clone(&self.leaderboard);
        let catalog = Arc::clone(&self.catalog);
        let match_log = Arc::clone(&self.match_log);
        let koler = Arc::clone(&self.koler);

        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(SAVE_INTERVAL_SECS));
            // The first tick completes immediately, the stores were just loaded
            interval.tick().await;
            loop {
                interval.tick().await;
                let results = futures::join!(
                    leaderboard.persist(),
                    catalog.persist(),
                    match_log.persist(),
                    koler.persist()
                );
                for result in [results.0, results.1, results.2, results.3] {
                    if let Err(e) = result {
                        error!("periodic persistence failed: {}", e);
                    }
                }
                info!("persisted game stores");
            }
        });
    }
}
