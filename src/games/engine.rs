//! Lifecycle of rounds: start, guesses, resolution.
//!
//! The engine holds the [`SessionRegistry`] behind a single async mutex. Every check
//! and state change of a round happens while holding it, which makes resolution
//! exactly-once: whichever of a winning guess, the last allowed guess or the timer
//! removes the session from the registry first resolves the round, the others find
//! nothing to act on. Slow work (geocoding, file writes) happens outside the lock.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, mpsc::UnboundedSender};

use crate::games::{
    GameError,
    identity::RoundContent,
    leaderboard::LeaderboardStore,
    location::{Coordinates, MatchLog, haversine_km},
    normalize::normalize_answer,
    registry::SessionRegistry,
    scoring::identity_points,
    session::{GuessRecord, IdentityMode, Place, RoundDetails, Session, SessionId, Variant},
    timer::{self, GUESS_CLAMP_SECS, Tick, TimerControl},
};

/// Something to tell a room that no command asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Room to post in
    pub channel: String,
    pub event: RoundEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    /// The countdown reached one of the reminder thresholds.
    Milestone { seconds_left: u64 },
    /// The countdown ran out.
    Expired(Resolution),
}

/// How a round ended on timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Identity {
        target: String,
        original_message: Option<String>,
    },
    Location(LocationResult),
}

/// Outcome of a location round.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub match_id: String,
    /// Name of the place
    pub location: String,
    /// Closest guess, earliest one on ties
    pub winner: Option<GuessRecord>,
    /// All guesses, closest first
    pub ranking: Vec<GuessRecord>,
}

/// Result of an accepted guess.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    /// Correct identity guess, the round is over.
    Won {
        target: String,
        points: f64,
        original_message: Option<String>,
    },
    /// Wrong identity guess, the round goes on.
    Wrong {
        attempts_used: u32,
        attempt_budget: u32,
        seconds_left: u64,
    },
    /// Wrong identity guess that used the last attempt, the round is over.
    Lost {
        target: String,
        original_message: Option<String>,
    },
    /// Location guess stored until the end of the round.
    Recorded {
        user: String,
        guess: String,
        distance_km: f64,
        /// Whether the guess cut the remaining time
        clamped: bool,
        seconds_left: u64,
    },
}

/// Owner of every live round.
///
/// Cheap to clone: clones share the same registry and stores.
#[derive(Clone)]
pub struct RoundEngine {
    registry: Arc<Mutex<SessionRegistry>>,
    leaderboard: Arc<LeaderboardStore>,
    match_log: Arc<MatchLog>,
    announcer: UnboundedSender<Announcement>,
}

impl RoundEngine {
    pub fn new(
        leaderboard: Arc<LeaderboardStore>,
        match_log: Arc<MatchLog>,
        announcer: UnboundedSender<Announcement>,
    ) -> Self {
        RoundEngine {
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            leaderboard,
            match_log,
            announcer,
        }
    }

    /// Reserves `channel` for a round whose content is still being fetched.
    ///
    /// # Errors
    ///
    /// [`GameError::AlreadyActive`] if the room is busy.
    pub async fn reserve(&self, channel: &str) -> Result<SessionId, GameError> {
        self.registry.lock().await.try_start(channel)
    }

    /// Releases a reservation after fetching content failed.
    pub async fn abandon(&self, channel: &str, id: SessionId) {
        self.registry.lock().await.abandon(channel, id);
        debug!("abandoned round {} in {}", id, channel);
    }

    /// Whether `channel` is reserved or hosts a round.
    pub async fn is_busy(&self, channel: &str) -> bool {
        self.registry.lock().await.is_busy(channel)
    }

    /// Starts the reserved identity round `id` and its countdown.
    pub async fn activate_identity(
        &self,
        channel: &str,
        id: SessionId,
        content: RoundContent,
        mode: IdentityMode,
    ) -> Result<(), GameError> {
        let session = Session::new(
            id,
            channel,
            normalize_answer(&content.target),
            mode.time_limit(),
            RoundDetails::Identity {
                mode,
                original_message: content.auxiliary,
            },
        );
        self.install(session).await
    }

    /// Starts the reserved location round `id` and its countdown.
    pub async fn activate_location(
        &self,
        channel: &str,
        id: SessionId,
        match_id: String,
        place: Place,
        time_limit: Duration,
    ) -> Result<(), GameError> {
        let session = Session::new(
            id,
            channel,
            normalize_answer(&place.name),
            time_limit,
            RoundDetails::Location {
                match_id,
                place,
                guesses: Vec::new(),
            },
        );
        self.install(session).await
    }

    async fn install(&self, session: Session) -> Result<(), GameError> {
        let channel = session.channel.clone();
        let id = session.id;

        let mut registry = self.registry.lock().await;
        let session = registry.activate(session)?;

        let engine = self.clone();
        let timer_channel = channel.clone();
        session.timer = Some(timer::arm(move || {
            let engine = engine.clone();
            let channel = timer_channel.clone();
            async move { engine.on_tick(&channel, id).await }
        }));

        info!(
            "started {:?} round {} in {} for {:?}",
            session.variant, id, channel, session.time_limit
        );
        Ok(())
    }

    /// Submits a guess for the identity round of `channel`.
    ///
    /// A duplicate guess is rejected without using an attempt. A wrong guess uses
    /// one attempt of the shared budget, the one using the last attempt ends the
    /// round. A correct guess ends the round and awards points to `user`.
    ///
    /// # Errors
    ///
    /// - [`GameError::NoActiveRound`] if no identity round is running
    /// - [`GameError::DuplicateGuess`] if the normalized guess was already made
    pub async fn submit_identity_guess(
        &self,
        channel: &str,
        user: &str,
        raw_guess: &str,
    ) -> Result<GuessOutcome, GameError> {
        let guess = normalize_answer(raw_guess);

        let mut registry = self.registry.lock().await;
        let session = registry
            .get_mut(channel)
            .filter(|session| session.variant == Variant::Identity)
            .ok_or_else(|| GameError::NoActiveRound(channel.to_string()))?;

        if session.is_duplicate(user, &guess) {
            return Err(GameError::DuplicateGuess(guess));
        }
        session.guessed.push(guess.clone());

        let id = session.id;
        let budget = session.variant.attempt_budget();
        let attempt_index = session.attempts_used;
        let correct = guess == session.target;
        if !correct {
            session.attempts_used += 1;
            if session.attempts_used < budget {
                debug!("wrong guess {} by {} in {}", guess, user, channel);
                return Ok(GuessOutcome::Wrong {
                    attempts_used: session.attempts_used,
                    attempt_budget: budget,
                    seconds_left: session.countdown.remaining(),
                });
            }
        }

        let Some(mut session) = registry.end(channel, id) else {
            return Err(GameError::NoActiveRound(channel.to_string()));
        };
        drop(registry);
        session.cancel_timer();

        let RoundDetails::Identity {
            mode,
            original_message,
        } = session.details
        else {
            return Err(GameError::NoActiveRound(channel.to_string()));
        };

        if !correct {
            info!(
                "identity round {} in {} lost after {:?}",
                id,
                channel,
                session.started_at.elapsed()
            );
            return Ok(GuessOutcome::Lost {
                target: session.target,
                original_message,
            });
        }

        let points = identity_points(attempt_index, mode);
        info!(
            "{} won identity round {} in {} for {} points",
            user, id, channel, points
        );
        self.leaderboard.award(mode.table(), user, points).await;
        if let Err(e) = self.leaderboard.persist().await {
            error!(
                "failed to persist leaderboard after {} won round {} in {}: {}",
                user, id, channel, e
            );
        }

        Ok(GuessOutcome::Won {
            target: session.target,
            points,
            original_message,
        })
    }

    /// Validates a location guess before it is geocoded.
    ///
    /// # Returns
    ///
    /// The id of the round the guess applies to, to be passed back to
    /// [`RoundEngine::commit_location_guess`].
    ///
    /// # Errors
    ///
    /// - [`GameError::NoActiveRound`] if no location round is running
    /// - [`GameError::AttemptBudgetExceeded`] if `user` has no guesses left
    /// - [`GameError::DuplicateGuess`] if `user` already made this guess
    pub async fn check_location_guess(
        &self,
        channel: &str,
        user: &str,
        guess: &str,
    ) -> Result<SessionId, GameError> {
        let registry = self.registry.lock().await;
        let session = registry
            .get(channel)
            .filter(|session| session.variant == Variant::Location)
            .ok_or_else(|| GameError::NoActiveRound(channel.to_string()))?;

        validate_location_guess(session, user, guess)?;
        Ok(session.id)
    }

    /// Records a geocoded location guess.
    ///
    /// The checks of [`RoundEngine::check_location_guess`] are repeated since the
    /// round may have moved on while geocoding. Each recorded guess lowers the
    /// remaining time to [`GUESS_CLAMP_SECS`].
    pub async fn commit_location_guess(
        &self,
        channel: &str,
        id: SessionId,
        user: &str,
        guess: &str,
        coordinates: Coordinates,
    ) -> Result<GuessOutcome, GameError> {
        let mut registry = self.registry.lock().await;
        let session = registry
            .get_mut(channel)
            .filter(|session| session.id == id)
            .ok_or_else(|| GameError::NoActiveRound(channel.to_string()))?;

        validate_location_guess(session, user, guess)?;

        let RoundDetails::Location { place, guesses, .. } = &mut session.details else {
            return Err(GameError::NoActiveRound(channel.to_string()));
        };

        let distance_km = haversine_km(coordinates, place.coordinates());
        guesses.push(GuessRecord {
            channel: channel.to_string(),
            user: user.to_string(),
            guess: guess.to_string(),
            distance_km,
        });
        session.guessed.push(guess.to_string());
        let clamped = session.countdown.clamp(GUESS_CLAMP_SECS);

        debug!(
            "{} guessed {} in {}, {:.1} km off",
            user, guess, channel, distance_km
        );

        Ok(GuessOutcome::Recorded {
            user: user.to_string(),
            guess: guess.to_string(),
            distance_km,
            clamped,
            seconds_left: session.countdown.remaining(),
        })
    }

    /// Advances the countdown of round `id`, resolving it on expiry.
    async fn on_tick(&self, channel: &str, id: SessionId) -> TimerControl {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry
            .get_mut(channel)
            .filter(|session| session.id == id)
        else {
            debug!("stale timer of round {} in {}", id, channel);
            return TimerControl::Stop;
        };

        match session.countdown.tick() {
            Tick::Running(_) => TimerControl::Continue,
            Tick::Milestone(seconds_left) => {
                self.announce(channel, RoundEvent::Milestone { seconds_left });
                TimerControl::Continue
            }
            Tick::Expired => {
                let Some(mut session) = registry.end(channel, id) else {
                    return TimerControl::Stop;
                };
                drop(registry);
                // Running inside the timer task, detach instead of aborting
                session.timer.take();

                let resolution = self.resolve_expired(session).await;
                self.announce(channel, RoundEvent::Expired(resolution));
                TimerControl::Stop
            }
        }
    }

    /// Resolves a round whose countdown ran out.
    async fn resolve_expired(&self, session: Session) -> Resolution {
        info!(
            "round {} in {} expired after {:?}",
            session.id,
            session.channel,
            session.started_at.elapsed()
        );

        match session.details {
            RoundDetails::Identity {
                original_message, ..
            } => Resolution::Identity {
                target: session.target,
                original_message,
            },
            RoundDetails::Location {
                match_id,
                place,
                guesses,
            } => {
                let mut ranking = guesses.clone();
                // Stable sort, the earliest guess wins ties
                ranking.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

                if !guesses.is_empty() {
                    self.match_log
                        .record_guesses(&match_id, &place.name, guesses)
                        .await;
                    if let Err(e) = self.match_log.persist().await {
                        error!(
                            "failed to persist guesses of match {} after round {} in {} expired: {}",
                            match_id, session.id, session.channel, e
                        );
                    }
                }

                Resolution::Location(LocationResult {
                    match_id,
                    location: place.name,
                    winner: ranking.first().cloned(),
                    ranking,
                })
            }
        }
    }

    fn announce(&self, channel: &str, event: RoundEvent) {
        let announcement = Announcement {
            channel: channel.to_string(),
            event,
        };
        if self.announcer.send(announcement).is_err() {
            warn!("announcement for {} dropped, no listener", channel);
        }
    }
}

fn validate_location_guess(session: &Session, user: &str, guess: &str) -> Result<(), GameError> {
    let budget = session.variant.attempt_budget();
    if session.attempts_of(user) >= budget {
        return Err(GameError::AttemptBudgetExceeded {
            user: user.to_string(),
            max: budget,
        });
    }
    if session.is_duplicate(user, guess) {
        return Err(GameError::DuplicateGuess(guess.to_string()));
    }
    Ok(())
}
