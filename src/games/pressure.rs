//! The koler game.
//!
//! Players take turns pumping up a shared balloon. Pressure rises with every round
//! and past the halfway mark each turn risks a burst, which resets the room to the
//! first round. Nobody may take two turns in a row.

use std::collections::HashMap;

use log::{error, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::games::{GameError, store::JsonFile};

const MAX_PRESSURE: f64 = 100.0;
const PRESSURE_SCALE: f64 = 0.1;
/// Pressure from which the burst chance starts growing.
const RISING_THRESHOLD: u32 = 50;
const CHANCE_MULTIPLIER: f64 = 0.5;
/// Burst chance in percent below the threshold.
const BASE_ODDS: u32 = 1;

/// Pressure in percent reached in `round`.
pub fn pressure_for_round(round: u32) -> u32 {
    (MAX_PRESSURE * (1.0 - (-PRESSURE_SCALE * round as f64).exp())).floor() as u32
}

/// Chance in percent that a turn at `pressure` bursts.
pub fn burst_odds(pressure: u32) -> u32 {
    if pressure >= RISING_THRESHOLD {
        ((pressure - RISING_THRESHOLD) as f64 * CHANCE_MULTIPLIER).floor() as u32
    } else {
        BASE_ODDS
    }
}

/// Progress of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureProgress {
    /// Round of the next turn
    pub round: u32,
    /// Pressure of the last turn
    pub pressure: u32,
    /// Player of the last turn
    pub last_username: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressureOutcome {
    /// The balloon burst, the room starts over.
    Burst { pressure: u32, odds: u32 },
    /// The balloon held.
    Holding {
        pressure: u32,
        odds: u32,
        next_round: u32,
    },
}

pub struct PressureGame {
    progress: Mutex<HashMap<String, PressureProgress>>,
    file: JsonFile,
}

impl PressureGame {
    pub async fn new(path: String) -> Self {
        let file = JsonFile::new(path);
        let progress = file.load().await;

        PressureGame {
            progress: Mutex::new(progress),
            file,
        }
    }

    /// Plays `user`'s turn in `channel`.
    ///
    /// # Errors
    ///
    /// [`GameError::SamePlayer`] if `user` played the previous turn.
    pub async fn play(&self, channel: &str, user: &str) -> Result<PressureOutcome, GameError> {
        let roll: f64 = rand::rng().random();
        self.play_with_roll(channel, user, roll).await
    }

    /// Plays a turn with a given roll in `[0, 1)`. The turn bursts when the roll is
    /// below the burst odds.
    pub async fn play_with_roll(
        &self,
        channel: &str,
        user: &str,
        roll: f64,
    ) -> Result<PressureOutcome, GameError> {
        let outcome = {
            let mut progress = self.progress.lock().await;

            let round = match progress.get(channel) {
                Some(last) if last.last_username == user => {
                    return Err(GameError::SamePlayer(user.to_string()));
                }
                Some(last) => last.round,
                None => 1,
            };

            let pressure = pressure_for_round(round);
            let odds = burst_odds(pressure);
            let burst = roll < odds as f64 / 100.0;
            let next_round = if burst { 1 } else { round + 1 };

            progress.insert(
                channel.to_string(),
                PressureProgress {
                    round: next_round,
                    pressure,
                    last_username: user.to_string(),
                },
            );

            if burst {
                info!("{} burst the balloon in {} at {}%", user, channel, pressure);
                PressureOutcome::Burst { pressure, odds }
            } else {
                PressureOutcome::Holding {
                    pressure,
                    odds,
                    next_round,
                }
            }
        };

        if let Err(e) = self.persist().await {
            error!("failed to persist pressure progress: {}", e);
        }

        Ok(outcome)
    }

    pub async fn persist(&self) -> Result<(), GameError> {
        let progress = self.progress.lock().await;
        self.file.persist(&*progress).await
    }
}
