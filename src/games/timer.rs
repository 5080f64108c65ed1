//! Round countdowns.
//!
//! A [`Countdown`] is plain state owned by the session. [`arm`] spawns the task
//! that drives it, calling back into the engine once per second until told to stop.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

/// Remaining seconds at which the room is reminded of the deadline.
pub const MILESTONES: [u64; 2] = [60, 30];

/// Ceiling applied to the remaining time by each location guess.
pub const GUESS_CLAMP_SECS: u64 = 30;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Result of advancing a countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    /// The remaining time just reached one of the [`MILESTONES`].
    Milestone(u64),
    Expired,
}

/// Whether the timer task keeps going after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// Seconds left in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
}

impl Countdown {
    pub fn new(limit: Duration) -> Self {
        Countdown {
            remaining: limit.as_secs(),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) -> Tick {
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 {
            Tick::Expired
        } else if MILESTONES.contains(&self.remaining) {
            Tick::Milestone(self.remaining)
        } else {
            Tick::Running(self.remaining)
        }
    }

    /// Lowers the remaining time to `ceiling` seconds.
    ///
    /// # Returns
    ///
    /// `true` if the remaining time was above `ceiling` and got lowered.
    pub fn clamp(&mut self, ceiling: u64) -> bool {
        if self.remaining > ceiling {
            self.remaining = ceiling;
            true
        } else {
            false
        }
    }
}

/// Spawns a task calling `on_tick` every second until it returns
/// [`TimerControl::Stop`].
///
/// The first call happens one second after arming. Aborting the returned handle
/// cancels the countdown.
pub fn arm<F, Fut>(mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TimerControl> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if on_tick().await == TimerControl::Stop {
                break;
            }
        }
    })
}
