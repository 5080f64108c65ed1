//! The who-said-this game.
//!
//! A random message is pulled from the chat log of the room and shown without its
//! author. Players have three shared guesses to name the author.

use std::collections::HashMap;

use log::{debug, info, warn};
use mockall::automock;
use reqwest::Client;
use time::{PrimitiveDateTime, macros::format_description};

use crate::games::{
    GameError,
    engine::{GuessOutcome, RoundEngine},
    session::{IdentityMode, Variant},
};

/// Number of log lines fetched before giving up on a round.
const FETCH_ATTEMPTS: u32 = 3;

/// Replacement for the author name in prompts.
const HIDDEN_AUTHOR: &str = "x";

/// What a round is about.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundContent {
    /// Expected answer
    pub target: String,
    /// Text shown to players
    pub prompt: String,
    /// Text revealed at the end of the round
    pub auxiliary: Option<String>,
}

/// Provider of random chat messages.
#[automock]
pub trait MessageSource {
    /// Fetches a random message from the log of `log_channel` and turns it into a
    /// round of the given mode.
    async fn fetch(&self, log_channel: &str, mode: IdentityMode)
    -> Result<RoundContent, GameError>;
}

/// Client of a chat log service.
///
/// The service answers `GET {url}/channel/{channel}/random` with a single plain
/// text line:
///
/// ```text
/// [2024-02-01 13:37:00] #channel karl: hello there
/// ```
pub struct LogsRequester {
    /// Base url of the log service
    url: String,
    /// Lowercased authors whose messages are never used, typically bots
    ignored_authors: Vec<String>,
    client: Client,
}

impl LogsRequester {
    pub fn new(url: &str, ignored_authors: &[String]) -> Self {
        LogsRequester {
            url: url.trim_end_matches('/').to_string(),
            ignored_authors: ignored_authors.iter().map(|a| a.to_lowercase()).collect(),
            client: Client::new(),
        }
    }

    async fn request_random_line(&self, log_channel: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/channel/{}/random", self.url, log_channel);
        debug!("request {}", url);

        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Whether the line can't be used as a round.
    ///
    /// Lines by ignored authors, moderation notices and bot commands are skipped.
    fn is_ignored(&self, line: &LogLine) -> bool {
        self.ignored_authors.contains(&line.author.to_lowercase())
            || line.message.contains(" has been")
            || line.message.starts_with('!')
            || line.message.starts_with('+')
    }
}

impl MessageSource for LogsRequester {
    async fn fetch(
        &self,
        log_channel: &str,
        mode: IdentityMode,
    ) -> Result<RoundContent, GameError> {
        info!("fetch random message of {}", log_channel);

        for attempt in 1..=FETCH_ATTEMPTS {
            let raw = match self.request_random_line(log_channel).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        "attempt {}/{} to fetch a message failed: {}",
                        attempt, FETCH_ATTEMPTS, e
                    );
                    continue;
                }
            };

            let Some(line) = LogLine::parse(raw.trim()) else {
                warn!("unexpected log line format: {}", raw);
                continue;
            };

            if self.is_ignored(&line) {
                debug!("skip message by {}", line.author);
                continue;
            }

            return Ok(line.into_content(mode));
        }

        Err(GameError::ContentUnavailable(log_channel.to_string()))
    }
}

/// A parsed chat log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: String,
    pub author: String,
    pub message: String,
}

impl LogLine {
    /// Parses `[timestamp] #channel author: message`.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (timestamp, rest) = rest.split_once("] ")?;
        let rest = rest.strip_prefix('#')?;
        let (_, rest) = rest.split_once(' ')?;
        let (author, message) = rest.split_once(": ")?;

        if author.is_empty() || author.contains(char::is_whitespace) || message.is_empty() {
            return None;
        }

        Some(LogLine {
            timestamp: timestamp.to_string(),
            author: author.to_string(),
            message: message.to_string(),
        })
    }

    fn into_content(self, mode: IdentityMode) -> RoundContent {
        let when = format_timestamp(&self.timestamp);

        match mode {
            IdentityMode::Normal => RoundContent {
                prompt: format!("{} | {}: {}", when, HIDDEN_AUTHOR, self.message),
                target: self.author,
                auxiliary: None,
            },
            IdentityMode::Story => RoundContent {
                prompt: format!("{} | {}", when, redact_author(&self.message, &self.author)),
                target: self.author,
                auxiliary: Some(self.message),
            },
        }
    }
}

/// Formats a `YYYY-MM-DD HH:MM:SS` log timestamp as `DD.MM.YYYY, HH:MM`.
///
/// Timestamps in any other format are returned unchanged.
fn format_timestamp(raw: &str) -> String {
    let input = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let output = format_description!("[day].[month].[year], [hour]:[minute]");

    PrimitiveDateTime::parse(raw, &input)
        .ok()
        .and_then(|datetime| datetime.format(&output).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Replaces the words of `message` naming `author` (or `@author`).
fn redact_author(message: &str, author: &str) -> String {
    let author = author.to_lowercase();

    message
        .split_whitespace()
        .map(|word| {
            let bare = word
                .trim_start_matches('@')
                .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
            if bare.to_lowercase() == author {
                HIDDEN_AUTHOR
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A started identity round, as shown to the room.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityStart {
    pub mode: IdentityMode,
    pub prompt: String,
    pub attempt_budget: u32,
    pub time_limit_secs: u64,
}

/// The who-said-this game of every room.
pub struct WhoSaidGame<S: MessageSource> {
    engine: RoundEngine,
    source: S,
    /// Room id to chat log channel
    log_channels: HashMap<String, String>,
}

impl<S: MessageSource> WhoSaidGame<S> {
    pub fn new(engine: RoundEngine, source: S, log_channels: HashMap<String, String>) -> Self {
        WhoSaidGame {
            engine,
            source,
            log_channels,
        }
    }

    /// Starts a round in `channel`.
    ///
    /// The room is reserved before the message is fetched, so a second start while
    /// loading is rejected. The reservation is released if no message could be
    /// fetched.
    ///
    /// # Errors
    ///
    /// - [`GameError::LogChannelMissing`] if the room has no log configured
    /// - [`GameError::AlreadyActive`] if the room is busy
    /// - [`GameError::ContentUnavailable`] if fetching the message failed
    pub async fn start(&self, channel: &str, mode: IdentityMode) -> Result<IdentityStart, GameError> {
        let log_channel = self
            .log_channels
            .get(channel)
            .ok_or_else(|| GameError::LogChannelMissing(channel.to_string()))?;

        let id = self.engine.reserve(channel).await?;

        let content = match self.source.fetch(log_channel, mode).await {
            Ok(content) => content,
            Err(e) => {
                self.engine.abandon(channel, id).await;
                return Err(e);
            }
        };

        let prompt = content.prompt.clone();
        self.engine
            .activate_identity(channel, id, content, mode)
            .await?;

        Ok(IdentityStart {
            mode,
            prompt,
            attempt_budget: Variant::Identity.attempt_budget(),
            time_limit_secs: mode.time_limit().as_secs(),
        })
    }

    /// Submits `user`'s guess of the author.
    pub async fn guess(
        &self,
        channel: &str,
        user: &str,
        raw_guess: &str,
    ) -> Result<GuessOutcome, GameError> {
        self.engine
            .submit_identity_guess(channel, user, raw_guess)
            .await
    }
}
