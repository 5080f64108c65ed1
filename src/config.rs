//! Configuration file structures for the boti bot.
//!
//! The configuration is a YAML file with two sections: the Matrix account of the
//! bot and the settings of the games. Any value can be overridden with an
//! environment variable prefixed with `BOTI_`, nested keys being separated by `__`.
//!
//! # Configuration File Format
//!
//! ```yaml
//! matrix:
//!   user_id: "@boti:matrix.org"
//!   password: "secret-password"
//!   # Passphrase of the local state store
//!   passphrase: "store-passphrase"
//!
//! games:
//!   # Chat log service queried by the who-said game
//!   logs_url: "https://logs.ivr.fi"
//!   # Room id to log channel, rooms without an entry can't play who-said
//!   log_channels:
//!     "!abc:matrix.org": "forsen"
//!   ignored_authors: ["supibot", "fossabot"]
//!   geocoder:
//!     url: "https://api.opencagedata.com"
//!     api_key: "your-opencage-key"
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export BOTI_MATRIX__PASSWORD="secret-from-env"
//! export BOTI_GAMES__GEOCODER__API_KEY="key-from-env"
//! ```

use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

/// Prefix of the environment variables overriding the file.
const ENV_PREFIX: &str = "BOTI_";

/// Root configuration structure for the bot.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    /// Games configuration
    pub games: Games,
}

impl Config {
    /// Loads the configuration from the YAML file at `path`, with environment
    /// variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or a required value is missing
    /// from both the file and the environment.
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}

/// Matrix account configuration.
///
/// ```yaml
/// matrix:
///   user_id: "@boti:matrix.org"
///   password: "your-password"
///   passphrase: "your-store-passphrase"
/// ```
#[derive(Debug, Deserialize)]
pub struct Matrix {
    /// Fully qualified Matrix user ID, `@username:homeserver.com`.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Used for the first login only. The session is then persisted and restored.
    pub password: String,

    /// Passphrase protecting the SQLite state store.
    pub passphrase: String,
}

/// Games configuration.
#[derive(Debug, Deserialize)]
pub struct Games {
    /// Base URL of the chat log service.
    #[serde(default = "default_logs_url")]
    pub logs_url: String,

    /// Log channel of each room, keyed by room id.
    #[serde(default)]
    pub log_channels: HashMap<String, String>,

    /// Authors whose messages are never picked, typically other bots.
    #[serde(default = "default_ignored_authors")]
    pub ignored_authors: Vec<String>,

    pub geocoder: Geocoder,
}

/// Geocoding service of the location game.
#[derive(Debug, Deserialize)]
pub struct Geocoder {
    #[serde(default = "default_geocoder_url")]
    pub url: String,
    pub api_key: String,
}

fn default_logs_url() -> String {
    "https://logs.ivr.fi".to_string()
}

fn default_ignored_authors() -> Vec<String> {
    vec!["supibot".to_string(), "fossabot".to_string()]
}

fn default_geocoder_url() -> String {
    "https://api.opencagedata.com".to_string()
}
