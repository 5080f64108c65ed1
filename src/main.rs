//! boti - A Matrix bot running guessing mini-games in chat rooms.
//!
//! # Overview
//!
//! boti hosts three games in the Matrix rooms it is invited to:
//!
//! - **Who said this**: guess the author of a random message taken from the chat
//!   log of the room, in normal or story mode, with a persistent leaderboard
//! - **Geo**: guess where a picture was taken, the closest guess wins
//! - **Koler**: take turns pumping a balloon until it bursts
//!
//! Each room runs at most one timed round at a time. Rounds end on a correct
//! guess, when the guesses run out, or when the countdown reaches zero.
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings (see [`config`] for every key):
//!
//! ```yaml
//! matrix:
//!   user_id: "@boti:matrix.org"
//!   password: "your-password"
//!   passphrase: "your-store-passphrase"
//!
//! games:
//!   log_channels:
//!     "!abc:matrix.org": "forsen"
//!   geocoder:
//!     api_key: "your-opencage-key"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Override any configuration value using environment variables with the `BOTI_` prefix:
//!
//! ```bash
//! export BOTI_MATRIX__PASSWORD="your-password"
//! export BOTI_GAMES__GEOCODER__API_KEY="your-opencage-key"
//! ```
//!
//! # Usage
//!
//! ```bash
//! boti --config config.yaml --data ./boti-data
//! ```
//!
//! # Bot Commands
//!
//! - `!boti help` - Display help information
//! - `!boti ws [story]` - Start a who-said-this round
//! - `!boti ws <user>` - Guess the author
//! - `!boti ws lb [normal|story]` - Show the leaderboard
//! - `!boti geo play` - Start a location round
//! - `!boti gg <location>` - Guess the location
//! - `!boti geo logs [match_id]` - Show past matches
//! - `!boti geo add <image_url> <location>` / `!boti geo remove <image_url>` - Manage locations
//! - `!boti koler` - Play a pressure turn
//!
//! # Architecture
//!
//! - [`bot`] - Wiring of the Matrix client, the commands and the games
//! - [`commands`] - Command parsing, execution and response formatting
//! - [`config`] - YAML configuration with environment variable overrides
//! - [`games`] - Round engine, games and their stores
//! - [`matrix`] - Matrix client integration and session management
//! - [`utils`] - Utility functions for path handling
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bot::Bot, config::Config};

mod bot;
mod commands;
mod config;
mod games;
mod matrix;
mod utils;

/// Command-line arguments for the bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain:
    /// - `session/` - Matrix session data (authentication tokens, state store)
    /// - `leaderboard`, `matches`, `locations`, `pressure` - JSON game stores
    ///
    /// The session holds the bot's access token, keep the directory private.
    #[arg(short, long)]
    data: String,
}

#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting boti {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            return;
        }
    };

    // Normalize service URLs by removing trailing slashes
    for url in [&mut config.games.logs_url, &mut config.games.geocoder.url] {
        while url.ends_with('/') {
            url.pop();
        }
    }

    let bot = match Bot::new(config, &args.data).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to initialize bot: {}", e);
            return;
        }
    };
    bot.start().await;
}
