//! Command action handlers.
//!
//! Individual handler functions for each bot command. Each handler receives a
//! [`CommandContext`](crate::commands::CommandContext) and the games, runs the
//! command and returns a [`CommandResult`](crate::commands::CommandResult).
//!
//! # Available Handlers
//!
//! - [`handle_help`] - Display help information
//! - [`handle_who_said`] - Start, guess and rank the who-said-this game
//! - [`handle_geo`] - Play the location game and manage its catalog
//! - [`handle_koler`] - Play a pressure turn

mod geo;
mod help;
mod koler;
mod who_said;

pub use crate::commands::actions::{
    geo::handle_geo, help::handle_help, koler::handle_koler, who_said::handle_who_said,
};

#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;

    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::{
        commands::CommandContext,
        games::{Announcement, GameHub, MockGeocoder, MockMessageSource},
    };

    pub const ROOM: &str = "!room:example.com";

    pub fn create_test_context(user_id: &str) -> CommandContext {
        CommandContext {
            room_id: ROOM.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Games backed by a temporary data directory, with the log of [`ROOM`] set up.
    pub async fn create_test_hub(
        dir: &TempDir,
        source: MockMessageSource,
        geocoder: MockGeocoder,
    ) -> (
        GameHub<MockMessageSource, MockGeocoder>,
        UnboundedReceiver<Announcement>,
    ) {
        let mut log_channels = HashMap::new();
        log_channels.insert(ROOM.to_string(), "forsen".to_string());

        GameHub::new(dir.path().to_str().unwrap(), source, geocoder, log_channels).await
    }
}
