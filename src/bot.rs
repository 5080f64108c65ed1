//! Bot module wiring the Matrix client to the games.
//!
//! # Architecture
//!
//! The bot runs three concurrent tasks:
//!
//! 1. **Matrix Sync Task**: Continuously listens for Matrix messages, parses user
//!    commands, runs them against the games and replies in the room.
//! 2. **Announcement Task**: Forwards the events of running rounds (countdown
//!    reminders, timeouts) to their rooms.
//! 3. **Persistence Task**: Periodically saves the game stores to disk.
//!
//! # Command Processing Flow
//!
//! ```text
//! Matrix Message → Parse Command → Run on GameHub → Send Reply
//! ```

use std::sync::Arc;

use log::{debug, info};
use tokio::{fs, sync::mpsc::UnboundedReceiver};

use crate::{
    commands::{CommandContext, CommandParseError, Commander},
    config::Config,
    games::{Announcement, GameHub, LogsRequester, OpenCageGeocoder},
    matrix::{IncomingMessage, MatrixClient, UserCredentials},
    utils::get_path,
};

/// Games backed by the HTTP collaborators.
type Games = GameHub<LogsRequester, OpenCageGeocoder>;

/// Main bot structure running the games in Matrix rooms.
pub struct Bot {
    /// Matrix client for receiving commands and sending responses
    matrix_client: Arc<MatrixClient>,

    /// All games, shared by the message handlers
    games: Arc<Games>,

    /// Events of running rounds, to forward to their rooms
    announcements: UnboundedReceiver<Announcement>,

    /// Command parser and executor. Stateless and can be safely shared.
    commander: Arc<Commander>,
}

impl Bot {
    /// Creates the bot: logs in to Matrix and loads the game stores.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration loaded from file
    /// * `data_path` - Directory holding the Matrix session and the game stores
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The session directory can't be created
    /// - Matrix login fails (invalid credentials, network issues)
    /// - Session restoration fails
    pub async fn new(config: Config, data_path: &str) -> Result<Self, anyhow::Error> {
        let session_path = get_path(data_path, "session");
        fs::create_dir_all(&session_path).await?;

        let matrix_client = Arc::new(
            MatrixClient::new(
                &UserCredentials {
                    user_id: config.matrix.user_id,
                    password: config.matrix.password,
                    passphrase: config.matrix.passphrase,
                },
                &session_path,
            )
            .await?,
        );

        let source = LogsRequester::new(&config.games.logs_url, &config.games.ignored_authors);
        let geocoder = OpenCageGeocoder::new(
            &config.games.geocoder.url,
            &config.games.geocoder.api_key,
        );
        let (games, announcements) =
            GameHub::new(data_path, source, geocoder, config.games.log_channels).await;

        Ok(Bot {
            matrix_client,
            games: Arc::new(games),
            announcements,
            commander: Arc::new(Commander::new()),
        })
    }

    /// Starts the bot. Runs until the process is terminated.
    pub async fn start(self) {
        self.games.start_persistence_task();

        Self::start_announcement_task(Arc::clone(&self.matrix_client), self.announcements);

        let matrix_client = Arc::clone(&self.matrix_client);
        let games = Arc::clone(&self.games);
        let commander = Arc::clone(&self.commander);

        let on_message = move |message: IncomingMessage| {
            Self::handle_matrix_message(
                message,
                Arc::clone(&matrix_client),
                Arc::clone(&games),
                Arc::clone(&commander),
            )
        };

        self.matrix_client.sync(on_message).await;
    }

    /// Forwards round events to their rooms as they arrive.
    fn start_announcement_task(
        matrix_client: Arc<MatrixClient>,
        mut announcements: UnboundedReceiver<Announcement>,
    ) {
        tokio::spawn(async move {
            while let Some(Announcement { channel, event }) = announcements.recv().await {
                debug!("announcing {:?} in {}", event, channel);
                matrix_client
                    .send_message(&channel, &Commander::get_announcement_message(&event))
                    .await;
            }
            info!("announcement channel closed");
        });
    }

    /// Runs the command of a message, if any, and replies in its room.
    ///
    /// Each message is handled in its own task so a slow command (fetching a
    /// message, geocoding) doesn't hold up the sync loop.
    fn handle_matrix_message(
        message: IncomingMessage,
        matrix_client: Arc<MatrixClient>,
        games: Arc<Games>,
        commander: Arc<Commander>,
    ) {
        tokio::spawn(async move {
            let IncomingMessage {
                body,
                room_id,
                sender_id,
                event_id,
            } = message;

            let command = match commander.parse(&body) {
                Ok(command) => command,
                // Return silently if the command is not for the bot
                Err(CommandParseError::NotForBot) => return,
                // Send error message if the command is invalid
                Err(CommandParseError::InvalidCommand(message)) => {
                    matrix_client
                        .send_reply(&room_id, &sender_id, &event_id, &message)
                        .await;
                    return;
                }
            };

            let context = CommandContext {
                room_id: room_id.clone(),
                user_id: sender_id.clone(),
            };
            let result = commander.parse_command(&command, &context, &games).await;

            matrix_client
                .send_reply(&room_id, &sender_id, &event_id, &result.response)
                .await;
        });
    }
}
