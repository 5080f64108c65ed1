//! Matrix client wrapper for bot messaging and synchronization.
//!
//! This module provides a high-level [`MatrixClient`] interface that wraps the
//! Matrix SDK client and handles login, message sending and synchronization.

use anyhow::Context;
use log::{debug, error, info};
use matrix_sdk::{
    Client,
    ruma::{
        EventId, OwnedUserId, RoomId, UserId,
        events::room::message::{AddMentions, ForwardThread, ReplyMetadata, RoomMessageEventContent},
    },
};

use crate::matrix::{
    UserCredentials,
    session::SessionStore,
    sync::{IncomingMessage, MatrixSync},
};

/// Display name of the bot account.
const DISPLAY_NAME: &str = "boti";

/// High-level Matrix client for bot messaging operations.
pub struct MatrixClient {
    /// Synchronization service for handling real-time events
    matrix_sync: MatrixSync,
    /// Underlying Matrix SDK client
    client: Client,
}

impl MatrixClient {
    /// Logs in, or restores the session found in `session_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user id is invalid
    /// - The state store can't be opened
    /// - Login or session restoration fails
    pub async fn new(
        user_credentials: &UserCredentials,
        session_path: &str,
    ) -> Result<Self, anyhow::Error> {
        let session = SessionStore::open(session_path).await;

        let client = if session.has_session() {
            restore_session(user_credentials, &session).await?
        } else {
            login(user_credentials, &session).await?
        };

        client
            .account()
            .set_display_name(Some(DISPLAY_NAME))
            .await?;

        let matrix_sync = MatrixSync::new(&client, &session);

        Ok(MatrixClient {
            matrix_sync,
            client,
        })
    }

    /// Starts the Matrix synchronization loop, calling `on_message` for each text
    /// message of a joined room.
    ///
    /// Never returns under normal operation.
    pub async fn sync<F>(&self, on_message: F)
    where
        F: Fn(IncomingMessage) + Send + Sync + 'static,
    {
        match self.matrix_sync.sync(on_message).await {
            Ok(_) => info!("matrix sync ended successfully"),
            Err(e) => error!("matrix sync ended with error: {:?}", e),
        }
    }

    /// Sends a markdown message to a room.
    pub async fn send_message(&self, room_id: &str, body: &str) {
        self.send(room_id, RoomMessageEventContent::text_markdown(body))
            .await;
    }

    /// Sends a markdown reply to the message `event_id` of `sender_id`.
    pub async fn send_reply(&self, room_id: &str, sender_id: &str, event_id: &str, body: &str) {
        let (sender, event) = match (UserId::parse(sender_id), EventId::parse(event_id)) {
            (Ok(sender), Ok(event)) => (sender, event),
            _ => {
                error!("can't reply to {} from {}", event_id, sender_id);
                return;
            }
        };

        let content = RoomMessageEventContent::text_markdown(body).make_reply_to(
            ReplyMetadata::new(&event, &sender, None),
            ForwardThread::No,
            AddMentions::No,
        );

        self.send(room_id, content).await;
    }

    async fn send(&self, room_id: &str, content: RoomMessageEventContent) {
        let room_id = match RoomId::parse(room_id) {
            Ok(room_id) => room_id,
            Err(e) => {
                error!("invalid room id {}: {:?}", room_id, e);
                return;
            }
        };

        let Some(room) = self.client.get_room(&room_id) else {
            error!("room {} is not known", room_id);
            return;
        };
        if let Err(e) = room.send(content).await {
            error!("Failed to send message: {:?}", e);
        }
    }
}

async fn build_client(
    user_credentials: &UserCredentials,
    session: &SessionStore,
) -> Result<Client, anyhow::Error> {
    let user_id: OwnedUserId = user_credentials.user_id.clone().try_into()?;
    let client = Client::builder()
        .server_name(user_id.server_name())
        .sqlite_store(session.sqlite_path(), Some(&user_credentials.passphrase))
        .build()
        .await?;

    Ok(client)
}

/// Logs in with the password and persists the new session.
async fn login(
    user_credentials: &UserCredentials,
    session: &SessionStore,
) -> Result<Client, anyhow::Error> {
    info!("logging in as {}", user_credentials.user_id);

    let client = build_client(user_credentials, session).await?;
    client
        .matrix_auth()
        .login_username(&user_credentials.user_id, &user_credentials.password)
        .initial_device_display_name("boti bot")
        .send()
        .await?;
    debug!("logged in");

    let user_session = client
        .matrix_auth()
        .session()
        .context("no session after login")?;
    session
        .persist_user_session(&user_session)
        .await
        .context("error persisting user session")?;

    info!("matrix login complete");
    Ok(client)
}

/// Restores the session persisted by a previous login.
async fn restore_session(
    user_credentials: &UserCredentials,
    session: &SessionStore,
) -> Result<Client, anyhow::Error> {
    info!("restoring matrix session from disk");

    let user_session = session
        .user_session()
        .context("no session to restore")?
        .clone();

    let client = build_client(user_credentials, session).await?;
    client.restore_session(user_session).await?;

    info!("matrix session restored successfully");
    Ok(client)
}
