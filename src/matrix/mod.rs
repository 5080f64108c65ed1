//! Matrix protocol integration for the bot.
//!
//! This module provides the Matrix client of the bot with support for:
//! - Login and session persistence
//! - Real-time event synchronization
//! - Message sending and replies
//!
//! # Architecture
//!
//! The module is structured around the [`client::MatrixClient`] which coordinates:
//! - **Session**: Login session and sync token files via the session submodule
//! - **Sync**: Real-time event handling and room synchronization via the sync submodule

mod client;
mod session;
mod sync;

pub use crate::matrix::{client::MatrixClient, sync::IncomingMessage};

/// User credentials for a Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
    /// Passphrase of the local state store
    pub passphrase: String,
}
