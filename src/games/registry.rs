use std::collections::HashMap;

use crate::games::{
    GameError,
    session::{Session, SessionId},
};

/// Occupation of a room.
#[derive(Debug)]
enum Slot {
    /// Content for the round is being fetched. The room is busy but nothing can be
    /// guessed yet.
    Starting(SessionId),
    Active(Session),
}

/// Live rounds, at most one per room.
///
/// Starting a round is two-phased: [`SessionRegistry::try_start`] reserves the room
/// before any slow I/O and [`SessionRegistry::activate`] installs the finished
/// session. Concurrent starts in the same room are rejected by the reservation.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: HashMap<String, Slot>,
    last_id: SessionId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    /// Reserves `channel` for a new round.
    ///
    /// # Returns
    ///
    /// The id the round must be activated with.
    ///
    /// # Errors
    ///
    /// [`GameError::AlreadyActive`] if the room is reserved or hosts a round.
    pub fn try_start(&mut self, channel: &str) -> Result<SessionId, GameError> {
        if self.slots.contains_key(channel) {
            return Err(GameError::AlreadyActive(channel.to_string()));
        }

        self.last_id += 1;
        self.slots
            .insert(channel.to_string(), Slot::Starting(self.last_id));
        Ok(self.last_id)
    }

    /// Turns the reservation matching `session.id` into a live round.
    ///
    /// # Errors
    ///
    /// [`GameError::NoActiveRound`] if the room holds no matching reservation.
    pub fn activate(&mut self, session: Session) -> Result<&mut Session, GameError> {
        match self.slots.get(&session.channel) {
            Some(Slot::Starting(id)) if *id == session.id => {}
            _ => return Err(GameError::NoActiveRound(session.channel)),
        }

        let channel = session.channel.clone();
        self.slots.insert(channel.clone(), Slot::Active(session));

        match self.slots.get_mut(&channel) {
            Some(Slot::Active(session)) => Ok(session),
            _ => Err(GameError::NoActiveRound(channel)),
        }
    }

    /// Drops the reservation `id` of `channel` when starting failed.
    pub fn abandon(&mut self, channel: &str, id: SessionId) {
        if matches!(self.slots.get(channel), Some(Slot::Starting(reserved)) if *reserved == id) {
            self.slots.remove(channel);
        }
    }

    /// The live round of `channel`.
    pub fn get(&self, channel: &str) -> Option<&Session> {
        match self.slots.get(channel) {
            Some(Slot::Active(session)) => Some(session),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, channel: &str) -> Option<&mut Session> {
        match self.slots.get_mut(channel) {
            Some(Slot::Active(session)) => Some(session),
            _ => None,
        }
    }

    /// Removes the live round `id` of `channel`.
    ///
    /// # Returns
    ///
    /// The ended session, or `None` if the room hosts no round or a different one.
    /// Only the first of several concurrent resolutions gets the session back.
    pub fn end(&mut self, channel: &str, id: SessionId) -> Option<Session> {
        match self.slots.get(channel) {
            Some(Slot::Active(session)) if session.id == id => {}
            _ => return None,
        }

        match self.slots.remove(channel) {
            Some(Slot::Active(session)) => Some(session),
            _ => None,
        }
    }

    /// Whether the room is reserved or hosts a round.
    pub fn is_busy(&self, channel: &str) -> bool {
        self.slots.contains_key(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::session::{IdentityMode, RoundDetails};

    const ROOM: &str = "!room:example.com";

    fn identity_session(id: SessionId, channel: &str) -> Session {
        Session::new(
            id,
            channel,
            "karl".to_string(),
            IdentityMode::Normal.time_limit(),
            RoundDetails::Identity {
                mode: IdentityMode::Normal,
                original_message: None,
            },
        )
    }

    #[test]
    fn test_try_start_rejects_busy_room() {
        let mut registry = SessionRegistry::new();

        let id = registry.try_start(ROOM).unwrap();
        assert!(registry.is_busy(ROOM));
        assert_eq!(
            registry.try_start(ROOM),
            Err(GameError::AlreadyActive(ROOM.to_string()))
        );

        registry.activate(identity_session(id, ROOM)).unwrap();
        assert_eq!(
            registry.try_start(ROOM),
            Err(GameError::AlreadyActive(ROOM.to_string()))
        );
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut registry = SessionRegistry::new();

        let first = registry.try_start(ROOM).unwrap();
        let second = registry.try_start("!other:example.com").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_starting_round_is_not_guessable() {
        let mut registry = SessionRegistry::new();

        registry.try_start(ROOM).unwrap();

        assert!(registry.get(ROOM).is_none());
        assert!(registry.get_mut(ROOM).is_none());
    }

    #[test]
    fn test_activate_requires_matching_reservation() {
        let mut registry = SessionRegistry::new();

        assert!(registry.activate(identity_session(1, ROOM)).is_err());

        let id = registry.try_start(ROOM).unwrap();
        assert!(registry.activate(identity_session(id + 1, ROOM)).is_err());

        let session = registry.activate(identity_session(id, ROOM)).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(registry.get(ROOM).map(|s| s.id), Some(id));
    }

    #[test]
    fn test_abandon_frees_room() {
        let mut registry = SessionRegistry::new();

        let id = registry.try_start(ROOM).unwrap();
        registry.abandon(ROOM, id + 1);
        assert!(registry.is_busy(ROOM));

        registry.abandon(ROOM, id);
        assert!(!registry.is_busy(ROOM));
        assert!(registry.try_start(ROOM).is_ok());
    }

    #[test]
    fn test_end_happens_once() {
        let mut registry = SessionRegistry::new();

        let id = registry.try_start(ROOM).unwrap();
        registry.activate(identity_session(id, ROOM)).unwrap();

        assert!(registry.end(ROOM, id + 1).is_none());
        assert_eq!(registry.end(ROOM, id).map(|s| s.id), Some(id));
        assert!(registry.end(ROOM, id).is_none());
        assert!(!registry.is_busy(ROOM));
    }

    #[test]
    fn test_stale_id_does_not_end_new_round() {
        let mut registry = SessionRegistry::new();

        let old = registry.try_start(ROOM).unwrap();
        registry.activate(identity_session(old, ROOM)).unwrap();
        registry.end(ROOM, old).unwrap();

        let new = registry.try_start(ROOM).unwrap();
        registry.activate(identity_session(new, ROOM)).unwrap();

        assert!(registry.end(ROOM, old).is_none());
        assert!(registry.get(ROOM).is_some());
    }
}
