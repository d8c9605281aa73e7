use std::{fmt, sync::Arc};

use dashmap::DashMap;
use getset::Getters;
use peer_transport::{DataChannel, PeerTransport};

use super::writer::OutboundWriter;
use crate::models::{DrawingPoint, PanningOffset, UserId};

#[derive(Clone, Getters)]
pub struct Session {
    #[getset(get = "pub")]
    user_id: UserId,
    #[getset(get = "pub")]
    transport: Arc<dyn PeerTransport>,
    #[getset(get = "pub")]
    channel: Arc<dyn DataChannel>,
    #[getset(get = "pub")]
    writer: OutboundWriter,
    pub panning: PanningOffset,
    pub drawings: Vec<DrawingPoint>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("panning", &self.panning)
            .field("drawings", &self.drawings.len())
            .finish()
    }
}

impl Session {
    pub fn new(
        user_id: UserId,
        transport: Arc<dyn PeerTransport>,
        channel: Arc<dyn DataChannel>,
        writer: OutboundWriter,
    ) -> Self {
        Self {
            user_id,
            transport,
            channel,
            writer,
            panning: PanningOffset::default(),
            drawings: vec![],
        }
    }

    /// Records a point drawn by this user; the point's offset becomes the
    /// user's panning.
    pub fn record(&mut self, point: DrawingPoint) {
        self.panning = point.offset();
        self.drawings.push(point);
    }
}

/// Sessions of the currently connected users.
///
/// Every call is atomic for its key, nothing more. A caller doing
/// `get` then `update` may lose a concurrent update to the same session;
/// only the owning connection writes to its session, which keeps that safe.
/// [`SessionStore::modify`] does the read-modify-write under the key's lock.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session: Session) {
        self.sessions.insert(*session.user_id(), session);
    }

    pub fn get(&self, user_id: &UserId) -> Option<Session> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    /// Overwrites the stored session. Returns `false`, storing nothing, if
    /// the session was deleted in the meantime.
    pub fn update(&self, session: Session) -> bool {
        match self.sessions.get_mut(session.user_id()) {
            Some(mut stored) => {
                *stored = session;
                true
            }
            None => false,
        }
    }

    pub fn modify<F>(&self, user_id: &UserId, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        match self.sessions.get_mut(user_id) {
            Some(mut session) => {
                f(&mut *session);
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, user_id: &UserId) -> Option<Session> {
        self.sessions.remove(user_id).map(|(_, session)| session)
    }

    /// Data channels of every session except `user_id`'s.
    pub fn channels_except(&self, user_id: &UserId) -> Vec<(UserId, Arc<dyn DataChannel>)> {
        self.sessions
            .iter()
            .filter(|entry| entry.key() != user_id)
            .map(|entry| (*entry.key(), entry.value().channel.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }
}
