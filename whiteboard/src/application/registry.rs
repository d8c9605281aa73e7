use std::{fmt, sync::Arc};

use peer_transport::{
    message::{Envelope, Event},
    PeerTransport,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{error::Error, writer::OutboundWriter};
use crate::models::UserId;

#[derive(Clone)]
pub struct ConnectionEntry {
    pub user_id: UserId,
    pub transport: Arc<dyn PeerTransport>,
    pub writer: OutboundWriter,
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("user_id", &self.user_id)
            .field("state", &self.transport.connection_state())
            .finish()
    }
}

impl ConnectionEntry {
    pub fn new(user_id: UserId, transport: Arc<dyn PeerTransport>, writer: OutboundWriter) -> Self {
        Self {
            user_id,
            transport,
            writer,
        }
    }

    /// Creates a fresh offer, makes it the local description and pushes it
    /// to the client.
    async fn offer(&self) -> Result<(), Error> {
        let offer = self.transport.create_offer().await?;
        self.transport.set_local_description(offer.clone()).await?;
        let envelope = Envelope::with_payload(Event::Offer, &offer)?;
        self.writer.write(envelope)?;
        Ok(())
    }
}

/// Outcome of one renegotiation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Renegotiation {
    pub offered: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// The live peer connections, at most one per user.
///
/// A single lock covers every add, remove and renegotiation pass, so an
/// iteration never observes a concurrent removal.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Vec<ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entry`, replacing a previous entry of the same user.
    pub async fn add(&self, entry: ConnectionEntry) {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.user_id == entry.user_id) {
            warn!(user_id = %entry.user_id, "Replacing registered connection");
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub async fn remove(&self, user_id: &UserId) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.user_id != *user_id);
        before != entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn user_ids(&self) -> Vec<UserId> {
        self.entries.lock().await.iter().map(|e| e.user_id).collect()
    }

    /// Sends every live connection a brand new offer and drops the ones
    /// whose transport is closed. A failing connection is skipped; the rest
    /// still get their offer.
    pub async fn renegotiate(&self) -> Renegotiation {
        let mut entries = self.entries.lock().await;
        let mut report = Renegotiation::default();
        let mut live = Vec::with_capacity(entries.len());

        for entry in std::mem::take(&mut *entries) {
            if entry.transport.connection_state().is_closed() {
                debug!(user_id = %entry.user_id, "Dropping closed connection");
                report.pruned += 1;
                continue;
            }
            match entry.offer().await {
                Ok(()) => report.offered += 1,
                Err(e) => {
                    warn!(user_id = %entry.user_id, ?e, "Could not renegotiate");
                    report.failed += 1;
                }
            }
            live.push(entry);
        }
        *entries = live;

        info!(
            offered = report.offered,
            failed = report.failed,
            pruned = report.pruned,
            "Renegotiated"
        );
        report
    }

    pub async fn connect(&self, entry: ConnectionEntry) -> Renegotiation {
        self.add(entry).await;
        self.renegotiate().await
    }

    pub async fn disconnect(&self, user_id: &UserId) -> Renegotiation {
        self.remove(user_id).await;
        self.renegotiate().await
    }
}
