use std::sync::Arc;

use peer_transport::message::{Envelope, Event};
use tracing::{debug, warn};

use super::{error::Error, sessions::SessionStore};
use crate::models::{DrawingPoint, UserId};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub not_open: usize,
    pub failed: usize,
}

/// Fans drawing updates out to the data channels of every other session.
#[derive(Clone)]
pub struct BroadcastRouter {
    sessions: Arc<SessionStore>,
}

impl BroadcastRouter {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }

    /// Best effort: a recipient that fails is logged and skipped, nothing is
    /// retried.
    pub async fn broadcast(&self, sender: UserId, point: DrawingPoint) -> Result<Delivery, Error> {
        let text = Envelope::with_payload(Event::Drawing, &point)?.to_json()?;
        let mut delivery = Delivery::default();

        for (user_id, channel) in self.sessions.channels_except(&sender) {
            if !channel.is_open() {
                delivery.not_open += 1;
                continue;
            }
            match channel.send_text(text.clone()).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(from = %sender, to = %user_id, ?e, "Could not forward drawing");
                    delivery.failed += 1;
                }
            }
        }
        debug!(from = %sender, ?delivery, "Broadcast drawing");
        Ok(delivery)
    }
}
