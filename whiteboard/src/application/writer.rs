use std::{fmt, sync::Arc};

use actix::prelude::*;
use peer_transport::message::Envelope;

/// An envelope to be written to the client's signaling socket.
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Outbound(pub Envelope);

#[derive(Debug, thiserror::Error)]
#[error("Signaling connection is gone")]
pub struct SendError;

/// Ordered, exclusive write access to one client's socket.
pub trait SignalSink: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<(), SendError>;
}

/// Writes go through the session actor's mailbox, so the actor is the only
/// one ever touching the socket and frames can't interleave.
impl SignalSink for Recipient<Outbound> {
    fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        if !self.connected() {
            return Err(SendError);
        }
        self.do_send(Outbound(envelope));
        Ok(())
    }
}

#[derive(Clone)]
pub struct OutboundWriter {
    sink: Arc<dyn SignalSink>,
}

impl fmt::Debug for OutboundWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundWriter").finish_non_exhaustive()
    }
}

impl OutboundWriter {
    pub fn new<S: SignalSink + 'static>(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn from_sink(sink: Arc<dyn SignalSink>) -> Self {
        Self { sink }
    }

    pub fn write(&self, envelope: Envelope) -> Result<(), SendError> {
        self.sink.send(envelope)
    }
}
