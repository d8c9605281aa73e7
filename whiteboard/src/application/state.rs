use std::sync::Arc;

use peer_transport::TransportFactory;

use super::{
    broadcast::BroadcastRouter, drawings::DrawingStore, registry::ConnectionRegistry,
    sessions::SessionStore,
};

/// Everything the sessions share. Built once when the server starts and
/// handed to every connection.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub drawings: Arc<DrawingStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcast: BroadcastRouter,
    pub transports: Arc<dyn TransportFactory>,
}

impl AppState {
    pub fn new(transports: Arc<dyn TransportFactory>) -> Self {
        let sessions = Arc::new(SessionStore::new());
        Self {
            broadcast: BroadcastRouter::new(sessions.clone()),
            sessions,
            drawings: Arc::new(DrawingStore::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            transports,
        }
    }
}
