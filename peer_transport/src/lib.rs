use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;
pub use webrtc::{
    ice_transport::ice_candidate::RTCIceCandidateInit,
    peer_connection::sdp::{sdp_type::RTCSdpType, session_description::RTCSessionDescription},
};
use webrtc::{
    data_channel::data_channel_state::RTCDataChannelState,
    peer_connection::peer_connection_state::RTCPeerConnectionState,
};

#[cfg(feature = "fake")]
pub mod fake;
pub mod message;
pub mod peer;

pub use peer::{Peer, PeerChannel, RtcConfig, RtcConfigBuilder, RtcFactory, DEFAULT_ICE_SERVER};

/// Label of the data channel every peer transport opens towards its client.
pub const DATA_CHANNEL_LABEL: &str = "data";

pub type Events = mpsc::UnboundedSender<PeerEvent>;

/// Something the engine noticed on its own concurrency context.
///
/// Engine callbacks only ever produce these; they are delivered to the
/// owning session, which is the only place that acts on them.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    LocalCandidate(RTCIceCandidateInit),
    StateChanged(ConnectionState),
    ChannelOpen,
    ChannelMessage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        *self == ConnectionState::Closed
    }
}

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => Self::New,
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

pub(crate) fn channel_is_open(state: RTCDataChannelState) -> bool {
    state == RTCDataChannelState::Open
}

/// Creates one peer transport per connecting client.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, events: Events) -> anyhow::Result<Arc<dyn PeerTransport>>;
}

/// Server side of the peer connection with a single browser client.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_data_channel(&self, label: &str) -> anyhow::Result<Arc<dyn DataChannel>>;

    async fn create_offer(&self) -> anyhow::Result<RTCSessionDescription>;

    async fn set_local_description(&self, description: RTCSessionDescription)
        -> anyhow::Result<()>;

    async fn set_remote_description(
        &self,
        description: RTCSessionDescription,
    ) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;

    fn connection_state(&self) -> ConnectionState;
}

#[async_trait]
pub trait DataChannel: Send + Sync {
    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> anyhow::Result<()>;
}
