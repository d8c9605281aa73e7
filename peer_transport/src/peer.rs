use std::sync::Arc;

use async_trait::async_trait;
use getset::Getters;
use tracing::{debug, info, warn};
use webrtc::{
    api::{
        interceptor_registry::register_default_interceptors, media_engine::MediaEngine, APIBuilder,
    },
    data_channel::{data_channel_message::DataChannelMessage, RTCDataChannel},
    ice_transport::ice_candidate::RTCIceCandidate,
    interceptor::registry::Registry,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        RTCPeerConnection,
    },
};

use crate::{
    channel_is_open, ConnectionState, DataChannel, Events, PeerEvent, PeerTransport,
    RTCIceCandidateInit, RTCSessionDescription, TransportFactory,
};

mod rtc_config;
pub use rtc_config::{RtcConfig, RtcConfigBuilder, DEFAULT_ICE_SERVER};

/// Builds [`Peer`]s from a shared [`RtcConfig`].
#[derive(Debug, Default)]
pub struct RtcFactory {
    config: RtcConfig,
}

impl RtcFactory {
    pub fn new(config: RtcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcFactory {
    async fn create(&self, events: Events) -> anyhow::Result<Arc<dyn PeerTransport>> {
        let peer = Peer::new(&self.config, events).await?;
        Ok(Arc::new(peer))
    }
}

#[derive(Getters)]
pub struct Peer {
    #[getset(get = "pub")]
    connection: Arc<RTCPeerConnection>,
    events: Events,
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("state", &self.connection.connection_state())
            .finish()
    }
}

impl Peer {
    pub async fn new(config: &RtcConfig, events: Events) -> anyhow::Result<Self> {
        let connection = Self::create_peer_connection(config, events.clone()).await?;
        let peer = Self { connection, events };
        peer.ice_candidates().await;
        Ok(peer)
    }

    async fn create_peer_connection(
        config: &RtcConfig,
        events: Events,
    ) -> anyhow::Result<Arc<RTCPeerConnection>> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();
        let config = RTCConfiguration {
            ice_servers: config.ice_servers(),
            ..Default::default()
        };
        let connection = Arc::new(api.new_peer_connection(config).await?);

        connection
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                info!("Peer Connection State has changed: {}", s);
                let _ = events.send(PeerEvent::StateChanged(s.into()));
                Box::pin(async {})
            }))
            .await;
        Ok(connection)
    }

    async fn ice_candidates(&self) {
        let tx = self.events.clone();
        self.connection
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let tx2 = tx.clone();
                Box::pin(async move {
                    if let Some(candidate) = c {
                        match candidate.to_json().await {
                            Ok(candidate) => {
                                debug!(?candidate);
                                let _ = tx2.send(PeerEvent::LocalCandidate(candidate));
                            }
                            Err(e) => warn!(?e, "Could not serialize local candidate"),
                        }
                    }
                })
            }))
            .await;
    }

    async fn register_data_channel(&self, data_channel: &Arc<RTCDataChannel>) {
        let tx = self.events.clone();
        data_channel
            .on_open(Box::new(move || {
                info!("Data channel opened");
                let _ = tx.send(PeerEvent::ChannelOpen);
                Box::pin(async {})
            }))
            .await;

        let tx = self.events.clone();
        let d_label = data_channel.label().to_owned();
        data_channel
            .on_message(Box::new(move |msg: DataChannelMessage| {
                let msg_str = String::from_utf8_lossy(&msg.data).into_owned();
                debug!("Message from DataChannel '{}': '{}'", d_label, msg_str);
                let _ = tx.send(PeerEvent::ChannelMessage(msg_str));
                Box::pin(async {})
            }))
            .await;

        data_channel
            .on_close(Box::new(move || {
                debug!("Data channel closed");
                Box::pin(async {})
            }))
            .await;

        data_channel
            .on_error(Box::new(move |e| {
                warn!("Data channel error {:?}", e);
                Box::pin(async {})
            }))
            .await;
    }
}

#[async_trait]
impl PeerTransport for Peer {
    async fn create_data_channel(&self, label: &str) -> anyhow::Result<Arc<dyn DataChannel>> {
        let data_channel = self.connection.create_data_channel(label, None).await?;
        self.register_data_channel(&data_channel).await;
        Ok(Arc::new(PeerChannel::new(data_channel)))
    }

    async fn create_offer(&self) -> anyhow::Result<RTCSessionDescription> {
        Ok(self.connection.create_offer(None).await?)
    }

    async fn set_local_description(
        &self,
        description: RTCSessionDescription,
    ) -> anyhow::Result<()> {
        self.connection.set_local_description(description).await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: RTCSessionDescription,
    ) -> anyhow::Result<()> {
        self.connection.set_remote_description(description).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> anyhow::Result<()> {
        self.connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.connection.close().await?;
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.connection_state().into()
    }
}

/// The outgoing data channel of a [`Peer`].
pub struct PeerChannel {
    channel: Arc<RTCDataChannel>,
}

impl PeerChannel {
    pub fn new(channel: Arc<RTCDataChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DataChannel for PeerChannel {
    fn is_open(&self) -> bool {
        channel_is_open(self.channel.ready_state())
    }

    async fn send_text(&self, text: String) -> anyhow::Result<()> {
        self.channel.send_text(text).await?;
        Ok(())
    }
}
