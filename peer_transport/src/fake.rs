//! In-memory engine. Records everything the signaling layer asks of it and
//! lets a test drive state changes and engine events by hand.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use crate::{
    ConnectionState, DataChannel, Events, PeerEvent, PeerTransport, RTCIceCandidateInit,
    RTCSdpType, RTCSessionDescription, TransportFactory,
};

pub fn description(sdp_type: RTCSdpType, sdp: &str) -> RTCSessionDescription {
    let mut description = RTCSessionDescription::default();
    description.sdp_type = sdp_type;
    description.sdp = sdp.to_string();
    description
}

#[derive(Default)]
pub struct FakeFactory {
    peers: Mutex<Vec<Arc<FakePeer>>>,
    fail: AtomicBool,
    fail_channel: AtomicBool,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers in creation order.
    pub fn peers(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().unwrap().clone()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The next peer refuses to open its data channel.
    pub fn fail_next_channel(&self, fail: bool) {
        self.fail_channel.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn create(&self, events: Events) -> anyhow::Result<Arc<dyn PeerTransport>> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("fake engine refused to create a connection"));
        }
        let peer = FakePeer::new(events);
        peer.fail_channels
            .store(self.fail_channel.swap(false, Ordering::SeqCst), Ordering::SeqCst);
        let peer = Arc::new(peer);
        self.peers.lock().unwrap().push(peer.clone());
        Ok(peer)
    }
}

pub struct FakePeer {
    events: Events,
    state: Mutex<ConnectionState>,
    offers: AtomicUsize,
    local: Mutex<Vec<RTCSessionDescription>>,
    remote: Mutex<Vec<RTCSessionDescription>>,
    candidates: Mutex<Vec<RTCIceCandidateInit>>,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
    fail_offers: AtomicBool,
    fail_channels: AtomicBool,
}

impl FakePeer {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            state: Mutex::new(ConnectionState::New),
            offers: AtomicUsize::new(0),
            local: Default::default(),
            remote: Default::default(),
            candidates: Default::default(),
            channels: Default::default(),
            fail_offers: AtomicBool::new(false),
            fail_channels: AtomicBool::new(false),
        }
    }

    /// A peer whose events nobody listens to.
    pub fn detached() -> Self {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        Self::new(tx)
    }

    /// Changes the connection state and reports it like the engine would.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
        let _ = self.events.send(PeerEvent::StateChanged(state));
    }

    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    /// Whether the session stopped listening for this peer's events.
    pub fn events_closed(&self) -> bool {
        self.events.is_closed()
    }

    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn offers_created(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn local_descriptions(&self) -> Vec<RTCSessionDescription> {
        self.local.lock().unwrap().clone()
    }

    pub fn remote_descriptions(&self) -> Vec<RTCSessionDescription> {
        self.remote.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<RTCIceCandidateInit> {
        self.candidates.lock().unwrap().clone()
    }

    /// First data channel created on this peer.
    pub fn channel(&self) -> Option<Arc<FakeChannel>> {
        self.channels.lock().unwrap().first().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.connection_state().is_closed()
    }
}

#[async_trait]
impl PeerTransport for FakePeer {
    async fn create_data_channel(&self, _label: &str) -> anyhow::Result<Arc<dyn DataChannel>> {
        if self.fail_channels.load(Ordering::SeqCst) {
            return Err(anyhow!("fake engine refused to create a data channel"));
        }
        let channel = Arc::new(FakeChannel::default());
        self.channels.lock().unwrap().push(channel.clone());
        Ok(channel)
    }

    async fn create_offer(&self) -> anyhow::Result<RTCSessionDescription> {
        if self.fail_offers.load(Ordering::SeqCst) {
            return Err(anyhow!("fake engine refused to create an offer"));
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(description(RTCSdpType::Offer, &format!("fake offer {n}")))
    }

    async fn set_local_description(
        &self,
        description: RTCSessionDescription,
    ) -> anyhow::Result<()> {
        self.local.lock().unwrap().push(description);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: RTCSessionDescription,
    ) -> anyhow::Result<()> {
        if description.sdp.is_empty() {
            return Err(anyhow!("empty remote description"));
        }
        self.remote.lock().unwrap().push(description);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> anyhow::Result<()> {
        if candidate.candidate.is_empty() {
            return Err(anyhow!("empty candidate"));
        }
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.set_state(ConnectionState::Closed);
        for channel in self.channels.lock().unwrap().iter() {
            channel.set_open(false);
        }
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }
}

pub struct FakeChannel {
    open: AtomicBool,
    fail: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            sent: Default::default(),
        }
    }
}

impl FakeChannel {
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataChannel for FakeChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("fake data channel send failed"));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}
