use std::fmt;

use secrecy::{ExposeSecret, Secret};
use webrtc::ice_transport::ice_server::RTCIceServer;

pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

pub struct RtcConfig {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: Secret<Option<String>>,
}

impl fmt::Debug for RtcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcConfig")
            .field("urls", &self.urls)
            .field("username", &self.username)
            .finish()
    }
}

impl Default for RtcConfig {
    fn default() -> Self {
        RtcConfigBuilder::default().build()
    }
}

impl RtcConfig {
    /// ICE servers handed to every new peer connection. Credentials are
    /// only attached when one was configured.
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        if self.urls.is_empty() {
            return vec![];
        }
        let credential = self.credential.expose_secret().clone();
        vec![RTCIceServer {
            urls: self.urls.clone(),
            username: self.username.clone(),
            credential: credential.unwrap_or_default(),
            ..Default::default()
        }]
    }
}

pub struct RtcConfigBuilder {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: Secret<Option<String>>,
}

impl Default for RtcConfigBuilder {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_ICE_SERVER.to_owned()],
            username: Default::default(),
            credential: Secret::new(None),
        }
    }
}

impl RtcConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> RtcConfig {
        RtcConfig {
            urls: self.urls,
            username: self.username,
            credential: self.credential,
        }
    }

    pub fn urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn username<S: AsRef<str>>(mut self, username: S) -> Self {
        self.username = username.as_ref().to_string();
        self
    }

    pub fn credential<S: AsRef<str>>(mut self, credential: S) -> Self {
        self.credential = Secret::new(Some(credential.as_ref().to_string()));
        self
    }
}
