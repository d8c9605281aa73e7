use std::env;

use anyhow::Context;
use peer_transport::{RtcConfig, RtcConfigBuilder, DEFAULT_ICE_SERVER};
use secrecy::{ExposeSecret, Secret};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub rtc: RtcSettings,
}

#[derive(Debug, serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
    pub host: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RtcSettings {
    pub ice_servers: Vec<String>,
    pub ice_username: Option<String>,
    pub ice_credential: Option<Secret<String>>,
}

impl Default for RtcSettings {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_ICE_SERVER.to_string()],
            ice_username: None,
            ice_credential: None,
        }
    }
}

impl RtcSettings {
    pub fn rtc_config(&self) -> RtcConfig {
        let mut builder = RtcConfigBuilder::new().urls(self.ice_servers.clone());
        if let Some(username) = &self.ice_username {
            builder = builder.username(username);
        }
        if let Some(credential) = &self.ice_credential {
            builder = builder.credential(credential.expose_secret());
        }
        builder.build()
    }
}

impl Settings {
    /// Reads `WHITEBOARD_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut application = ApplicationSettings::default();
        if let Some(host) = var("WHITEBOARD_HOST") {
            application.host = host;
        }
        if let Some(port) = var("WHITEBOARD_PORT") {
            application.port = port
                .parse()
                .with_context(|| format!("WHITEBOARD_PORT is not a valid port: {port:?}"))?;
        }

        let mut rtc = RtcSettings::default();
        if let Some(servers) = var("WHITEBOARD_ICE_SERVERS") {
            rtc.ice_servers = servers
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
        }
        rtc.ice_username = var("WHITEBOARD_ICE_USERNAME");
        rtc.ice_credential = var("WHITEBOARD_ICE_CREDENTIAL").map(Secret::new);

        Ok(Self { application, rtc })
    }
}
