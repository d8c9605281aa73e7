use std::{fmt::Debug, sync::Arc, time::Duration};

use awc::{error::WsProtocolError, ws};
use futures_util::{Sink, SinkExt as _, Stream, StreamExt as _};
use once_cell::sync::Lazy;
use peer_transport::{fake::FakeFactory, message::Envelope};
use tokio::time::{sleep, timeout};
use whiteboard::{
    application::{AppState, Application},
    settings::{ApplicationSettings, RtcSettings, Settings},
};

static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug")
    }
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
});

pub fn enable_tracing() {
    Lazy::force(&TRACING);
}

const WAIT: Duration = Duration::from_secs(2);

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub engine: Arc<FakeFactory>,
}

pub async fn spawn_app() -> TestApp {
    enable_tracing();

    let engine = Arc::new(FakeFactory::new());
    let state = AppState::new(engine.clone());
    let settings = Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        rtc: RtcSettings::default(),
    };
    let app = Application::build(settings, state.clone())
        .await
        .expect("Failed to build application");
    let port = app.port();
    let _ = actix_web::rt::spawn(app.run_until_stopped());

    TestApp {
        address: "127.0.0.1".to_string(),
        port,
        state,
        engine,
    }
}

impl TestApp {
    pub fn base_address(&self) -> String {
        format!("http://{}:{}", &self.address, self.port)
    }

    pub fn path(&self, path: &str) -> String {
        format!("{}/{}", &self.base_address(), path)
    }

    pub async fn connect(
        &self,
    ) -> impl Stream<Item = Result<ws::Frame, WsProtocolError>>
           + Sink<ws::Message, Error = WsProtocolError>
           + Unpin {
        let address = format!("ws://{}:{}/websocket", &self.address, self.port);
        let (_res, socket) = awc::Client::new()
            .ws(address)
            .connect()
            .await
            .expect("Failed to connect websocket");
        socket
    }
}

/// Next frame from the server, ignoring heartbeat pings.
pub async fn next_frame<S>(ws: &mut S) -> ws::Frame
where
    S: Stream<Item = Result<ws::Frame, WsProtocolError>> + Unpin,
{
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Websocket closed")
            .expect("Websocket protocol error");
        if !matches!(frame, ws::Frame::Ping(_)) {
            return frame;
        }
    }
}

pub async fn next_envelope<S>(ws: &mut S) -> Envelope
where
    S: Stream<Item = Result<ws::Frame, WsProtocolError>> + Unpin,
{
    match next_frame(ws).await {
        ws::Frame::Text(bytes) => {
            let text = std::str::from_utf8(&bytes).expect("Frame is not utf-8");
            Envelope::from_json(text).expect("Frame is not an envelope")
        }
        frame => panic!("Expected a text frame, got {frame:?}"),
    }
}

pub async fn send_text<S>(ws: &mut S, text: &str)
where
    S: Sink<ws::Message> + Unpin,
    S::Error: Debug,
{
    ws.send(ws::Message::Text(text.to_string().into()))
        .await
        .expect("Failed to send frame");
}

pub async fn send_envelope<S>(ws: &mut S, envelope: &Envelope)
where
    S: Sink<ws::Message> + Unpin,
    S::Error: Debug,
{
    send_text(ws, &envelope.to_json().expect("Failed to encode envelope")).await;
}

/// Polls `check` until it holds.
pub async fn eventually<F>(what: &str, check: F)
where
    F: Fn() -> bool,
{
    for _ in 0..100 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("Timed out waiting for {what}");
}
