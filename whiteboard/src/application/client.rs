use std::{
    fmt,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use actix::prelude::*;
use actix_web_actors::ws;
use peer_transport::{
    message::{Envelope, Event},
    ConnectionState, DataChannel, PeerEvent, PeerTransport, RTCIceCandidateInit,
    RTCSessionDescription,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

pub use ws::start;

use super::{
    error::Error,
    registry::ConnectionEntry,
    sessions::Session,
    state::AppState,
    writer::{Outbound, OutboundWriter},
};
use crate::models::{DrawingPoint, PanningOffset, UserId};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, session not registered yet.
    Connecting,
    /// Registered; offers, answers and candidates are in flight.
    Negotiating,
    /// An answer or candidate from the client has been applied.
    Open,
    Closed,
}

/// One connected user: owns the signaling socket and the peer transport.
///
/// Inbound frames are handled strictly one after another; handlers that
/// need the engine block the actor until the engine is done. All writes to
/// the socket, including offers from the registry and local ICE candidates,
/// happen on this actor.
pub struct WsClient {
    id: UserId,
    state: SessionState,
    heartbeat: Instant,
    app: AppState,
    transport: Arc<dyn PeerTransport>,
    channel: Arc<dyn DataChannel>,
    events: Option<mpsc::UnboundedReceiver<PeerEvent>>,
}

impl fmt::Debug for WsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClient")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

impl WsClient {
    pub fn new(
        id: UserId,
        app: AppState,
        transport: Arc<dyn PeerTransport>,
        channel: Arc<dyn DataChannel>,
        events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            heartbeat: Instant::now(),
            app,
            transport,
            channel,
            events: Some(events),
        }
    }

    /// helper method that sends ping to client every 5 seconds (HEARTBEAT_INTERVAL).
    ///
    /// also this method checks heartbeats from client
    fn heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.heartbeat) > CLIENT_TIMEOUT {
                error!(user_id = %act.id, "Websocket Client heartbeat failed, disconnecting!");
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    /// Engine events are handled on this actor, and the queue is dropped
    /// together with it.
    fn forward_engine_events(&mut self, ctx: &mut <Self as Actor>::Context) {
        if let Some(rx) = self.events.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
    }

    /// Stores the session, tells the client who it is and joins the
    /// registry. Nothing from the client is handled before the first
    /// renegotiation round is done.
    fn register(&mut self, ctx: &mut <Self as Actor>::Context) {
        let writer = OutboundWriter::new(ctx.address().recipient::<Outbound>());
        self.app.sessions.create(Session::new(
            self.id,
            self.transport.clone(),
            self.channel.clone(),
            writer.clone(),
        ));
        self.send(Envelope::new(Event::Id, self.id.to_string()), ctx);

        let registry = self.app.registry.clone();
        let entry = ConnectionEntry::new(self.id, self.transport.clone(), writer);
        async move { registry.connect(entry).await }
            .into_actor(self)
            .then(|report, act, _ctx| {
                debug!(user_id = %act.id, ?report, "Registered connection");
                if act.state == SessionState::Connecting {
                    act.state = SessionState::Negotiating;
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn send(&self, envelope: Envelope, ctx: &mut <Self as Actor>::Context) {
        match envelope.to_json() {
            Ok(text) => ctx.text(text),
            Err(e) => error!(user_id = %self.id, ?e, "Could not encode {}", envelope.event),
        }
    }

    fn close(&mut self, ctx: &mut <Self as Actor>::Context, reason: Error) {
        warn!(user_id = %self.id, %reason, "Closing session");
        ctx.close(Some(ws::CloseCode::Invalid.into()));
        ctx.stop();
    }

    /// Runs exactly once, however the session ends.
    fn teardown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        info!(user_id = %self.id, "Deleting session");
        self.app.sessions.delete(&self.id);

        let id = self.id;
        let registry = self.app.registry.clone();
        let transport = self.transport.clone();
        actix_web::rt::spawn(async move {
            let report = registry.disconnect(&id).await;
            debug!(user_id = %id, ?report, "Unregistered connection");
            if let Err(e) = transport.close().await {
                warn!(user_id = %id, ?e, "Could not close peer connection");
            }
        });
    }

    fn dispatch(&mut self, text: &str, ctx: &mut <Self as Actor>::Context) -> Result<(), Error> {
        let envelope = Envelope::from_json(text)?;
        match envelope.kind() {
            Some(Event::Candidate) => {
                let candidate: RTCIceCandidateInit = serde_json::from_str(&envelope.data)?;
                let transport = self.transport.clone();
                self.negotiate(async move { transport.add_ice_candidate(candidate).await }, ctx);
            }
            Some(Event::Answer) => {
                let answer: RTCSessionDescription = serde_json::from_str(&envelope.data)?;
                let transport = self.transport.clone();
                self.negotiate(
                    async move { transport.set_remote_description(answer).await },
                    ctx,
                );
            }
            Some(Event::Panning) => {
                let panning: PanningOffset = serde_json::from_str(&envelope.data)?;
                debug!(user_id = %self.id, ?panning);
                self.app.sessions.modify(&self.id, |s| s.panning = panning);
            }
            Some(Event::Drawing) => {
                let point: DrawingPoint = serde_json::from_str(&envelope.data)?;
                debug!(user_id = %self.id, ?point);
                self.app.sessions.modify(&self.id, |s| s.record(point));
                self.app.drawings.append(self.id, point);

                let router = self.app.broadcast.clone();
                let id = self.id;
                self.apply(
                    async move { router.broadcast(id, point).await.map(|_| ()) },
                    ctx,
                );
            }
            Some(event) => debug!(user_id = %self.id, %event, "Ignoring server-only event"),
            None => debug!(user_id = %self.id, event = %envelope.event, "Ignoring unknown event"),
        }
        Ok(())
    }

    /// Hands an answer or candidate to the engine; the session is open once
    /// the engine accepted one.
    fn negotiate<F>(&mut self, task: F, ctx: &mut <Self as Actor>::Context)
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        task.into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(()) => act.opened(),
                    Err(e) => act.close(ctx, Error::Transport(e)),
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn apply<F>(&mut self, task: F, ctx: &mut <Self as Actor>::Context)
    where
        F: Future<Output = Result<(), Error>> + 'static,
    {
        task.into_actor(self)
            .then(|res, act, ctx| {
                if let Err(e) = res {
                    act.close(ctx, e);
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn opened(&mut self) {
        if matches!(
            self.state,
            SessionState::Connecting | SessionState::Negotiating
        ) {
            info!(user_id = %self.id, "Session open");
            self.state = SessionState::Open;
        }
    }

    /// Replays every stored point to this client's own data channel.
    fn replay_history(&self, ctx: &mut <Self as Actor>::Context) {
        let points = self.app.drawings.snapshot();
        if points.is_empty() {
            return;
        }
        let id = self.id;
        let channel = self.channel.clone();
        async move {
            let total = points.len();
            for point in points {
                let text = match Envelope::with_payload(Event::Drawing, &point)
                    .and_then(|envelope| envelope.to_json())
                {
                    Ok(text) => text,
                    Err(e) => {
                        error!(user_id = %id, ?e, "Could not encode drawing");
                        return;
                    }
                };
                if let Err(e) = channel.send_text(text).await {
                    warn!(user_id = %id, ?e, "Stopped replaying history");
                    return;
                }
            }
            debug!(user_id = %id, total, "Replayed history");
        }
        .into_actor(self)
        .spawn(ctx);
    }
}

impl Handler<Outbound> for WsClient {
    type Result = ();

    fn handle(&mut self, Outbound(envelope): Outbound, ctx: &mut Self::Context) -> Self::Result {
        self.send(envelope, ctx);
    }
}

impl StreamHandler<PeerEvent> for WsClient {
    fn handle(&mut self, event: PeerEvent, ctx: &mut Self::Context) {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                match Envelope::with_payload(Event::Candidate, &candidate) {
                    Ok(envelope) => self.send(envelope, ctx),
                    Err(e) => warn!(user_id = %self.id, ?e, "Could not encode candidate"),
                }
            }
            PeerEvent::StateChanged(state @ (ConnectionState::Failed | ConnectionState::Closed)) => {
                info!(user_id = %self.id, %state, "Peer connection ended");
                ctx.close(Some(ws::CloseCode::Away.into()));
                ctx.stop();
            }
            PeerEvent::StateChanged(state) => {
                debug!(user_id = %self.id, %state, "Peer connection state changed");
            }
            PeerEvent::ChannelOpen => self.replay_history(ctx),
            PeerEvent::ChannelMessage(msg) => {
                debug!(user_id = %self.id, %msg, "Message from data channel");
            }
        }
    }

    /// The engine dropped its side of the queue; the socket decides when
    /// the session ends.
    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!(user_id = %self.id, "Engine event queue closed");
    }
}

impl Actor for WsClient {
    type Context = ws::WebsocketContext<Self>;

    /// Method is called on actor start. We start the heartbeat process here.
    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        self.forward_engine_events(ctx);
        self.register(ctx);
        info!(user_id = %self.id, "WsClient started");
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.teardown();
        Running::Stop
    }
}

/// Handler for ws::Message message
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsClient {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.heartbeat = Instant::now();
                if let Err(e) = self.dispatch(&text, ctx) {
                    self.close(ctx, e);
                }
            }
            Ok(ws::Message::Binary(_)) => debug!(user_id = %self.id, "Ignoring binary frame"),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                warn!(user_id = %self.id, ?e, "Websocket protocol error");
                ctx.stop();
            }
        }
    }
}
