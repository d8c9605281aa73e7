use std::time::Duration;

use awc::{
    error::WsProtocolError,
    ws::{CloseCode, Frame, Message},
};
use futures_util::SinkExt as _;
use peer_transport::{
    message::{Envelope, Event},
    PeerEvent, RTCIceCandidateInit, RTCSdpType, RTCSessionDescription,
};
use tokio::time::sleep;
use uuid::Uuid;
use whiteboard::models::{DrawingPoint, PanningOffset, UserId};

use crate::helper::{
    eventually, next_envelope, next_frame, send_envelope, send_text, spawn_app, TestApp,
};

fn drawing(x: f64, y: f64) -> DrawingPoint {
    DrawingPoint {
        x,
        y,
        offset_x: 0.25,
        offset_y: -3.0,
    }
}

/// Connects a client and reads its id and first offer.
async fn join(
    app: &TestApp,
) -> (
    UserId,
    impl futures_util::Stream<Item = Result<Frame, WsProtocolError>>
        + futures_util::Sink<Message, Error = WsProtocolError>
        + Unpin,
) {
    let mut ws = app.connect().await;
    let id = next_envelope(&mut ws).await;
    assert_eq!(id.kind(), Some(Event::Id));
    let user_id: Uuid = id.data.parse().expect("id is not a uuid");

    let offer = next_envelope(&mut ws).await;
    assert_eq!(offer.kind(), Some(Event::Offer));
    (user_id, ws)
}

#[actix_web::test]
async fn id_then_offer() {
    let app = spawn_app().await;
    let mut ws = app.connect().await;

    let id = next_envelope(&mut ws).await;
    assert_eq!(id.kind(), Some(Event::Id));
    let user_id: Uuid = id.data.parse().unwrap();

    let offer = next_envelope(&mut ws).await;
    assert_eq!(offer.kind(), Some(Event::Offer));
    let description: RTCSessionDescription = serde_json::from_str(&offer.data).unwrap();
    assert_eq!(description.sdp_type, RTCSdpType::Offer);

    let peer = &app.engine.peers()[0];
    assert_eq!(peer.local_descriptions()[0].sdp, description.sdp);
    assert!(app.state.sessions.contains(&user_id));
    assert_eq!(app.state.registry.user_ids().await, vec![user_id]);
}

#[actix_web::test]
async fn second_user_renegotiates_the_first() {
    let app = spawn_app().await;
    let (_alice, mut alice_ws) = join(&app).await;
    let (_bob, _bob_ws) = join(&app).await;

    let offer = next_envelope(&mut alice_ws).await;
    assert_eq!(offer.kind(), Some(Event::Offer));
    let description: RTCSessionDescription = serde_json::from_str(&offer.data).unwrap();
    assert_eq!(description.sdp, "fake offer 2");
    assert_eq!(app.engine.peers()[0].offers_created(), 2);
    assert_eq!(app.engine.peers()[1].offers_created(), 1);
}

#[actix_web::test]
async fn drawing_reaches_everyone_else() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;
    let (_bob, _bob_ws) = join(&app).await;
    let (_charlie, _charlie_ws) = join(&app).await;

    let point = drawing(0.1 + 0.2, 1e-7);
    let raw = r#"{"x":0.30000000000000004,"y":1e-7,"offsetX":0.25,"offsetY":-3.0}"#;
    send_text(
        &mut alice_ws,
        &Envelope::new(Event::Drawing, raw).to_json().unwrap(),
    )
    .await;

    let peers = app.engine.peers();
    let bob_channel = peers[1].channel().unwrap();
    let charlie_channel = peers[2].channel().unwrap();
    eventually("the drawing to be broadcast", || {
        bob_channel.sent().len() == 1 && charlie_channel.sent().len() == 1
    })
    .await;

    for sent in [&bob_channel.sent()[0], &charlie_channel.sent()[0]] {
        let envelope = Envelope::from_json(sent).unwrap();
        assert_eq!(envelope.kind(), Some(Event::Drawing));
        let received: DrawingPoint = serde_json::from_str(&envelope.data).unwrap();
        assert_eq!(received, point);
    }
    assert!(peers[0].channel().unwrap().sent().is_empty());

    assert_eq!(app.state.drawings.points(&alice), vec![point]);
    let session = app.state.sessions.get(&alice).unwrap();
    assert_eq!(session.panning, PanningOffset { x: 0.25, y: -3.0 });
    assert_eq!(session.drawings, vec![point]);
}

#[actix_web::test]
async fn malformed_drawing_closes_only_the_sender() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;
    let (bob, mut bob_ws) = join(&app).await;
    let (charlie, _charlie_ws) = join(&app).await;
    // offers for bob and charlie joining
    let _ = next_envelope(&mut alice_ws).await;
    let _ = next_envelope(&mut alice_ws).await;
    let _ = next_envelope(&mut bob_ws).await;

    send_text(
        &mut alice_ws,
        r#"{"event":"drawing","data":"{\"x\":\"a\",\"y\":1,\"offsetX\":0,\"offsetY\":0}"}"#,
    )
    .await;

    match next_frame(&mut alice_ws).await {
        Frame::Close(Some(reason)) => assert_eq!(reason.code, CloseCode::Invalid),
        frame => panic!("Expected a close frame, got {frame:?}"),
    }

    let peers = app.engine.peers();
    let alice_peer = peers[0].clone();
    eventually("alice to be cleaned up", || {
        !app.state.sessions.contains(&alice) && alice_peer.is_closed()
    })
    .await;
    assert!(app.state.drawings.is_empty());

    // bob gets renegotiated and can still draw for charlie
    let offer = next_envelope(&mut bob_ws).await;
    assert_eq!(offer.kind(), Some(Event::Offer));
    assert!(app.state.sessions.contains(&bob));

    let point = drawing(7.0, 8.0);
    send_envelope(
        &mut bob_ws,
        &Envelope::with_payload(Event::Drawing, &point).unwrap(),
    )
    .await;

    let charlie_channel = peers[2].channel().unwrap();
    eventually("bob's drawing to reach charlie", || {
        charlie_channel.sent().len() == 1
    })
    .await;
    let envelope = Envelope::from_json(&charlie_channel.sent()[0]).unwrap();
    let received: DrawingPoint = serde_json::from_str(&envelope.data).unwrap();
    assert_eq!(received, point);

    assert!(peers[0].channel().unwrap().sent().is_empty());
    assert!(peers[1].channel().unwrap().sent().is_empty());
    assert_eq!(app.state.drawings.points(&bob), vec![point]);

    let mut registered = vec![];
    for _ in 0..100 {
        registered = app.state.registry.user_ids().await;
        if registered.len() == 2 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(registered, vec![bob, charlie]);
}

#[actix_web::test]
async fn engine_events_stop_with_the_session() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;
    let alice_peer = app.engine.peers()[0].clone();
    assert!(!alice_peer.events_closed());

    alice_ws.send(Message::Close(None)).await.unwrap();

    eventually("alice's engine queue to be dropped", || {
        !app.state.sessions.contains(&alice) && alice_peer.events_closed()
    })
    .await;
    // late engine events go nowhere
    alice_peer.emit(PeerEvent::ChannelOpen);
    assert!(alice_peer.channel().unwrap().sent().is_empty());
}

#[actix_web::test]
async fn malformed_envelope_closes_the_session() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;

    send_text(&mut alice_ws, "not json").await;

    assert!(matches!(next_frame(&mut alice_ws).await, Frame::Close(_)));
    eventually("alice to be removed", || {
        !app.state.sessions.contains(&alice)
    })
    .await;
}

#[actix_web::test]
async fn disconnect_cleans_up() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;
    let (bob, mut bob_ws) = join(&app).await;
    let _ = next_envelope(&mut alice_ws).await;

    alice_ws.send(Message::Close(None)).await.unwrap();

    let alice_peer = app.engine.peers()[0].clone();
    eventually("alice's session to be deleted", || {
        !app.state.sessions.contains(&alice) && alice_peer.is_closed()
    })
    .await;

    let mut registered = vec![];
    for _ in 0..100 {
        registered = app.state.registry.user_ids().await;
        if registered == vec![bob] {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(registered, vec![bob]);

    // the survivor is renegotiated
    let offer = next_envelope(&mut bob_ws).await;
    assert_eq!(offer.kind(), Some(Event::Offer));
    assert_eq!(app.state.sessions.len(), 1);
}

#[actix_web::test]
async fn history_is_replayed_when_the_channel_opens() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;
    for point in [drawing(1.0, 1.0), drawing(2.0, 2.0)] {
        send_envelope(
            &mut alice_ws,
            &Envelope::with_payload(Event::Drawing, &point).unwrap(),
        )
        .await;
    }
    eventually("both points to be stored", || {
        app.state.drawings.points(&alice).len() == 2
    })
    .await;

    let (_bob, _bob_ws) = join(&app).await;
    let bob_peer = app.engine.peers()[1].clone();
    let bob_channel = bob_peer.channel().unwrap();
    assert!(bob_channel.sent().is_empty());

    bob_peer.emit(PeerEvent::ChannelOpen);
    eventually("the history to be replayed", || {
        bob_channel.sent().len() == 2
    })
    .await;

    let replayed: Vec<DrawingPoint> = bob_channel
        .sent()
        .iter()
        .map(|sent| serde_json::from_str(&Envelope::from_json(sent).unwrap().data).unwrap())
        .collect();
    assert_eq!(replayed, vec![drawing(1.0, 1.0), drawing(2.0, 2.0)]);
}

#[actix_web::test]
async fn candidates_and_answers_reach_the_engine() {
    let app = spawn_app().await;
    let (_alice, mut alice_ws) = join(&app).await;

    send_text(
        &mut alice_ws,
        &Envelope::new(
            Event::Candidate,
            r#"{"candidate":"candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host","sdpMid":"0","sdpMLineIndex":0}"#,
        )
        .to_json()
        .unwrap(),
    )
    .await;
    send_text(
        &mut alice_ws,
        &Envelope::new(Event::Answer, r#"{"type":"answer","sdp":"v=0"}"#)
            .to_json()
            .unwrap(),
    )
    .await;

    let peer = app.engine.peers()[0].clone();
    eventually("the candidate and the answer to be applied", || {
        peer.candidates().len() == 1 && peer.remote_descriptions().len() == 1
    })
    .await;
    assert!(peer.candidates()[0].candidate.contains("typ host"));
    let answer = &peer.remote_descriptions()[0];
    assert_eq!(answer.sdp_type, RTCSdpType::Answer);
    assert_eq!(answer.sdp, "v=0");
}

#[actix_web::test]
async fn local_candidates_are_sent_to_the_client() {
    let app = spawn_app().await;
    let (_alice, mut alice_ws) = join(&app).await;

    let candidate: RTCIceCandidateInit = serde_json::from_str(
        r#"{"candidate":"candidate:2 1 udp 1686052607 203.0.113.7 40000 typ srflx"}"#,
    )
    .unwrap();
    app.engine.peers()[0].emit(PeerEvent::LocalCandidate(candidate));

    let envelope = next_envelope(&mut alice_ws).await;
    assert_eq!(envelope.kind(), Some(Event::Candidate));
    let sent: RTCIceCandidateInit = serde_json::from_str(&envelope.data).unwrap();
    assert!(sent.candidate.contains("typ srflx"));
}

#[actix_web::test]
async fn rejected_answer_closes_the_session() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;

    send_text(
        &mut alice_ws,
        &Envelope::new(Event::Answer, r#"{"type":"answer","sdp":""}"#)
            .to_json()
            .unwrap(),
    )
    .await;

    assert!(matches!(next_frame(&mut alice_ws).await, Frame::Close(_)));
    eventually("alice to be removed", || {
        !app.state.sessions.contains(&alice)
    })
    .await;
}

#[actix_web::test]
async fn unknown_events_are_ignored() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;

    send_text(&mut alice_ws, r#"{"event":"wave","data":"hello"}"#).await;
    send_envelope(
        &mut alice_ws,
        &Envelope::with_payload(Event::Panning, &PanningOffset { x: 12.0, y: -8.5 }).unwrap(),
    )
    .await;

    eventually("the panning to be stored", || {
        app.state
            .sessions
            .get(&alice)
            .map(|s| s.panning == PanningOffset { x: 12.0, y: -8.5 })
            .unwrap_or(false)
    })
    .await;
    assert!(!app.engine.peers()[0].is_closed());
}

#[actix_web::test]
async fn failed_peer_connection_ends_the_session() {
    let app = spawn_app().await;
    let (alice, mut alice_ws) = join(&app).await;

    app.engine.peers()[0].set_state(peer_transport::ConnectionState::Failed);

    assert!(matches!(next_frame(&mut alice_ws).await, Frame::Close(_)));
    eventually("alice to be removed", || {
        !app.state.sessions.contains(&alice)
    })
    .await;
}
