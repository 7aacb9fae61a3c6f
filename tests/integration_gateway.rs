mod common;

use common::TestApp;
use futures::{SinkExt, StreamExt};
use huddle_server::realtime::PresenceTracker;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, user_id: i64) -> Ws {
    let token = app.token(user_id);
    let (ws, _) = connect_async(app.ws_url(&token)).await.expect("WebSocket handshake failed");
    ws
}

async fn send_event(ws: &mut Ws, event: Value) {
    let frame = serde_json::to_string(&event).expect("encode failed");
    ws.send(WsMessage::Text(frame.into())).await.expect("send failed");
}

/// Reads frames until one satisfies the predicate or the timeout elapses.
async fn wait_for_event<F>(ws: &mut Ws, timeout: Duration, predicate: F) -> Option<Value>
where
    F: Fn(&Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }

        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => {
                if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                    if predicate(&value) {
                        return Some(value);
                    }
                }
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_)) | None) | Err(_) => return None,
        }
    }
}

fn is_event(value: &Value, name: &str) -> bool {
    value.get("event").and_then(Value::as_str) == Some(name)
}

#[tokio::test]
async fn handshake_fails_fast_without_a_valid_token() {
    let app = TestApp::spawn().await;

    let result = connect_async(app.ws_url("not-a-real-token")).await;
    assert!(result.is_err(), "invalid token must reject the handshake");
}

#[tokio::test]
async fn direct_messages_reach_both_participants_live() {
    let app = TestApp::spawn().await;
    app.seed_user(1, "Alice").await;
    app.seed_user(2, "Bob").await;

    let mut alice = connect(&app, 1).await;
    let mut bob = connect(&app, 2).await;

    send_event(&mut alice, json!({
        "event": "direct-message-send",
        "data": { "receiverId": 2, "content": "hello over the wire" }
    }))
    .await;

    let received = wait_for_event(&mut bob, Duration::from_secs(2), |v| {
        is_event(v, "new-direct-message")
    })
    .await
    .expect("Bob did not receive the message");
    assert_eq!(received["data"]["content"], "hello over the wire");
    assert_eq!(received["data"]["senderName"], "Alice");

    // The sender's own personal channel sees the message too, so their
    // other devices converge.
    let echoed = wait_for_event(&mut alice, Duration::from_secs(2), |v| {
        is_event(v, "new-direct-message")
    })
    .await
    .expect("Alice did not receive her own message event");
    assert_eq!(echoed["data"]["receiverId"], 2);
}

#[tokio::test]
async fn failed_actions_error_only_the_originating_connection() {
    let app = TestApp::spawn().await;
    app.seed_user(1, "Alice").await;
    app.seed_user(2, "Bob").await;

    let mut alice = connect(&app, 1).await;
    let mut bob = connect(&app, 2).await;

    send_event(&mut alice, json!({
        "event": "direct-message-send",
        "data": { "receiverId": 2, "content": "   " }
    }))
    .await;

    let error = wait_for_event(&mut alice, Duration::from_secs(2), |v| is_event(v, "error"))
        .await
        .expect("originating connection must see the error");
    assert!(error["data"]["message"].as_str().unwrap_or_default().contains("empty"));

    // No fan-out happened and nobody else saw anything.
    let leaked = wait_for_event(&mut bob, Duration::from_millis(300), |v| {
        is_event(v, "new-direct-message") || is_event(v, "error")
    })
    .await;
    assert!(leaked.is_none(), "failed action must be invisible to other participants");
}

#[tokio::test]
async fn room_channels_are_connection_scoped_and_membership_gated() {
    let app = TestApp::spawn().await;
    app.seed_user(1, "Alice").await;
    app.seed_user(2, "Bob").await;
    app.seed_user(3, "Mallory").await;

    // Room created over the request surface; the gateway routes through
    // the same service layer.
    let response = app
        .client
        .post(app.url("/v1/rooms"))
        .bearer_auth(app.token(1))
        .json(&json!({ "name": "Warroom", "memberIds": [2] }))
        .send()
        .await
        .expect("create room failed");
    assert_eq!(response.status(), 201);
    let room: Value = response.json().await.expect("bad room payload");
    let room_id = room["id"].as_i64().expect("room id missing");

    let mut alice = connect(&app, 1).await;
    let mut bob = connect(&app, 2).await;
    let mut mallory = connect(&app, 3).await;

    send_event(&mut alice, json!({ "event": "join-room", "data": room_id })).await;
    send_event(&mut bob, json!({ "event": "join-room", "data": room_id })).await;

    // A non-member cannot subscribe to the room channel.
    send_event(&mut mallory, json!({ "event": "join-room", "data": room_id })).await;
    let rejected = wait_for_event(&mut mallory, Duration::from_secs(2), |v| is_event(v, "error"))
        .await
        .expect("non-member join must produce an error event");
    assert!(rejected["data"]["message"].as_str().unwrap_or_default().contains("member"));

    // Joins run on independent connections; give them a beat to settle
    // before fanning out.
    tokio::time::sleep(Duration::from_millis(300)).await;

    send_event(&mut alice, json!({
        "event": "group-message-send",
        "data": { "roomId": room_id, "content": "standup in 5" }
    }))
    .await;

    for (name, ws) in [("Alice", &mut alice), ("Bob", &mut bob)] {
        let received = wait_for_event(ws, Duration::from_secs(2), |v| {
            is_event(v, "new-group-message")
        })
        .await
        .unwrap_or_else(|| panic!("{name} did not receive the group message"));
        assert_eq!(received["data"]["content"], "standup in 5");
    }

    let leaked = wait_for_event(&mut mallory, Duration::from_millis(300), |v| {
        is_event(v, "new-group-message")
    })
    .await;
    assert!(leaked.is_none(), "non-subscriber must not receive room traffic");

    // Leaving stops delivery for this connection only.
    send_event(&mut bob, json!({ "event": "leave-room", "data": room_id })).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    send_event(&mut alice, json!({
        "event": "group-message-send",
        "data": { "roomId": room_id, "content": "after bob left" }
    }))
    .await;

    let after_leave = wait_for_event(&mut bob, Duration::from_millis(300), |v| {
        is_event(v, "new-group-message")
    })
    .await;
    assert!(after_leave.is_none());
}

#[tokio::test]
async fn presence_flips_only_on_first_and_last_connection() {
    let app = TestApp::spawn().await;
    app.seed_user(1, "Alice").await;
    app.seed_user(2, "Bob").await;

    let mut alice_phone = connect(&app, 1).await;
    let mut alice_laptop = connect(&app, 1).await;

    let mut bob = connect(&app, 2).await;

    // Bob coming online is announced to Alice's connections.
    let online = wait_for_event(&mut alice_phone, Duration::from_secs(2), |v| {
        is_event(v, "presence-change") && v["data"]["userId"] == 2
    })
    .await
    .expect("Alice did not see Bob come online");
    assert_eq!(online["data"]["isOnline"], true);

    // Closing one of Alice's two connections must not flip her offline.
    alice_laptop.close(None).await.ok();
    let premature = wait_for_event(&mut bob, Duration::from_millis(400), |v| {
        is_event(v, "presence-change") && v["data"]["userId"] == 1 && v["data"]["isOnline"] == false
    })
    .await;
    assert!(premature.is_none(), "user with a live connection must stay online");

    // Closing the last one does.
    alice_phone.close(None).await.ok();
    let offline = wait_for_event(&mut bob, Duration::from_secs(2), |v| {
        is_event(v, "presence-change") && v["data"]["userId"] == 1 && v["data"]["isOnline"] == false
    })
    .await;
    assert!(offline.is_some(), "last disconnect must flip the user offline");
}

#[tokio::test]
async fn rest_surface_round_trips_unread_state() {
    let app = TestApp::spawn().await;
    app.seed_user(1, "Alice").await;
    app.seed_user(2, "Bob").await;

    let unauthorized = app
        .client
        .get(app.url("/v1/messages/unread-counts"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(unauthorized.status(), 401);

    let response = app
        .client
        .post(app.url("/v1/messages"))
        .bearer_auth(app.token(1))
        .json(&json!({ "receiverId": 2, "content": "hi bob" }))
        .send()
        .await
        .expect("send failed");
    assert_eq!(response.status(), 201);

    let counts: Value = app
        .client
        .get(app.url("/v1/messages/unread-counts"))
        .bearer_auth(app.token(2))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("bad counts payload");
    assert_eq!(counts["1"], 1);

    let marked = app
        .client
        .post(app.url("/v1/conversations/1/read"))
        .bearer_auth(app.token(2))
        .send()
        .await
        .expect("request failed");
    assert_eq!(marked.status(), 204);

    let counts: Value = app
        .client
        .get(app.url("/v1/messages/unread-counts"))
        .bearer_auth(app.token(2))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("bad counts payload");
    assert!(counts.get("1").is_none());
}

#[tokio::test]
async fn presence_tracker_counts_connections_not_booleans() {
    let presence = PresenceTracker::new();

    assert!(presence.connect(7), "first connection flips online");
    assert!(!presence.connect(7), "second connection is silent");
    assert!(presence.is_online(7));

    assert!(!presence.disconnect(7), "one of two closing keeps the user online");
    assert!(presence.is_online(7));

    assert!(presence.disconnect(7), "last connection closing flips offline");
    assert!(!presence.is_online(7));

    // A stale disconnect for an unknown user is a no-op.
    assert!(!presence.disconnect(99));
    assert!(presence.online_users().is_empty());
}
