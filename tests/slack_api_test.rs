//! Slack adapter tests against mocked Web API endpoints
//! Run with: cargo test --test slack_api_test

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rulebot::infrastructure::adapters::SlackConnector;
use rulebot::infrastructure::transport::frames::PROBE_FRAME;
use rulebot::infrastructure::transport::{Connection, ConnectionOptions, Connector};
use rulebot::{Transport, TransportError};

const TOKEN: &str = "xoxb-test";
const WAIT: Duration = Duration::from_secs(5);

async fn mock_start(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rtm.start"))
        .and(query_param("token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn ok_user(name: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "user": {"name": name}}))
}

fn connector(server: &MockServer) -> SlackConnector {
    SlackConnector::new(TOKEN).with_api_base(server.uri())
}

#[tokio::test]
async fn handshake_returns_session() {
    let server = MockServer::start().await;
    mock_start(
        &server,
        json!({"ok": true, "url": "wss://example.invalid/rtm", "self": {"id": "B42"}}),
    )
    .await;

    let session = connector(&server).handshake().await.unwrap();

    assert_eq!(session.url, "wss://example.invalid/rtm");
    assert_eq!(session.self_id, "B42");
}

#[tokio::test]
async fn handshake_rejects_anything_but_ok_true() {
    for ok in [json!(false), json!("true"), json!(1)] {
        let server = MockServer::start().await;
        mock_start(
            &server,
            json!({"ok": ok, "error": "invalid_auth", "url": "wss://x", "self": {"id": "B1"}}),
        )
        .await;

        let err = connector(&server).handshake().await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)), "ok = {}", ok);
    }
}

#[tokio::test]
async fn handshake_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rtm.start"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = connector(&server).handshake().await.unwrap_err();
    assert!(matches!(err, TransportError::Parse(_)));
}

#[tokio::test]
async fn lookup_user_reads_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.info"))
        .and(query_param("user", "U1"))
        .and(query_param("token", TOKEN))
        .respond_with(ok_user("alice"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(connector(&server).lookup_user("U1").await.unwrap(), "alice");
}

#[tokio::test]
async fn lookup_user_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": false, "error": "user_not_found"})),
        )
        .mount(&server)
        .await;

    assert!(connector(&server).lookup_user("U404").await.is_err());
}

#[tokio::test]
async fn end_to_end_over_a_local_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_url = format!("ws://{}", listener.local_addr().unwrap());

    let server = MockServer::start().await;
    mock_start(&server, json!({"ok": true, "url": ws_url, "self": {"id": "B1"}})).await;
    Mock::given(method("GET"))
        .and(path("/users.info"))
        .and(query_param("user", "U1"))
        .respond_with(ok_user("alice"))
        .expect(1)
        .mount(&server)
        .await;

    // Fake RTM endpoint: push two frames, then report what the bot sends.
    let (written_tx, mut written_rx) = tokio::sync::mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for text in ["ignored", "hello bot"] {
            let frame = json!({"type": "message", "channel": "C1", "user": "U1", "text": text});
            ws.send(WsMessage::Text(frame.to_string().into())).await.unwrap();
        }
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(text) = msg {
                if text.as_str() != PROBE_FRAME {
                    let _ = written_tx.send(text.as_str().to_owned()).await;
                }
            }
        }
    });

    let options = ConnectionOptions {
        send_interval: Duration::from_millis(50),
        ..ConnectionOptions::default()
    };
    let conn = Connection::open_with(connector(&server), options).await;
    assert!(conn.last_error().is_none(), "{:?}", conn.last_error());

    let mut inbound = conn.inbound_channel().unwrap();
    let first = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap().unwrap();
    assert_eq!(first.from_user_name, "alice");
    assert_eq!(second.text, "hello bot");

    conn.outbound_channel()
        .send(second.reply("hi {{.User}}"))
        .await
        .unwrap();

    let written = tokio::time::timeout(WAIT, written_rx.recv()).await.unwrap().unwrap();
    let written: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        written,
        json!({"type": "message", "user": "B1", "channel": "C1", "text": "hi <@U1>"})
    );
}

#[tokio::test]
async fn close_ends_a_pending_read_on_a_silent_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_url = format!("ws://{}", listener.local_addr().unwrap());

    // Accept, then never send anything or hang up.
    let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = hold_rx.await;
    });

    let server = MockServer::start().await;
    let socket = connector(&server).dial(&ws_url).await.unwrap();

    let reader = socket.clone();
    let pending = tokio::spawn(async move { reader.read_frame().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished());

    socket.close().await;
    let read = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap();
    assert_eq!(read, Ok(None));
    assert_eq!(socket.write_frame(PROBE_FRAME).await, Err(TransportError::Closed));

    drop(hold_tx);
}
