//! Integration tests for the hub server, driver, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use vigil::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const ADMIN: AccountId = AccountId(1);
const MONITOR: AccountId = AccountId(2);

struct Fixture {
    addr: String,
    feed: AdminFeed,
    directory: InMemoryDirectory,
}

impl Fixture {
    fn token(&self, id: AccountId) -> String {
        self.directory.issue_session(id).expect("account exists")
    }
}

/// Starts a server on a random port with one admin and one monitor.
async fn start_server() -> Fixture {
    start_server_with(HubServerBuilder::new()).await
}

async fn start_server_with(builder: HubServerBuilder) -> Fixture {
    let directory = InMemoryDirectory::new();
    directory.insert(Account {
        id: ADMIN,
        user_name: "admin".into(),
        role: Role::Admin,
    });
    directory.insert(Account {
        id: MONITOR,
        user_name: "monitor".into(),
        role: Role::Monitor,
    });

    let server = builder
        .bind("127.0.0.1:0")
        .build(SessionOracle::new(directory.clone()))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let feed = server.feed();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Fixture {
        addr,
        feed,
        directory,
    }
}

async fn connect(addr: &str, cookie: Option<&str>) -> ClientWs {
    let mut request = format!("ws://{addr}/hub/admin")
        .into_client_request()
        .expect("valid url");
    if let Some(token) = cookie {
        request.headers_mut().insert(
            "Cookie",
            format!("GZCTF_Token={token}").parse().expect("valid header"),
        );
    }
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("should connect");
    ws
}

/// Waits until the hub has exactly `n` registered connections.
async fn wait_for_connections(feed: &AdminFeed, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while feed.connection_count().await != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub never reached {n} connections"));
}

fn log(msg: &str) -> LogMessage {
    LogMessage {
        time: 1_700_000_000_000,
        name: Some("admin".into()),
        ip: Some("10.0.0.1".into()),
        msg: msg.into(),
        status: None,
        level: LogLevel::Information,
    }
}

async fn next_envelope(ws: &mut ClientWs) -> Envelope {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("push should arrive")
        .expect("stream open")
        .expect("valid frame");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

/// Asserts that no data frame arrives within a short window.
async fn assert_silent(ws: &mut ClientWs) {
    match tokio::time::timeout(Duration::from_millis(200), ws.next()).await {
        Err(_) => {}
        Ok(None) | Ok(Some(Err(_))) => {}
        Ok(Some(Ok(Message::Close(_)))) => {}
        Ok(Some(Ok(other))) => panic!("unexpected frame: {other:?}"),
    }
}

/// Asserts that the server tears the connection down without sending any
/// data frame first.
async fn assert_dropped_without_data(ws: &mut ClientWs) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let next = tokio::time::timeout_at(deadline, ws.next())
            .await
            .expect("server should drop the connection");
        match next {
            None | Some(Err(_)) => return,
            Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                panic!("rejected connection received data")
            }
            Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test]
async fn test_admin_receives_log_push() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;

    let delivered = fx.feed.push_log(log("flag submitted")).await.expect("push");
    assert_eq!(delivered, 1);

    let env = next_envelope(&mut ws).await;
    assert_eq!(env.seq, 1);
    match env.payload {
        Push::Log(entry) => {
            assert_eq!(entry.msg, "flag submitted");
            assert_eq!(entry.ip.as_deref(), Some("10.0.0.1"));
        }
    }
}

#[tokio::test]
async fn test_push_is_framed_as_received_log_method() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;

    fx.feed.push_log(log("hello")).await.expect("push");

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("push should arrive")
        .expect("stream open")
        .expect("valid frame");
    assert!(msg.is_text());
    let value: serde_json::Value =
        serde_json::from_slice(&msg.into_data()).expect("json");
    assert_eq!(value["payload"]["method"], "ReceivedLog");
    assert_eq!(value["payload"]["args"]["msg"], "hello");
}

#[tokio::test]
async fn test_anonymous_connection_is_dropped_without_data() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, None).await;

    assert_dropped_without_data(&mut ws).await;
    assert_eq!(fx.feed.connection_count().await, 0);
}

#[tokio::test]
async fn test_non_admin_connection_is_dropped_without_data() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(MONITOR))).await;

    assert_dropped_without_data(&mut ws).await;
    assert_eq!(fx.feed.connection_count().await, 0);
    assert_eq!(fx.feed.push_log(log("secret")).await.expect("push"), 0);
}

#[tokio::test]
async fn test_unknown_token_is_dropped_without_data() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some("0123456789abcdef")).await;

    assert_dropped_without_data(&mut ws).await;
    assert_eq!(fx.feed.connection_count().await, 0);
}

#[tokio::test]
async fn test_query_token_is_accepted() {
    let fx = start_server().await;
    let token = fx.token(ADMIN);
    let (mut ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{}/hub/admin?access_token={token}",
        fx.addr
    ))
    .await
    .expect("should connect");
    wait_for_connections(&fx.feed, 1).await;

    fx.feed.push_log(log("via query")).await.expect("push");
    let env = next_envelope(&mut ws).await;
    assert!(matches!(env.payload, Push::Log(ref l) if l.msg == "via query"));
}

// =========================================================================
// Revocation
// =========================================================================

#[tokio::test]
async fn test_revoked_admin_keeps_open_connection_but_cannot_reconnect() {
    let fx = start_server().await;
    let token = fx.token(ADMIN);
    let mut first = connect(&fx.addr, Some(&token)).await;
    wait_for_connections(&fx.feed, 1).await;

    assert!(fx.directory.set_role(ADMIN, Role::User));

    // Admission is decided once: the existing connection stays.
    fx.feed.push_log(log("still here")).await.expect("push");
    let env = next_envelope(&mut first).await;
    assert!(matches!(env.payload, Push::Log(ref l) if l.msg == "still here"));

    let mut second = connect(&fx.addr, Some(&token)).await;
    assert_dropped_without_data(&mut second).await;
    assert_eq!(fx.feed.connection_count().await, 1);
}

#[tokio::test]
async fn test_revoked_session_token_is_rejected() {
    let fx = start_server().await;
    let token = fx.token(ADMIN);
    assert!(fx.directory.revoke_session(&token));

    let mut ws = connect(&fx.addr, Some(&token)).await;
    assert_dropped_without_data(&mut ws).await;
}

// =========================================================================
// Targeting and lifecycle
// =========================================================================

#[tokio::test]
async fn test_push_log_to_group_reaches_only_members() {
    let fx = start_server().await;
    let mut alpha = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;
    let alpha_id = fx.feed.connections().await[0];

    let mut beta = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 2).await;

    fx.feed.add_to_group(alpha_id, "game-7").await.expect("join group");
    let delivered = fx
        .feed
        .push_log_to("game-7", log("scoreboard updated"))
        .await
        .expect("push");
    assert_eq!(delivered, 1);

    let env = next_envelope(&mut alpha).await;
    assert!(matches!(env.payload, Push::Log(ref l) if l.msg == "scoreboard updated"));
    assert_silent(&mut beta).await;

    assert!(fx.feed.remove_from_group(alpha_id, "game-7").await);
    assert_eq!(fx.feed.push_log_to("game-7", log("nobody")).await.expect("push"), 0);
}

#[tokio::test]
async fn test_inbound_frames_are_ignored() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;

    ws.send(Message::Text("hello server".into())).await.expect("send");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fx.feed.connection_count().await, 1);

    fx.feed.push_log(log("after inbound")).await.expect("push");
    let env = next_envelope(&mut ws).await;
    assert!(matches!(env.payload, Push::Log(ref l) if l.msg == "after inbound"));
}

#[tokio::test]
async fn test_client_close_unregisters_connection() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;

    ws.close(None).await.expect("close");
    wait_for_connections(&fx.feed, 0).await;
    assert_eq!(fx.feed.push_log(log("gone")).await.expect("push"), 0);
}

#[tokio::test]
async fn test_sequence_numbers_increase_across_pushes() {
    let fx = start_server().await;
    let mut ws = connect(&fx.addr, Some(&fx.token(ADMIN))).await;
    wait_for_connections(&fx.feed, 1).await;

    for i in 0..3 {
        fx.feed.push_log(log(&format!("line {i}"))).await.expect("push");
    }
    let seqs: Vec<u64> = [
        next_envelope(&mut ws).await.seq,
        next_envelope(&mut ws).await.seq,
        next_envelope(&mut ws).await.seq,
    ]
    .to_vec();
    assert_eq!(seqs, vec![1, 2, 3]);
}

// =========================================================================
// Upgrade handshake
// =========================================================================

#[tokio::test]
async fn test_silent_peer_does_not_block_admission() {
    let fx = start_server().await;

    // Connects at the TCP level and never sends an upgrade request.
    let _idle = tokio::net::TcpStream::connect(&fx.addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut ws = tokio::time::timeout(
        Duration::from_secs(2),
        connect(&fx.addr, Some(&fx.token(ADMIN))),
    )
    .await
    .expect("admin upgrade should not wait behind the idle peer");
    wait_for_connections(&fx.feed, 1).await;

    fx.feed.push_log(log("past the idle peer")).await.expect("push");
    let env = next_envelope(&mut ws).await;
    assert!(matches!(env.payload, Push::Log(ref l) if l.msg == "past the idle peer"));
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_upgrade_timeout() {
    let fx = start_server_with(
        HubServerBuilder::new().upgrade_timeout(Duration::from_millis(100)),
    )
    .await;

    let mut idle = tokio::net::TcpStream::connect(&fx.addr)
        .await
        .expect("tcp connect");

    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
        .await
        .expect("server should close the idle socket");
    assert!(matches!(read, Ok(0) | Err(_)), "no bytes before close");
    assert_eq!(fx.feed.connection_count().await, 0);
}
