//! Integration tests for the Haver server over real TCP connections.

use std::time::Duration;

use haver::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

// =========================================================================
// Helpers
// =========================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: HaverServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .hostname("test.host")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(HaverServer::builder()).await
}

/// A raw line-protocol client.
struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    /// Sends a line built from tab-joined fields.
    async fn send(&mut self, fields: &[&str]) {
        self.send_raw(&format!("{}\r\n", fields.join("\t"))).await;
    }

    async fn send_raw(&mut self, data: &str) {
        self.writer
            .write_all(data.as_bytes())
            .await
            .expect("send");
    }

    /// Next line without its terminator, or `None` once the server hangs up.
    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        match tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) | Ok(Err(_)) => None,
            Ok(Ok(_)) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(_) => panic!("timed out waiting for a line"),
        }
    }

    async fn expect(&mut self, fields: &[&str]) {
        assert_eq!(self.recv().await.as_deref(), Some(fields.join("\t").as_str()));
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.recv().await, None);
    }

    async fn handshake(addr: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&["HAVER", "tester/1.0"]).await;
        let reply = client.recv().await.expect("HAVER reply");
        assert!(reply.starts_with("HAVER\ttest.host\t"), "{reply:?}");
        client
    }

    async fn login(addr: &str, name: &str) -> Self {
        let mut client = Self::handshake(addr).await;
        client.send(&["IDENT", name]).await;
        client.expect(&["HELLO", name, "127.0.0.1"]).await;
        client
    }
}

/// Opens `room` as the first client and has everyone join, consuming the
/// JOIN notices.
async fn room_with(room: &str, clients: &mut [&mut Client]) {
    clients[0].send(&["OPEN", room]).await;
    clients[0].expect(&["OPEN", room]).await;
    for i in 0..clients.len() {
        clients[i].send(&["JOIN", room]).await;
        // The joiner and every earlier member see the JOIN.
        for j in 0..=i {
            let line = clients[j].recv().await.expect("JOIN notice");
            assert!(line.starts_with(&format!("JOIN\t{room}\t")), "{line:?}");
        }
    }
}

// =========================================================================
// Handshake and login
// =========================================================================

#[tokio::test]
async fn test_handshake_reply() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    client.send(&["HAVER", "tester/1.0", "spoon"]).await;

    let reply = client.recv().await.expect("reply");
    let fields: Vec<&str> = reply.split('\t').collect();
    assert_eq!(fields[0], "HAVER");
    assert_eq!(fields[1], "test.host");
    assert!(fields[2].starts_with("haver/"));
    assert_eq!(fields[3], "ghost,secure,spoon");
}

#[tokio::test]
async fn test_login() {
    let addr = start_server().await;
    let _alice = Client::login(&addr, "alice").await;
}

#[tokio::test]
async fn test_duplicate_name_fails() {
    let addr = start_server().await;
    let _alice = Client::login(&addr, "alice").await;
    let mut other = Client::handshake(&addr).await;

    other.send(&["IDENT", "alice"]).await;

    other.expect(&["FAIL", "IDENT", "existing.entity", "alice"]).await;

    // Still in login; a free name works.
    other.send(&["IDENT", "alice2"]).await;
    other.expect(&["HELLO", "alice2", "127.0.0.1"]).await;
}

#[tokio::test]
async fn test_garbage_before_handshake_closes_silently() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    client.send(&["IDENT", "alice"]).await;

    client.expect_closed().await;
}

#[tokio::test]
async fn test_bare_newline_terminator_accepted() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    client.send_raw("HAVER\ttester/1.0\n").await;

    let reply = client.recv().await.expect("reply");
    assert!(reply.starts_with("HAVER\t"));
}

// =========================================================================
// Messaging
// =========================================================================

#[tokio::test]
async fn test_room_conversation() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;
    room_with("lobby", &mut [&mut alice, &mut bob]).await;

    alice.send(&["IN", "lobby", "say", "hi"]).await;

    alice.expect(&["IN", "lobby", "alice", "say", "hi"]).await;
    bob.expect(&["IN", "lobby", "alice", "say", "hi"]).await;
}

#[tokio::test]
async fn test_escaped_fields_survive_the_trip() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;

    alice.send(&["TO", "bob", "say", "one\x1btwo\x1bnthree"]).await;

    bob.expect(&["FROM", "alice", "say", "one\x1btwo\x1bnthree"]).await;
}

#[tokio::test]
async fn test_unknown_command_is_recoverable() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;

    alice.send(&["DANCE"]).await;
    alice.expect(&["FAIL", "DANCE", "unknown.command", "DANCE"]).await;

    alice.send(&["POKE", "still-here"]).await;
    alice.expect(&["OUCH", "still-here"]).await;
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test]
async fn test_bye() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;
    room_with("lobby", &mut [&mut alice, &mut bob]).await;

    bob.send(&["BYE", "later"]).await;

    bob.expect(&["PART", "lobby", "bob", "bye", "later"]).await;
    bob.expect(&["BYE", "bye"]).await;
    bob.expect_closed().await;
    alice.expect(&["PART", "lobby", "bob", "bye", "later"]).await;
}

#[tokio::test]
async fn test_dropped_connection_parts_rooms() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;
    room_with("lobby", &mut [&mut alice, &mut bob]).await;

    drop(bob);

    alice.expect(&["PART", "lobby", "bob", "closed"]).await;

    // The name is free again.
    let _bob = Client::login(&addr, "bob").await;
}

#[tokio::test]
async fn test_malformed_command_borks() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;

    alice.send(&["poke", "x"]).await;

    let line = alice.recv().await.expect("BORK");
    assert!(line.starts_with("BORK\t"), "{line:?}");
    alice.expect_closed().await;
}

#[tokio::test]
async fn test_overlong_line_borks() {
    let addr = start_server_with(HaverServer::builder().max_line_length(64)).await;
    let mut alice = Client::login(&addr, "alice").await;

    let long = "x".repeat(200);
    alice.send(&["POKE", long.as_str()]).await;

    alice.expect(&["BORK", "line exceeds 64 bytes"]).await;
    alice.expect_closed().await;
}

#[tokio::test]
async fn test_invalid_utf8_borks_and_quits_with_bork() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;
    room_with("lobby", &mut [&mut alice, &mut bob]).await;

    alice.writer.write_all(b"POKE\t\xff\xfe\r\n").await.expect("send");

    alice.expect(&["PART", "lobby", "alice", "bork"]).await;
    alice.expect(&["BORK", "malformed line"]).await;
    alice.expect_closed().await;
    bob.expect(&["PART", "lobby", "alice", "bork"]).await;
}

// =========================================================================
// Ghost and detach
// =========================================================================

#[tokio::test]
async fn test_ghost_takes_over_name() {
    let addr = start_server().await;
    let mut old = Client::login(&addr, "alice").await;
    let mut new = Client::handshake(&addr).await;

    new.send(&["GHOST", "alice"]).await;

    new.expect(&["HELLO", "alice", "127.0.0.1"]).await;
    old.expect(&["BYE", "ghost"]).await;
    old.expect_closed().await;

    new.send(&["POKE", "mine"]).await;
    new.expect(&["OUCH", "mine"]).await;
}

#[tokio::test]
async fn test_detach_and_reattach() {
    let addr = start_server().await;
    let mut alice = Client::login(&addr, "alice").await;
    let mut bob = Client::login(&addr, "bob").await;

    alice.send(&["SPOON:DETACH", "s3cret"]).await;
    alice.expect(&["SPOON:DETACH", "alice"]).await;
    alice.expect_closed().await;

    bob.send(&["TO", "alice", "say", "are you there?"]).await;
    // Round trip so the TO has been handled before reattaching.
    bob.send(&["POKE", "sync"]).await;
    bob.expect(&["OUCH", "sync"]).await;

    let mut back = Client::handshake(&addr).await;
    back.send(&["SPOON:ATTACH", "alice", "s3cret"]).await;
    back.expect(&["HELLO", "alice", "127.0.0.1"]).await;
    let log = back.recv().await.expect("SPOON:LOG");
    let fields: Vec<&str> = log.split('\t').collect();
    assert_eq!(fields[0], "SPOON:LOG");
    assert_eq!(&fields[2..], ["FROM", "bob", "say", "are you there?"]);
    back.expect(&["SPOON:END", "1"]).await;
}

// =========================================================================
// Liveness
// =========================================================================

fn fast_liveness() -> LivenessConfig {
    LivenessConfig {
        interval: Duration::from_millis(100),
        timeout: Duration::from_millis(100),
        initial_jitter: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_silent_client_is_pinged_then_dropped() {
    let addr = start_server_with(HaverServer::builder().liveness(fast_liveness())).await;
    let mut alice = Client::login(&addr, "alice").await;

    let ping = alice.recv().await.expect("PING");
    assert!(ping.starts_with("PING\t"), "{ping:?}");

    alice.expect(&["BYE", "ping"]).await;
    alice.expect_closed().await;
}

#[tokio::test]
async fn test_pong_keeps_client_connected() {
    let addr = start_server_with(HaverServer::builder().liveness(fast_liveness())).await;
    let mut alice = Client::login(&addr, "alice").await;

    for _ in 0..3 {
        let ping = alice.recv().await.expect("PING");
        let token = ping.strip_prefix("PING\t").expect("PING token");
        alice.send(&["PONG", token]).await;
    }

    alice.send(&["POKE", "alive"]).await;
    let mut saw_ouch = false;
    while let Some(line) = alice.recv().await {
        if line == "OUCH\talive" {
            saw_ouch = true;
            break;
        }
        assert!(line.starts_with("PING\t"), "{line:?}");
    }
    assert!(saw_ouch);
}
