//! End-to-end tests against an in-process WebSocket server.
//!
//! Each test plays the broadcast server's side of the protocol on a loopback
//! listener: accept the subscription, answer the greeting, push frames, and
//! watch for heartbeats. Run with: cargo test --test client_e2e

use std::io::Write as _;
use std::sync::Once;
use std::time::Duration;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use bili_danmaku::message::decode_all;
use bili_danmaku::packet::{build_packet, greeting_packet, Operation};
use bili_danmaku::{DanmakuClient, DanmakuEvent};

const ROOM_ID: u64 = 14_275_133;
const UID: u64 = 141_042;
const HEARTBEAT: Duration = Duration::from_millis(30);

static LOGGING: Once = Once::new();

/// Route client log output through env_logger so failed runs show the
/// connection trace (RUST_LOG=debug for the full picture).
fn init_logging() {
    LOGGING.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .init();
    });
}

/// What the fake server observed on its side of the socket.
#[derive(Debug)]
enum ServerSaw {
    Greeting,
    Heartbeat,
}

/// Accept one connection, verify the greeting, send `frames`, then report
/// every heartbeat until the client disconnects.
async fn run_server(
    listener: TcpListener,
    frames: Vec<Message>,
    saw_tx: mpsc::UnboundedSender<ServerSaw>,
) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws: WebSocketStream<TcpStream> = tokio_tungstenite::accept_async(stream)
        .await
        .expect("ws accept");

    // First frame from the client must be the greeting
    let first = ws.next().await.expect("greeting frame").expect("greeting ok");
    let Message::Binary(buffer) = first else {
        panic!("expected binary greeting, got {first:?}");
    };
    let (messages, err) = decode_all(&buffer);
    assert!(err.is_none());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].operation, Operation::GreetingRequest);
    let body: serde_json::Value =
        serde_json::from_slice(&messages[0].body).expect("greeting body JSON");
    assert_eq!(body["uid"], UID);
    assert_eq!(body["roomid"], ROOM_ID);
    let _ = saw_tx.send(ServerSaw::Greeting);

    for frame in frames {
        ws.send(frame).await.expect("server send");
    }

    // Count heartbeats until the client goes away
    while let Some(Ok(frame)) = ws.next().await {
        if let Message::Binary(buffer) = frame {
            let (messages, _) = decode_all(&buffer);
            for message in messages {
                if message.operation == Operation::HeartbeatRequest {
                    let _ = saw_tx.send(ServerSaw::Heartbeat);
                }
            }
        }
    }
}

/// Spin up the fake server and a client pointed at it.
async fn start(
    frames: Vec<Message>,
) -> (
    DanmakuClient,
    bili_danmaku::DanmakuEvents,
    mpsc::UnboundedReceiver<ServerSaw>,
) {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let (saw_tx, saw_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_server(listener, frames, saw_tx));

    let mut client = DanmakuClient::new(ROOM_ID, UID, false)
        .with_endpoint(format!("ws://127.0.0.1:{port}/sub"))
        .with_heartbeat_interval(HEARTBEAT);
    let events = client.take_events().expect("events");
    client.connect().await.expect("connect");
    (client, events, saw_rx)
}

fn greeting_ack() -> Message {
    Message::Binary(build_packet(1, Operation::GreetingAck, 1, ""))
}

fn drain_heartbeats(saw_rx: &mut mpsc::UnboundedReceiver<ServerSaw>) -> usize {
    let mut count = 0;
    while let Ok(saw) = saw_rx.try_recv() {
        if matches!(saw, ServerSaw::Heartbeat) {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn test_open_greet_chat_close() {
    let chat = Message::Binary(build_packet(0, Operation::Chat, 1, r#"{"cmd":"X"}"#));
    let (mut client, mut events, mut saw_rx) = start(vec![greeting_ack(), chat]).await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));

    let ack = events.recv().await.expect("ack event");
    let DanmakuEvent::Message(ack) = ack else {
        panic!("expected greeting ack message, got {ack:?}");
    };
    assert_eq!(ack.operation, Operation::GreetingAck);

    let chat = events.recv().await.expect("chat event");
    let DanmakuEvent::Message(chat) = chat else {
        panic!("expected chat message, got {chat:?}");
    };
    assert_eq!(chat.operation, Operation::Chat);
    assert_eq!(chat.version, 0);
    assert_eq!(chat.body_text(), r#"{"cmd":"X"}"#);

    // The greeting ack started the keep-alive
    tokio::time::sleep(HEARTBEAT * 5).await;
    assert!(
        drain_heartbeats(&mut saw_rx) >= 1,
        "no heartbeat reached the server"
    );

    client.close().await;
    tokio::time::sleep(HEARTBEAT).await;
    drain_heartbeats(&mut saw_rx);

    // Silence after close: nothing fires in the following intervals
    tokio::time::sleep(HEARTBEAT * 4).await;
    assert_eq!(drain_heartbeats(&mut saw_rx), 0, "heartbeat after close()");

    // close() emits its own notification
    let mut saw_closed_by_client = false;
    while let Ok(event) = events.try_recv() {
        if event == DanmakuEvent::ClosedByClient {
            saw_closed_by_client = true;
        }
    }
    assert!(saw_closed_by_client);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_single_delivery_with_multiple_messages() {
    // One binary delivery packing three frames back-to-back
    let mut buffer = build_packet(1, Operation::GreetingAck, 1, "");
    buffer.extend(build_packet(0, Operation::Chat, 1, r#"{"cmd":"DANMU_MSG"}"#));
    buffer.extend(build_packet(0, Operation::Chat, 1, r#"{"cmd":"SEND_GIFT"}"#));

    let (mut client, mut events, _saw_rx) = start(vec![Message::Binary(buffer)]).await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));
    let ops: Vec<Operation> = [
        events.recv().await.expect("1st"),
        events.recv().await.expect("2nd"),
        events.recv().await.expect("3rd"),
    ]
    .into_iter()
    .map(|event| match event {
        DanmakuEvent::Message(msg) => msg.operation,
        other => panic!("expected message, got {other:?}"),
    })
    .collect();
    assert_eq!(
        ops,
        vec![Operation::GreetingAck, Operation::Chat, Operation::Chat]
    );

    client.close().await;
}

#[tokio::test]
async fn test_compressed_batch_is_unpacked() {
    // Version-2 chat frame: 16-byte header, 2-byte sub-header, raw deflate
    // stream bundling two inner chat messages.
    let mut inner = build_packet(0, Operation::Chat, 1, r#"{"cmd":"DANMU_MSG"}"#);
    inner.extend(build_packet(0, Operation::Chat, 1, r#"{"cmd":"SEND_GIFT"}"#));

    let mut encoder = DeflateEncoder::new(vec![0x78, 0x01], Compression::default());
    encoder.write_all(&inner).expect("deflate write");
    let compressed_body = encoder.finish().expect("deflate finish");

    let mut outer = Vec::new();
    {
        // build_packet takes &str; compressed bodies need raw header assembly
        let mut header = [0u8; 16];
        bili_danmaku::codec::put_u32(&mut header, 0, (16 + compressed_body.len()) as u32);
        bili_danmaku::codec::put_u16(&mut header, 4, 16);
        bili_danmaku::codec::put_u16(&mut header, 6, 2);
        bili_danmaku::codec::put_u32(&mut header, 8, Operation::Chat.code());
        bili_danmaku::codec::put_u32(&mut header, 12, 1);
        outer.extend_from_slice(&header);
        outer.extend_from_slice(&compressed_body);
    }

    let (mut client, mut events, _saw_rx) =
        start(vec![greeting_ack(), Message::Binary(outer)]).await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));
    // greeting ack
    let _ = events.recv().await.expect("ack");

    for expected in [r#"{"cmd":"DANMU_MSG"}"#, r#"{"cmd":"SEND_GIFT"}"#] {
        let event = events.recv().await.expect("inner chat");
        let DanmakuEvent::Message(msg) = event else {
            panic!("expected inner message, got {event:?}");
        };
        assert_eq!(msg.operation, Operation::Chat);
        assert_eq!(msg.body_text(), expected);
    }

    client.close().await;
}

#[tokio::test]
async fn test_text_delivery_forwarded_verbatim() {
    let (mut client, mut events, _saw_rx) = start(vec![
        Message::Text("server notice".to_string()),
        greeting_ack(),
    ])
    .await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));
    assert_eq!(
        events.recv().await,
        Some(DanmakuEvent::Text("server notice".to_string()))
    );

    client.close().await;
}

#[tokio::test]
async fn test_remote_close_stops_heartbeat_and_notifies() {
    let (client, mut events, mut saw_rx) = start(vec![
        greeting_ack(),
        Message::Close(None),
    ])
    .await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));
    let _ = events.recv().await.expect("ack");

    // Wait for the close to be observed, then for silence
    let closed = loop {
        match events.recv().await.expect("event stream open") {
            DanmakuEvent::Closed { code, .. } => break code,
            _ => continue,
        }
    };
    assert!(closed == 1005 || closed == 1000 || closed == 1006);

    tokio::time::sleep(HEARTBEAT).await;
    drain_heartbeats(&mut saw_rx);
    tokio::time::sleep(HEARTBEAT * 4).await;
    assert_eq!(
        drain_heartbeats(&mut saw_rx),
        0,
        "heartbeat kept firing after remote close"
    );

    // Connection handle still exists until an explicit close()
    assert!(client.is_connected());
    assert!(!client.is_heartbeat_running());
}

#[tokio::test]
async fn test_dropped_connection_stops_heartbeat() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws accept");
        let _ = ws.next().await; // greeting
        ws.send(greeting_ack()).await.expect("server send");
        // Hold the stream open until the client's heartbeat is observably
        // running, so the drop cannot race the mid-flight assertion below
        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Binary(buffer) = frame {
                let (messages, _) = decode_all(&buffer);
                if messages
                    .iter()
                    .any(|msg| msg.operation == Operation::HeartbeatRequest)
                {
                    break;
                }
            }
        }
        // Dropped here: the TCP stream goes away without a close handshake
    });

    let mut client = DanmakuClient::new(ROOM_ID, UID, false)
        .with_endpoint(format!("ws://127.0.0.1:{port}/sub"))
        .with_heartbeat_interval(HEARTBEAT);
    let mut events = client.take_events().expect("events");
    client.connect().await.expect("connect");

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));
    let ack = events.recv().await.expect("ack event");
    assert!(
        matches!(ack, DanmakuEvent::Message(ref msg) if msg.operation == Operation::GreetingAck)
    );
    assert!(client.is_heartbeat_running());

    // The abrupt reset may surface as a transport error before the stream
    // ends; only the end-of-stream notification carries 1006
    let code = loop {
        match events.recv().await.expect("event stream open") {
            DanmakuEvent::Closed { code, .. } => break code,
            DanmakuEvent::Error(_) | DanmakuEvent::Message(_) => continue,
            other => panic!("unexpected event {other:?}"),
        }
    };
    assert_eq!(code, 1006);
    assert!(!client.is_heartbeat_running());
    assert!(client.is_connected());

    client.close().await;
}

#[tokio::test]
async fn test_malformed_trailing_frame_keeps_valid_prefix() {
    // Valid chat frame followed by a frame whose declared length overruns
    let mut buffer = build_packet(0, Operation::Chat, 1, r#"{"cmd":"OK"}"#);
    let mut bad = build_packet(0, Operation::Chat, 1, "overrun");
    bili_danmaku::codec::put_u32(&mut bad, 0, 60_000);
    buffer.extend(bad);

    let (mut client, mut events, _saw_rx) = start(vec![Message::Binary(buffer)]).await;

    assert_eq!(events.recv().await, Some(DanmakuEvent::Opened));

    let good = events.recv().await.expect("valid prefix message");
    let DanmakuEvent::Message(msg) = good else {
        panic!("expected message, got {good:?}");
    };
    assert_eq!(msg.body_text(), r#"{"cmd":"OK"}"#);

    let err = events.recv().await.expect("decode error event");
    assert!(matches!(
        err,
        DanmakuEvent::Error(bili_danmaku::DanmakuError::Decode(_))
    ));

    client.close().await;
}
