//! Event stream and sinks against live servers

use bytes::Bytes;
use echosock_client::prelude::*;
use echosock_core::error::Error;
use echosock_core::handshake::{
    create_server_handshake, parse_client_handshake, validate_client_handshake,
};
use echosock_server::Server;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn start_echo_server(max_message_size: Option<usize>) -> SocketAddr {
    let mut builder = Server::builder().bind("127.0.0.1:0").unwrap();
    if let Some(max) = max_message_size {
        builder = builder.max_message_size(max);
    }
    let bound = builder.build().unwrap().bind().await.unwrap();
    let addr = bound.local_addr();
    tokio::spawn(bound.serve());
    addr
}

async fn connect(addr: SocketAddr) -> ClientConnection {
    Client::new(&format!("ws://{addr}/"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_event_stream_lifecycle() {
    let addr = start_echo_server(None).await;
    let mut conn = connect(addr).await;

    assert!(matches!(conn.events().next().await, Some(StreamEvent::Connect)));

    let pong_data = Bytes::from(rand_bytes());
    conn.ping(pong_data.clone()).await.unwrap();
    assert!(matches!(
        conn.events().next().await,
        Some(StreamEvent::Pong(data)) if data == pong_data
    ));

    let data = Bytes::from(rand_bytes());
    conn.send_binary(data.clone()).await.unwrap();
    assert!(matches!(
        conn.events().next().await,
        Some(StreamEvent::Data(received)) if received == data
    ));

    conn.send_text("foobar").await.unwrap();
    assert!(matches!(
        conn.events().next().await,
        Some(StreamEvent::Text(text)) if text == "foobar"
    ));

    conn.close(CloseCode::Normal, "").await.unwrap();
    assert!(matches!(
        conn.events().next().await,
        Some(StreamEvent::Disconnect(None))
    ));

    // No second connect once the connection is gone
    assert!(conn.events().next().await.is_none());
}

#[tokio::test]
async fn test_text_sink_sends_after_connect() {
    let addr = start_echo_server(None).await;
    let mut conn = connect(addr).await;

    let mut events = conn.events();
    assert!(matches!(events.next().await, Some(StreamEvent::Connect)));
    drop(events);

    conn.text_sink()
        .send("someMessage".to_string())
        .await
        .unwrap();

    let texts: Vec<String> = conn
        .events()
        .filter_map(|event| async move {
            match event {
                StreamEvent::Text(text) => Some(text),
                _ => None,
            }
        })
        .take(1)
        .collect()
        .await;
    assert_eq!(texts, vec!["someMessage".to_string()]);
}

#[tokio::test]
async fn test_data_sink_forwards_a_stream() {
    let addr = start_echo_server(None).await;
    let mut conn = connect(addr).await;

    let chunks = vec![
        Bytes::from_static(b"some"),
        Bytes::from_static(b"Message"),
    ];
    let mut outgoing = futures_util::stream::iter(chunks.clone()).map(Ok);
    conn.data_sink().send_all(&mut outgoing).await.unwrap();

    let received: Vec<Bytes> = conn
        .events()
        .filter_map(|event| async move {
            match event {
                StreamEvent::Data(data) => Some(data),
                _ => None,
            }
        })
        .take(2)
        .collect()
        .await;
    assert_eq!(received, chunks);
}

#[tokio::test]
async fn test_disconnect_carries_peer_close_error() {
    let addr = start_echo_server(Some(8)).await;
    let mut conn = connect(addr).await;

    conn.send_text("longer than eight bytes").await.unwrap();

    let events: Vec<StreamEvent> = conn.events().collect().await;
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(events[0], StreamEvent::Connect));
    match &events[1] {
        StreamEvent::Disconnect(Some(Error::PeerClosed(frame))) => {
            assert_eq!(frame.code, CloseCode::TooBig);
        }
        other => panic!("expected a disconnect with an error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_without_close_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 512];
        let request = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some((request, _)) = parse_client_handshake(&buf).unwrap() {
                break request;
            }
        };
        let key = validate_client_handshake(&request).unwrap();
        let response = create_server_handshake(&key).unwrap();
        socket.write_all(&response.to_bytes()).await.unwrap();
        // Hang up without a close frame
    });

    let mut conn = connect(addr).await;
    let events: Vec<StreamEvent> = conn.events().collect().await;

    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(events[0], StreamEvent::Connect));
    assert!(matches!(
        events[1],
        StreamEvent::Disconnect(Some(Error::ConnectionClosed))
    ));
}

fn rand_bytes() -> Vec<u8> {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    seed.to_le_bytes().to_vec()
}
