//! Client tests against a live echo server and hand-written peers

use echosock_client::prelude::*;
use echosock_core::error::{Error, ProtocolError, TimeoutError};
use echosock_core::ConnectionState;
use echosock_server::Server;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn start_echo_server() -> SocketAddr {
    let bound = Server::builder()
        .bind("127.0.0.1:0")
        .unwrap()
        .build()
        .unwrap()
        .bind()
        .await
        .unwrap();
    let addr = bound.local_addr();
    tokio::spawn(bound.serve());
    addr
}

#[tokio::test]
async fn test_client_round_trip() {
    let addr = start_echo_server().await;
    let mut conn = Client::new(&format!("ws://{addr}/"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    assert_eq!(conn.remote_addr(), addr);
    assert_eq!(conn.metadata().path, "/");

    conn.send_text("hello").await.unwrap();
    assert_eq!(conn.next().await.unwrap(), Some(Message::text("hello")));

    conn.send_binary(vec![0u8, 255, 7]).await.unwrap();
    assert_eq!(
        conn.next().await.unwrap(),
        Some(Message::binary(vec![0u8, 255, 7]))
    );

    conn.ping("are you there").await.unwrap();
    assert_eq!(
        conn.next().await.unwrap(),
        Some(Message::Pong("are you there".into()))
    );

    conn.close(CloseCode::Normal, "").await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.metadata().messages_sent, 2);
    assert_eq!(conn.metadata().messages_received, 2);
}

#[tokio::test]
async fn test_client_reports_unexpected_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });

    let result = Client::new(&format!("ws://{addr}/")).unwrap().connect().await;
    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::UnexpectedStatus(400)))
    ));
}

#[tokio::test]
async fn test_client_rejects_wrong_accept_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 101 Switching Protocols\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Accept: bm90IHRoZSByaWdodCBrZXk=\r\n\r\n",
            )
            .await
            .unwrap();
    });

    let result = Client::new(&format!("ws://{addr}/")).unwrap().connect().await;
    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::InvalidAcceptKey { .. }))
    ));
}

#[tokio::test]
async fn test_client_handshake_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let config = ClientConfig::default().handshake_timeout(Duration::from_millis(100));
    let result = Client::new(&format!("ws://{addr}/"))
        .unwrap()
        .with_config(config)
        .connect()
        .await;
    assert!(matches!(
        result,
        Err(Error::Timeout(TimeoutError::Handshake { .. }))
    ));
    silent.abort();
}

#[tokio::test]
async fn test_client_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = Client::new(&format!("ws://{addr}/")).unwrap().connect().await;
    assert!(matches!(result, Err(Error::Io(_))));
}

#[tokio::test]
async fn test_client_closed_during_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
    });

    let result = Client::new(&format!("ws://{addr}/")).unwrap().connect().await;
    assert!(matches!(result, Err(Error::ConnectionClosed)));
}

#[test]
fn test_client_rejects_other_schemes() {
    assert!(matches!(
        Client::new("https://127.0.0.1/"),
        Err(Error::Protocol(ProtocolError::UnsupportedScheme(_)))
    ));
}
