//! Self-test outcomes against real servers on ephemeral ports

use echosock::prelude::*;
use echosock::selftest::{DEFAULT_PAYLOAD, DEFAULT_TIMEOUT};
use echosock_server::Connection;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpListener;

/// Closes every connection without reading anything
#[derive(Debug, Clone)]
struct HangUp;

impl Handler for HangUp {
    fn handle<'a>(
        &'a self,
        conn: &'a mut Connection,
    ) -> Pin<Box<dyn Future<Output = echosock_core::Result<()>> + Send + 'a>> {
        Box::pin(async move { conn.close(CloseCode::Normal, "").await })
    }

    fn clone_box(&self) -> Box<dyn Handler> {
        Box::new(self.clone())
    }
}

/// Answers every message with the same fixed text
#[derive(Debug, Clone)]
struct Shout;

impl Handler for Shout {
    fn handle<'a>(
        &'a self,
        conn: &'a mut Connection,
    ) -> Pin<Box<dyn Future<Output = echosock_core::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            while let Some(message) = conn.next().await? {
                if message.is_data() {
                    conn.send_text("HELLO").await?;
                }
            }
            Ok(())
        })
    }

    fn clone_box(&self) -> Box<dyn Handler> {
        Box::new(self.clone())
    }
}

async fn start<H: Handler>(handler: H) -> SocketAddr {
    let bound = Server::builder()
        .bind("127.0.0.1:0")
        .unwrap()
        .build_with_handler(handler)
        .unwrap()
        .bind()
        .await
        .unwrap();
    let addr = bound.local_addr();
    tokio::spawn(bound.serve());
    addr
}

#[tokio::test]
async fn test_self_test_against_echo_server() {
    let server = echosock::app::bind(0).await.unwrap();
    let port = server.local_addr().port();
    tokio::spawn(server.serve());

    let report = SelfTest::new(port).run().await.unwrap();
    assert_eq!(report.reply, DEFAULT_PAYLOAD);
    assert!(report.round_trip < DEFAULT_TIMEOUT);
}

#[tokio::test]
async fn test_self_test_custom_payload() {
    let addr = start(EchoHandler::new()).await;

    let report = SelfTest::for_addr(addr)
        .payload("héllo ✓")
        .run()
        .await
        .unwrap();
    assert_eq!(report.reply, "héllo ✓");
}

#[tokio::test]
async fn test_self_test_times_out_when_nothing_answers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let result = SelfTest::for_addr(addr)
        .timeout(Duration::from_millis(200))
        .run()
        .await;
    assert!(matches!(result, Err(SelfTestError::Timeout(t)) if t == Duration::from_millis(200)));
    silent.abort();
}

#[tokio::test]
async fn test_self_test_reports_missing_reply() {
    let addr = start(HangUp).await;

    let result = SelfTest::for_addr(addr).run().await;
    assert!(matches!(result, Err(SelfTestError::NoReply)), "{result:?}");
}

#[tokio::test]
async fn test_self_test_reports_mismatch() {
    let addr = start(Shout).await;

    match SelfTest::for_addr(addr).run().await {
        Err(SelfTestError::Mismatch { expected, received }) => {
            assert_eq!(expected, "hello");
            assert_eq!(received, Message::text("HELLO"));
        }
        other => panic!("expected a mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_self_test_reports_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = SelfTest::for_addr(addr).run().await;
    assert!(matches!(result, Err(SelfTestError::Client(_))));
}
