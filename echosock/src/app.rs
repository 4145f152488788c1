//! Process wiring: bind, self-test, serve.

use crate::cli::Cli;
use crate::selftest::SelfTest;
use anyhow::Context;
use echosock_server::{BoundServer, Server};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Bind the echo server on `127.0.0.1:<port>`
pub async fn bind(port: u16) -> anyhow::Result<BoundServer> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let server = Server::builder()
        .bind(addr)
        .and_then(|builder| builder.build())
        .context("invalid server configuration")?;

    server
        .bind()
        .await
        .with_context(|| format!("failed to listen on {addr}"))
}

/// Run `test` and log its outcome. Returns whether it passed.
pub async fn run_self_test(test: SelfTest) -> bool {
    match test.run().await {
        Ok(report) => {
            tracing::info!("Self-test passed: {}", report);
            true
        }
        Err(e) => {
            tracing::error!("Self-test against {} failed: {}", test.url(), e);
            false
        }
    }
}

/// Start `test` on `executor` without waiting for it
pub fn spawn_self_test(executor: &Handle, test: SelfTest) -> JoinHandle<bool> {
    executor.spawn(run_self_test(test))
}

/// Wait for a spawned self-test. A task that panicked or was cancelled is
/// logged and counts as a failure.
pub async fn await_self_test(task: JoinHandle<bool>) -> bool {
    match task.await {
        Ok(passed) => passed,
        Err(e) => {
            tracing::error!("Self-test task did not finish: {}", e);
            false
        }
    }
}

/// Bind, start the self-test and serve forever.
///
/// Only a bind failure ends this early. The self-test outcome, including a
/// panic inside it, is only logged; the server keeps serving either way.
pub async fn run(cli: Cli, executor: Handle) -> anyhow::Result<()> {
    let server = bind(cli.port).await?;
    let addr = server.local_addr();

    let self_test = spawn_self_test(&executor, SelfTest::new(addr.port()));
    executor.spawn(await_self_test(self_test));

    server.serve().await.context("server stopped")
}
