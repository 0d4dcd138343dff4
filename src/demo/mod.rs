//! Demo canvas: a counter that controllers can read and drive

mod counter;

pub use counter::{Counter, CounterState, Mode};

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use canvas_core::CanvasServer;
use tokio::sync::Notify;

/// Serve a counter canvas until `shutdown` resolves or a controller sends
/// `close`, then stop the server
///
/// Returns the counter's final state.
pub async fn run<F>(socket_dir: &Path, id: &str, shutdown: F) -> Result<CounterState>
where
    F: Future<Output = ()>,
{
    let counter = Counter::new();
    let mut server = CanvasServer::bind_in(socket_dir, id)?;
    server.set_model(counter.model());

    let closed = Arc::new(Notify::new());
    let notify = closed.clone();
    server.on_close(move || notify.notify_one());

    server.start()?;
    tracing::info!("demo canvas {} ready at {}", id, server.socket_path().display());

    tokio::select! {
        _ = shutdown => tracing::info!("demo canvas {} interrupted", id),
        _ = closed.notified() => tracing::info!("demo canvas {} closed by controller", id),
    }

    server.stop().await;
    Ok(counter.current())
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::ipc::address::socket_path_in;
    use canvas_core::ipc::protocol::KeyPayload;
    use canvas_core::CanvasClient;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_until_close_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path_in(dir.path(), "counter");

        let canvas = {
            let dir = dir.path().to_path_buf();
            tokio::spawn(async move { run(&dir, "counter", std::future::pending()).await })
        };

        let client = CanvasClient::with_socket(&path);
        for _ in 0..50 {
            if client.ping().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        client.send_key("up").await.unwrap();
        let plus = KeyPayload {
            key: "runes".to_string(),
            rune: Some('+'),
        };
        client.send_key_payload(&plus).await.unwrap();
        client.send_input("40").await.unwrap();
        client.send_key("k").await.unwrap();

        let state = client.state().await.unwrap();
        assert_eq!(state.custom["count"], serde_json::json!(41));
        let view = client.view().await.unwrap();
        assert!(view.content.contains("41"));

        let err = client.send_key("f5").await.unwrap_err();
        assert_eq!(err.remote_code(), Some("key_error"));

        client.close().await.unwrap();
        let final_state = canvas.await.unwrap().unwrap();
        assert_eq!(final_state.count, 41);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let state = run(dir.path(), "interrupted", async {}).await.unwrap();
        assert_eq!(state.count, 0);
        assert!(!socket_path_in(dir.path(), "interrupted").exists());
    }
}
