//! Canvas discovery
//!
//! Lists every `*.sock` entry in the socket directory and pings each one.
//! There is no registry and no heartbeat, so a canvas whose accept loop
//! died, or whose model has no state provider, shows up as dead.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ClientSettings;
use crate::ipc::address::{canvas_id_from_socket, socket_dir};
use crate::ipc::client::CanvasClient;

/// Liveness of a discovered canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasStatus {
    Alive,
    Dead,
}

/// A socket found in the socket directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasEntry {
    pub id: String,
    pub status: CanvasStatus,
}

impl CanvasEntry {
    pub fn is_alive(&self) -> bool {
        self.status == CanvasStatus::Alive
    }
}

/// List canvases in the default socket directory
pub async fn list_canvases() -> std::io::Result<Vec<CanvasEntry>> {
    list_canvases_in(&socket_dir(), &ClientSettings::default()).await
}

/// List canvases in `dir`, sorted by id
///
/// A missing directory means no canvases.
pub async fn list_canvases_in(
    dir: &Path,
    settings: &ClientSettings,
) -> std::io::Result<Vec<CanvasEntry>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut canvases = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(id) = canvas_id_from_socket(&path) else {
            continue;
        };

        let client = CanvasClient::with_socket(path)
            .with_timeouts(settings.connect_timeout(), settings.request_timeout());
        let status = if client.ping().await {
            CanvasStatus::Alive
        } else {
            CanvasStatus::Dead
        };
        canvases.push(CanvasEntry { id, status });
    }

    canvases.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(canvases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_canvases_in(&dir.path().join("absent"), &ClientSettings::default())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_dead() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ghost.sock"), b"").unwrap();
        std::fs::write(dir.path().join("ghost.pane"), b"%3").unwrap();

        let result = list_canvases_in(dir.path(), &ClientSettings::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            vec![CanvasEntry {
                id: "ghost".to_string(),
                status: CanvasStatus::Dead,
            }]
        );
        assert!(!result[0].is_alive());
    }

    #[test]
    fn test_entry_serialization() {
        let entry = CanvasEntry {
            id: "picker".to_string(),
            status: CanvasStatus::Alive,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"id":"picker","status":"alive"}"#);
    }
}
