//! Canvas addressing
//!
//! A canvas id maps to `<tmp-dir>/opencode-canvas/<id>.sock`. There is no
//! registry: the socket directory itself is the list of canvases.

use std::path::{Path, PathBuf};

/// Name of the socket directory under the system temp dir
pub const SOCKET_DIR_NAME: &str = "opencode-canvas";

/// Environment variable naming the canvas id
pub const CANVAS_ID_ENV: &str = "CANVAS_ID";

/// Environment variable enabling canvas mode in wrapped programs
pub const CANVAS_MODE_ENV: &str = "OPENCODE_CANVAS";

const SOCKET_EXT: &str = "sock";
const PANE_EXT: &str = "pane";

/// Get the default socket directory
pub fn socket_dir() -> PathBuf {
    std::env::temp_dir().join(SOCKET_DIR_NAME)
}

/// Get the socket path for a canvas id in the default directory
pub fn socket_path(id: &str) -> PathBuf {
    socket_path_in(&socket_dir(), id)
}

/// Get the socket path for a canvas id in `dir`
pub fn socket_path_in(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{SOCKET_EXT}"))
}

/// Get the advisory pane sidecar path for a canvas id in the default directory
pub fn pane_path(id: &str) -> PathBuf {
    pane_path_in(&socket_dir(), id)
}

/// Get the advisory pane sidecar path for a canvas id in `dir`
///
/// The file records a process-manager handle (e.g. a tmux pane id). Nothing
/// in the protocol reads it.
pub fn pane_path_in(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{PANE_EXT}"))
}

/// Recover the canvas id from a socket path, if it looks like one
pub fn canvas_id_from_socket(path: &Path) -> Option<String> {
    if path.extension()? != SOCKET_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}

/// Resolve the canvas id for a wrapped program from its environment
///
/// Returns `None` when neither `OPENCODE_CANVAS` nor `CANVAS_ID` is set, in
/// which case the program should run without a canvas server. `CANVAS_ID`
/// takes precedence over `default_id`.
pub fn canvas_id_from_env(default_id: &str) -> Option<String> {
    let env_id = non_empty_var(CANVAS_ID_ENV);
    if env_id.is_none() && non_empty_var(CANVAS_MODE_ENV).is_none() {
        return None;
    }
    Some(env_id.unwrap_or_else(|| default_id.to_string()))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_socket_path_shape() {
        let path = socket_path_in(Path::new("/tmp/opencode-canvas"), "my-tui");
        assert_eq!(path, PathBuf::from("/tmp/opencode-canvas/my-tui.sock"));
    }

    #[test]
    fn test_socket_path_default_dir() {
        let path = socket_path("demo");
        assert!(path.ends_with("opencode-canvas/demo.sock"));
        assert_eq!(path.parent(), Some(socket_dir().as_path()));
    }

    #[test]
    fn test_socket_path_deterministic_and_injective() {
        let dir = Path::new("/run/canvas");
        let ids = ["a", "b", "a-b", "a.b", "a_b", "A", "123", "tui.sock"];
        let paths: HashSet<PathBuf> = ids.iter().map(|id| socket_path_in(dir, id)).collect();
        assert_eq!(paths.len(), ids.len());
        for id in ids {
            assert_eq!(socket_path_in(dir, id), socket_path_in(dir, id));
        }
    }

    #[test]
    fn test_pane_path_default_dir() {
        assert_eq!(pane_path("demo"), socket_dir().join("demo.pane"));
    }

    #[test]
    fn test_pane_path() {
        let path = pane_path_in(Path::new("/tmp/opencode-canvas"), "my-tui");
        assert_eq!(path, PathBuf::from("/tmp/opencode-canvas/my-tui.pane"));
    }

    #[test]
    fn test_canvas_id_from_socket() {
        let dir = Path::new("/tmp/opencode-canvas");
        assert_eq!(
            canvas_id_from_socket(&socket_path_in(dir, "tui.v2")),
            Some("tui.v2".to_string())
        );
        assert_eq!(canvas_id_from_socket(&pane_path_in(dir, "tui")), None);
        assert_eq!(canvas_id_from_socket(Path::new("/tmp/.sock")), None);
    }

    #[test]
    fn test_canvas_id_from_env_disabled() {
        temp_env::with_vars_unset([CANVAS_ID_ENV, CANVAS_MODE_ENV], || {
            assert_eq!(canvas_id_from_env("fallback"), None);
        });
    }

    #[test]
    fn test_canvas_id_from_env_mode_only() {
        temp_env::with_vars(
            [(CANVAS_MODE_ENV, Some("1")), (CANVAS_ID_ENV, None)],
            || {
                assert_eq!(canvas_id_from_env("fallback"), Some("fallback".to_string()));
            },
        );
    }

    #[test]
    fn test_canvas_id_from_env_id_wins() {
        temp_env::with_vars(
            [(CANVAS_MODE_ENV, None), (CANVAS_ID_ENV, Some("picker"))],
            || {
                assert_eq!(canvas_id_from_env("fallback"), Some("picker".to_string()));
            },
        );
    }

    #[test]
    fn test_canvas_id_from_env_empty_is_unset() {
        temp_env::with_vars(
            [(CANVAS_MODE_ENV, Some("")), (CANVAS_ID_ENV, Some(""))],
            || {
                assert_eq!(canvas_id_from_env("fallback"), None);
            },
        );
    }
}
