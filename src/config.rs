use clap::Parser;
use std::path::PathBuf;

use canvas_core::config::Settings;
use canvas_core::ipc::address::canvas_id_from_env;

/// Canvas id used when neither `--id` nor the environment names one
pub const DEFAULT_CANVAS_ID: &str = "demo";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Demo canvas controllable over a Unix socket")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Canvas id (defaults to $CANVAS_ID, then $OPENCODE_CANVAS)
    #[arg(long)]
    pub id: Option<String>,

    /// Directory holding canvas sockets
    #[arg(long)]
    pub socket_dir: Option<PathBuf>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve the canvas id: `--id`, then the environment, then the default
    pub fn canvas_id(&self) -> String {
        self.id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| canvas_id_from_env(DEFAULT_CANVAS_ID))
            .unwrap_or_else(|| DEFAULT_CANVAS_ID.to_string())
    }

    /// Apply CLI overrides on top of file settings
    pub fn merge_into(&self, settings: &mut Settings) {
        if let Some(dir) = &self.socket_dir {
            settings.socket_dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_and_socket_dir() {
        let cfg = Config::parse_from(["canvas-demo", "--id", "picker", "--socket-dir", "/run/c"]);
        assert_eq!(cfg.canvas_id(), "picker");

        let mut settings = Settings::default();
        cfg.merge_into(&mut settings);
        assert_eq!(settings.socket_dir(), PathBuf::from("/run/c"));
    }

    #[test]
    fn test_canvas_id_falls_back_to_env() {
        temp_env::with_vars(
            [("CANVAS_ID", Some("from-env")), ("OPENCODE_CANVAS", None)],
            || {
                let cfg = Config::parse_from(["canvas-demo"]);
                assert_eq!(cfg.canvas_id(), "from-env");
            },
        );
    }

    #[test]
    fn test_canvas_id_default() {
        temp_env::with_vars_unset(["CANVAS_ID", "OPENCODE_CANVAS"], || {
            let cfg = Config::parse_from(["canvas-demo", "--debug"]);
            assert!(cfg.debug);
            assert_eq!(cfg.canvas_id(), DEFAULT_CANVAS_ID);
        });
    }
}
