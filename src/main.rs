use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canvas_core::config::Settings;
use opencode_canvas::config::Config;
use opencode_canvas::demo;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    cli.merge_into(&mut settings);
    settings.validate();

    let id = cli.canvas_id();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let last = demo::run(&settings.socket_dir(), &id, shutdown).await?;
    tracing::info!("canvas {} exited with count {}", id, last.count);
    Ok(())
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("opencode_canvas=debug,canvas_core=debug")
    } else {
        EnvFilter::new("opencode_canvas=info,canvas_core=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
