use clap::Parser;
use wastewatch_core::{Priority, Report};
use wastewatch_hub::{start, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "wastewatch", about = "WasteWatch report notification hub")]
struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(long, default_value_t = 9400)]
    port: u16,

    /// Publish a sample critical report after startup, for smoke testing
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };

    let handle = match start(config).await {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start hub");
            std::process::exit(1);
        }
    };

    tracing::info!(port = handle.port, "WasteWatch hub ready");

    if args.demo {
        let report = Report::new("Overflowing bin", "Central Park entrance", Priority::Critical);
        tracing::info!(report_id = %report.id, "Publishing demo report");
        handle.hub.publish_report(report);
    }

    // Wait for shutdown signal
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for ctrl+c");
    }

    tracing::info!("Shutting down");
}
