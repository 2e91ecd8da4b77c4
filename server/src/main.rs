use clap::Parser;
use log::{error, info};
use server::config::{Args, ServerConfig};
use server::network::Server;

/// Parses command-line arguments and serves the lobby until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = ServerConfig::from(args);

    info!(
        "Starting card game server on {} ({})",
        config.bind_addr,
        if config.password.is_empty() {
            "no password"
        } else {
            "password protected"
        }
    );

    let server = Server::new(&config).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    server.run_until(shutdown).await?;
    Ok(())
}
