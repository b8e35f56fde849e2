use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "VR buzz wire game server", long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Maximum number of concurrent game sessions
    #[arg(short, long, default_value = "32")]
    max_sessions: usize,

    /// Evict sessions idle for this many seconds (0 keeps them forever)
    #[arg(long, default_value = "0")]
    idle_timeout_secs: u64,

    /// Collision threshold in metres for clients that do not pick one
    #[arg(short = 't', long, default_value_t = shared::DEFAULT_COLLISION_THRESHOLD)]
    default_threshold: f64,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, String> {
        if !self.default_threshold.is_finite() || self.default_threshold <= 0.0 {
            return Err(format!(
                "default threshold must be positive, got {}",
                self.default_threshold
            ));
        }

        Ok(ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_sessions: self.max_sessions,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            default_threshold: self.default_threshold,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config()?;

    info!("Starting buzz wire server on {}", config.bind_addr);
    info!(
        "Max sessions: {}, default threshold: {}",
        config.max_sessions, config.default_threshold
    );
    match config.idle_timeout {
        Some(timeout) => info!("Idle sessions expire after {:?}", timeout),
        None => info!("Idle sessions never expire"),
    }

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
