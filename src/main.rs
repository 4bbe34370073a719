//! Instincts - learned behavior tracker
//!
//! Detects behavioral patterns in tool-usage observations and manages the
//! resulting instinct records.

// Use the library crate for all modules
use instincts::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (WARN level by default, use RUST_LOG=info for debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Run CLI
    cli::run().await
}
