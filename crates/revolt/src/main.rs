//! Revolt: desktop shell for the Riot web client
//!
//! Main entry point. Installs the global allocator, sets up logging and
//! hands over to the GTK application.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Revolt {} starting...", env!("CARGO_PKG_VERSION"));

    revolt_ui::run()?;

    info!("Revolt exited");
    Ok(())
}
