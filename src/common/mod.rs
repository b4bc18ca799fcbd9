//! Infrastructure shared by the kklib-rs binaries

pub mod cli;
pub mod error;
pub mod shutdown;

pub use error::{AppError, AppResult};
pub use shutdown::{setup_shutdown, ShutdownReceiver, ShutdownSender};

use tracing_subscriber::EnvFilter;

/// Initialise `tracing` output; `RUST_LOG` overrides the crate default of `info`
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kklib_rs=info".parse()?))
        .init();
    Ok(())
}
