use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global fmt subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
