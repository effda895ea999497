//! Tracing setup for binaries and tests embedding the SDK.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive applied on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVE: &str = "mnemos=info";

/// Install a global fmt subscriber filtered by `RUST_LOG` plus `default_directive`.
///
/// Fails if the directive does not parse or a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_rejected() {
        assert!(init_tracing("mnemos=[").is_err());
    }
}
