//! Tracing subscriber setup for host applications

use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install a global subscriber filtered by `RUST_LOG` plus `default_directive`
///
/// With `LOG_FORMAT=json` events are emitted in the Stackdriver JSON format.
/// Returns `Ok(false)` when a subscriber was already installed by the host.
pub fn init_tracing(default_directive: &str) -> Result<bool, ParseError> {
    let directive: Directive = default_directive.parse()?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let installed = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .is_ok()
    };

    Ok(installed)
}
