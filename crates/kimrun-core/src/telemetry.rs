//! Log setup for `kimrun`. Logs always go to stderr; stdout carries
//! command output and, with `--verbose`, the runners' own output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber. `RUST_LOG` overrides `level`; later calls
/// are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let (plain, structured) = if json {
        let layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json();
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
