//! Logging configuration
//!
//! Initializes tracing for the binary.

use std::io::IsTerminal;

/// Initializes logging with the specified level.
///
/// `RUST_LOG` takes precedence over `level`. Colour is used when forced or
/// when stdout is a terminal. Calling this twice keeps the first subscriber.
pub fn init_logging(level: &str, force_ansi_color: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(force_ansi_color || std::io::stdout().is_terminal())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug", false);
        init_logging("info", true);
    }
}
