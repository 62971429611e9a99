pub mod build_info;
pub mod paths;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

pub use paths::{ensure_dir, write_atomic, PathResolver};

/// Directive applied when neither `RUST_LOG` nor the config provide one.
pub const DEFAULT_LOG_DIRECTIVE: &str = "household_finance=info";

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber once.
///
/// `RUST_LOG` wins over `directive`; an unparsable directive falls back to the default.
pub fn init_tracing(directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_DIRECTIVE)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
