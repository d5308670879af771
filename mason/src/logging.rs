//! Development-time tracing.
//!
//! Tracing is diagnostics only and goes to stderr. Per-step progress and the
//! completion summary are product output on stdout, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise each `-v` raises the crate's own
/// level above the `warn` baseline. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// mason -vv simulate schemas/hut.txt
/// RUST_LOG=mason::movement=trace mason simulate schemas/hut.txt
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,mason=info",
        2 => "warn,mason=debug",
        _ => "warn,mason=trace",
    }
}
