//! Log setup for the binary. Everything goes to stderr so stdout carries
//! only the rendered document.

use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Overrides the verbosity flags, e.g. `DUMPH_LOG=dumph::pagination=debug`.
pub const LOG_ENV: &str = "DUMPH_LOG";

pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
