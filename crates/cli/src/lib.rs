//! Library half of the `argscan` binary: command implementations and output
//! sinks, kept here so they can be tested without spawning the executable.

pub mod commands;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ARGSCAN_LOG";

/// Install the stderr log subscriber. `ARGSCAN_LOG` overrides the `info`
/// default. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
