//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter is
//! read from `SPARKLE_LOG` (e.g. `sparkle=debug`), defaulting to `info`, or
//! `debug` with `-v`.

use std::{env, io};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "SPARKLE_LOG";

/// Install the global subscriber. Safe to call once per process.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| default_filter.to_string());
    let filter_layer =
        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registered = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();

    if registered.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
