//! Environment-based configuration.

use std::time::Duration;
use tracing::warn;

/// Prefix shared by all environment variables read by this crate.
pub const ENV_PREFIX: &str = "EXPECTO";

/// Suffix of the variable overriding the default expectation timeout.
pub(crate) const TIMEOUT_MS: &str = "TIMEOUT_MS";

/// Suffix of the variable overriding the default exit poll interval.
pub(crate) const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";

fn var_name(name: &str) -> String {
    format!("{ENV_PREFIX}_{name}")
}

/// Read `EXPECTO_<name>` as a positive number of milliseconds.
pub(crate) fn duration_ms(name: &str) -> Option<Duration> {
    let var = var_name(name);
    let value = std::env::var(&var).ok()?;
    let parsed = parse_duration_ms(&value);
    if parsed.is_none() {
        warn!(%var, %value, "ignoring invalid duration override");
    }
    parsed
}

fn parse_duration_ms(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}
