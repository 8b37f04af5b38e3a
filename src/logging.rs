//! Driver-level log filter.
//!
//! `VERTICA_WIRE_LOG_LEVEL` is read once and caps what the protocol layer
//! emits on top of whatever the installed `tracing` subscriber allows:
//! `0` trace, `1` debug, `2` info, `3` warn, `4` error, `5` off.
//! Unset or unparsable values fall back to warn.
//!
//! The crate enables `tracing`'s `release_max_level_warn`, so release builds
//! compile out every trace, debug and info call. There, `0`, `1` and `2`
//! behave like `3`; the lower levels only take effect in debug builds.

use std::sync::OnceLock;

use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Environment variable consulted by [`max_level`].
pub const LOG_LEVEL_ENV: &str = "VERTICA_WIRE_LOG_LEVEL";

static MAX_LEVEL: OnceLock<LevelFilter> = OnceLock::new();

/// Map a numeric level (as found in the environment) to a filter.
pub fn level_from_str(value: &str) -> Option<LevelFilter> {
    match value.trim().parse::<u8>().ok()? {
        0 => Some(LevelFilter::TRACE),
        1 => Some(LevelFilter::DEBUG),
        2 => Some(LevelFilter::INFO),
        3 => Some(LevelFilter::WARN),
        4 => Some(LevelFilter::ERROR),
        5 => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// The driver-level cap, read from the environment on first use.
pub fn max_level() -> LevelFilter {
    *MAX_LEVEL.get_or_init(|| {
        let Ok(value) = std::env::var(LOG_LEVEL_ENV) else {
            return LevelFilter::WARN;
        };
        level_from_str(&value).unwrap_or_else(|| {
            tracing::warn!("ignoring invalid {}={:?}", LOG_LEVEL_ENV, value);
            LevelFilter::WARN
        })
    })
}

/// Whether messages at `level` pass the driver-level cap.
#[inline]
pub fn enabled(level: Level) -> bool {
    level <= max_level()
}
