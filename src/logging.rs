//! Logging setup.
//!
//! All events are emitted through `tracing` with targets following the
//! module path, e.g. `zonechain::xfr` for transfers or `zonechain::reload`
//! for generation swaps.

use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` is not set.
///
/// Reload outcomes and transfer starts are logged at info level, the
/// per-request detail of the chain only at debug level.
pub const DEFAULT_FILTER: &str = "warn,zonechain=info";

/// Installs a subscriber printing events of zonechain to stdout.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`], e.g. to log transfer progress:
///
/// ```text
/// RUST_LOG=zonechain::xfr=debug
/// ```
///
/// Or to trace request routing but nothing else:
///
/// ```text
/// RUST_LOG=off,zonechain::chain=trace
/// ```
///
/// Calling this more than once is harmless, only the first call installs
/// a subscriber.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER)
}

/// Installs a subscriber with `directives` as the fallback filter.
pub fn init_logging_with(directives: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(directives))
        .with_target(true)
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

/// Builds the filter from `RUST_LOG`, falling back to `directives`.
fn filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn repeated_init() {
        init_logging();
        init_logging_with("zonechain::xfr=trace");
    }
}
