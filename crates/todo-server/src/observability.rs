//! Tracing setup.
//!
//! Logging starts at `info` before the configuration is read, then switches
//! to `logging.level` through a reload handle. `RUST_LOG` always wins.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Directives for `level`. sqlx statement logs stay at `warn` unless the
/// server itself runs at `trace`.
pub fn filter_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    if level == "trace" || level == "off" {
        level
    } else {
        format!("{level},sqlx=warn")
    }
}

fn env_override() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG")?;
    EnvFilter::try_from_default_env().ok()
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    let filter = env_override().unwrap_or_else(|| EnvFilter::new(filter_directives(level)));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Switches to the configured level unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.modify(|f| *f = EnvFilter::new(filter_directives(level))) {
        tracing::warn!(error = %e, level, "log_level_change_failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_is_quieted_below_trace() {
        assert_eq!(filter_directives("INFO"), "info,sqlx=warn");
        assert_eq!(filter_directives("debug"), "debug,sqlx=warn");
        assert_eq!(filter_directives("trace"), "trace");
        assert_eq!(filter_directives("off"), "off");
    }
}
