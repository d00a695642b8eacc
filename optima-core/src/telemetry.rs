//! Tracing bootstrap for binaries and integration harnesses.
//!
//! Library crates only emit `tracing` events; installing a subscriber is
//! left to whoever owns `main`.

#[cfg(feature = "tracing-basic")]
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`
/// (default `info`). Returns `false` when a subscriber was already set.
#[cfg(feature = "tracing-basic")]
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Json => fmt().with_env_filter(filter).json().try_init(),
    }
    .is_ok();

    if installed {
        tracing::info!(?format, "tracing subscriber installed");
    }
    installed
}

/// No subscriber support compiled in; events go nowhere.
#[cfg(not(feature = "tracing-basic"))]
pub fn init_tracing(_format: LogFormat) -> bool {
    false
}
