//! Tracing setup
//!
//! The subscriber is installed before the config file is read, so config
//! discovery can log. It starts from `RUST_LOG` (or [`STARTUP_FILTER`]) and
//! switches to the configured `logging.level` once the config is loaded,
//! unless `RUST_LOG` was set.

use crate::error::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Filter in effect until the config file has been read
pub const STARTUP_FILTER: &str = "soms_voice=info,soms_common=info,tower_http=info";

/// Handle for replacing the filter after startup
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogHandle {
    /// Switch to `directives`.
    ///
    /// Returns `Ok(false)` without changing anything when `RUST_LOG` chose
    /// the filter.
    pub fn apply(&self, directives: &str) -> Result<bool> {
        if self.from_env {
            return Ok(false);
        }

        let filter = EnvFilter::try_new(directives)
            .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))?;
        self.filter
            .reload(filter)
            .map_err(|e| Error::Config(format!("Failed to reload log filter: {}", e)))?;
        Ok(true)
    }
}

/// Build the reloadable filter layer from a `RUST_LOG` value.
///
/// An unparsable value falls back to [`STARTUP_FILTER`] and does not count
/// as set.
pub fn filter_layer(env: Option<&str>) -> (reload::Layer<EnvFilter, Registry>, LogHandle) {
    let from_env = env.and_then(|value| EnvFilter::try_new(value).ok());
    let is_env = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(STARTUP_FILTER));

    let (layer, handle) = reload::Layer::new(filter);
    (
        layer,
        LogHandle {
            filter: handle,
            from_env: is_env,
        },
    )
}

/// Install the global subscriber
pub fn init() -> LogHandle {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, handle) = filter_layer(env.as_deref());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    handle
}
