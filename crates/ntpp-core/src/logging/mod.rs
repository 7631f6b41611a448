//! Structured logging for the engine.
//!
//! Logs go to stderr, either human-readable or as JSON lines. The engine emits
//! `tracing` events with an `event` field drawn from [`event_names`]:
//! construction at `info`, per-call loss summaries at `debug` and per-split
//! forecast evaluations at `trace`. Installing a subscriber is left to the
//! embedding application; [`init_logging`] is a convenience for binaries and
//! tests.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Event names carried in the `event` field.
pub mod event_names {
    pub const MODEL_CONSTRUCTED: &str = "model.constructed";
    pub const MODEL_RESTORED: &str = "model.restored";
    pub const LOSS_COMPUTED: &str = "loss.computed";
    pub const FORECAST_PLANNED: &str = "forecast.planned";
    pub const FORECAST_SPLIT_EVALUATED: &str = "forecast.split_evaluated";
    pub const EVALUATION_COMPLETED: &str = "evaluation.completed";
}

/// Install a global stderr subscriber.
///
/// `RUST_LOG` directives, when set, replace the level from `config`. Returns
/// `false` if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ntpp_core={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .is_ok()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
                    .is_ok()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()
            .is_ok(),
    }
}

/// Initialize logging from the environment alone.
pub fn init_default_logging() -> bool {
    init_logging(&LogConfig::from_env(None, None))
}
