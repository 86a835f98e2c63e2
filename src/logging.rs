use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "SYNCOPATE_LOG";

/// Initialize structured JSON logging.
///
/// Defaults to `error` level unless overridden by `SYNCOPATE_LOG` (e.g. `SYNCOPATE_LOG=debug`
/// to see every matched group and consolidated clip). Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(tracing::level_filters::LevelFilter::ERROR.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}
