use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with custom configuration
///
/// `level` is an `EnvFilter` directive such as `info` or `restroute=debug`.
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing_with_config(level: &str, json_format: bool, include_spans: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json_format {
        Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(include_spans)
                    .with_span_list(include_spans),
            )
            .try_init()
            .wrap_err("Failed to install JSON tracing subscriber")?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install console tracing subscriber")?;
    }

    tracing::debug!(level, json_format, include_spans, "Logging initialized");
    Ok(())
}

/// Create a span covering the dispatch of one request
pub fn create_dispatch_span(method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "dispatch",
        http.method = method,
        http.path = path,
        route.controller = tracing::field::Empty,
        route.action = tracing::field::Empty,
        http.status_code = tracing::field::Empty,
    )
}
