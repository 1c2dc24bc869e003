use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Initialize tracing for a broadcaster-node binary.
///
/// Uses `RUST_LOG` when set; otherwise falls back to `debug_fallback`
/// ? DEBUG : INFO. Layered subscriber so additional layers (e.g. a
/// future chrome trace exporter) can be composed without touching
/// this function.
pub fn init_tracing(debug_fallback: bool) -> Result<(), eyre::Report> {
    let filter = if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        env_filter
    } else {
        let level = if debug_fallback { "debug" } else { "info" };
        EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(true)
                .with_file(true)
                .with_target(false)
                .with_line_number(true)
                .with_thread_names(true)
                .with_span_events(fmt::format::FmtSpan::NONE),
        )
        .with(filter)
        .init();

    Ok(())
}
