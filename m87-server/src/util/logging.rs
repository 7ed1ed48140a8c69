use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging. Honors `RUST_LOG`, defaulting to `info`
/// for this crate and `warn` for its dependencies.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,m87_server=info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
