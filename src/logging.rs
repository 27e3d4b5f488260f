use tracing_subscriber::EnvFilter;

/// Sets up logging of events reported by the service.
///
/// Logs at info level unless the RUST_LOG environment variable says
/// otherwise.
///
/// E.g. to see every recorded query:
///   RUST_LOG=resolverinfo=DEBUG
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .try_init()
        .ok();
}
