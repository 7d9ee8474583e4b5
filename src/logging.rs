use tracing_subscriber::EnvFilter;

/// Logs to stderr. `RUST_LOG` wins; otherwise `--debug` turns on this
/// crate's debug output.
pub fn init_logging(debug: bool) {
    let default_filter = if debug { "info,ttsave=debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}
