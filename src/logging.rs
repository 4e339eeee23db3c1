use tracing_subscriber::filter::EnvFilter;

/// Install a JSON `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` for
/// this crate when `debug` is true so driver statement logging shows up.
/// Calling it again after a subscriber is installed has no effect.
pub fn init_logging(debug: bool) {
    let fallback = if debug { "info,riverorm=debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .json()
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::init_logging;
    use tracing::{debug, info};

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(true);
        init_logging(false);

        debug!(target: "riverorm::db", sql = "SELECT 1", "SQL");
        info!("still logging after second init");
    }
}
