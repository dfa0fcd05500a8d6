//! Log subscriber setup for the binaries.

/// Default filter directive for a `-v` count.
///
/// # Examples
///
/// ```
/// use pla_compose::logging::directive;
///
/// assert_eq!(directive(0), "warn");
/// assert_eq!(directive(1), "info");
/// assert_eq!(directive(2), "debug");
/// assert_eq!(directive(9), "trace");
/// ```
pub fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs a formatting subscriber on stderr. `RUST_LOG` wins over
/// `verbosity` when set. Calling it twice is harmless.
#[cfg(feature = "logging")]
pub fn init(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// No-op without the `logging` feature.
#[cfg(not(feature = "logging"))]
pub fn init(_verbosity: u8) {}
