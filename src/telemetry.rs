use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Filtering defaults to `info` for this crate and `warn` for noisy
/// dependencies; `RUST_LOG` overrides everything.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("sqlx=warn".parse().expect("static directive"))
            .add_directive("tower=warn".parse().expect("static directive"))
            .add_directive("hyper=warn".parse().expect("static directive"))
    });

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
