use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber once. `filter` uses the usual
/// env-filter syntax (e.g. `executor=debug,info`); `json` switches to line
/// delimited JSON output for log shipping.
///
/// Calling this twice is a programming error and panics, like any double
/// initialization of a global subscriber would.
pub fn initialize(filter: &str, json: bool) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?}: {err}; falling back to info");
        EnvFilter::new("info")
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}
