/// Routes panic messages through tracing so they end up in the same sink
/// as everything else, then delegates to the previous hook.
pub fn install() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(%location, "thread panicked: {info}");
        previous(info);
    }));
}
