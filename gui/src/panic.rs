use log::error;

/// Chains a panic hook that writes panics to the log before the default
/// hook runs; a crash on the monitor thread ends up in the log file even
/// when there is no console to see it on.
pub fn wire_panic_logging() {
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "unknown panic payload"
        };
        match info.location() {
            Some(location) => error!("Panic at {location}: {msg}"),
            None => error!("Panic: {msg}"),
        }

        prev(info);
    }));
}
