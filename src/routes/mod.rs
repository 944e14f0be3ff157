mod admin;
mod health_check;
mod keep_alive;
mod subscriptions;
mod webhooks;

pub use admin::*;
pub use health_check::*;
pub use keep_alive::*;
pub use subscriptions::*;
pub use webhooks::*;

/// `Debug` for error enums: print the error, then every `source` in the
/// chain. `TracingLogger` logs errors with `Debug`, so this is what ends up
/// in the logs (while the client only ever sees `Display`).
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
