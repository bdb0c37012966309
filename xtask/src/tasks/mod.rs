pub mod evaluate;
pub mod predict;
mod session;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Diagnostics go to stderr so stdout only carries the run summary and
/// scores. Filter with `RUST_LOG`, `info` by default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    Registry::default().with(filter).with(fmt_layer).init();
}
