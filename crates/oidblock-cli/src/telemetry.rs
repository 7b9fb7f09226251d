//! Console logging for the `oidblock` binary.
//!
//! Events go to stderr so that stdout carries nothing but identifiers. The
//! level defaults to `info` and is overridden with `RUST_LOG`, e.g.
//!
//! ```bash
//! RUST_LOG=oidblock=debug oidblock --category Invoice -n 100
//! ```
//!
//! shows every block reservation.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;
    Ok(())
}
