use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing_log::AsTrace;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Installs the global subscriber.
///
/// Console output goes to stderr, so stdout stays machine-readable, and is filtered by `RUST_LOG` falling back
/// to the `-v`/`-q` level. When `trace` is given every level is also written to that file.
pub fn configure_tracing(trace: Option<PathBuf>, verbose: Verbosity<InfoLevel>) -> anyhow::Result<()> {
    let level: LevelFilter = verbose.log_level_filter().as_trace();

    let console_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let trace_layer = match &trace {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Unable to create trace file. path: {}", path.display()))?;

            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::TRACE),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(trace_layer)
        .try_init()?;

    ::tracing::debug!("Tracing configured. level: {}, trace: {:?}", level, trace);

    Ok(())
}
