use std::{fs::File, path::Path, sync::Arc};
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt, prelude::*};

// Compact human readable events on stderr, keeping stdout free for the
// prompts, plus an optional JSON file with everything down to TRACE.
pub fn init(level: Level, log_file: Option<&Path>) -> Result<(), std::io::Error> {
    let stderr_log = fmt::layer().compact().with_writer(std::io::stderr);

    let file_log = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(fmt::layer().with_writer(Arc::new(file)).json())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(Targets::default().with_default(level)))
        .with(file_log)
        .with(
            Targets::default()
                .with_target("faltung", Level::TRACE)
                .with_target("faltung_core", Level::TRACE)
                .with_default(Level::WARN),
        )
        .init();

    Ok(())
}
