use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

pub const COMMAND_LOG_FILE: &str = "commands.log";

/// Installs the global subscriber: `RUST_LOG`-filtered output on stderr and,
/// when `logs_dir` is given, a plain-text copy in `logs/commands.log`.
///
/// Only the first call has effect.
pub fn init_logging(logs_dir: Option<&Path>) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(Level::INFO).into())
            .from_env_lossy();

        let file_layer = logs_dir
            .and_then(open_command_log)
            .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
            .with(file_layer.map(|layer| layer.with_filter(LevelFilter::INFO)))
            .try_init();
    });
}

fn open_command_log(logs_dir: &Path) -> Option<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(COMMAND_LOG_FILE))
        .ok()
}
