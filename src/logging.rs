use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{create_dir_all, OpenOptions};
use std::path::Path;

/// Sends `log` output to `path`. The terminal belongs to the UI, so nothing
/// is written to stderr. `RUST_LOG` overrides the default `info` level.
pub fn init(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("Logger already initialised")?;
    Ok(())
}
