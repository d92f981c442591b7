//! Logging Infrastructure
//!
//! Structured logging setup with support for both development and production environments.

use anyhow::Context;

/// Initialize the logger
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file(None, None)
}

/// Initialize the logger with optional file output
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) -> anyhow::Result<()> {
    let level = log_level.unwrap_or("info");

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    // Add file output if log_dir is provided
    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir))?;
        let file_appender = tracing_appender::rolling::daily(dir, "concierge-server");
        subscriber.with_writer(file_appender).init();
        return Ok(());
    }

    subscriber.init();
    Ok(())
}
