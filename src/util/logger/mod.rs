//! Logger module for TianGong
//!
//! Go-style simple logging: `[LEVEL] message`
//!
//! # Usage
//!
//! ```rust
//! use tiangong::util::logger;
//!
//! logger::init();
//! tracing::info!("Hello, {}", "world");
//! ```

use once_cell::sync::OnceCell;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// The level the subscriber was installed with.
static ACTIVE_LEVEL: OnceCell<LogLevel> = OnceCell::new();

/// Initialize logging at `Info` level.
///
/// Repeated calls are no-ops, so libraries and tests may both call it.
pub fn init() {
    init_with_level(LogLevel::Info);
}

/// Initialize logging at the given level.
pub fn init_with_level(level: LogLevel) {
    if ACTIVE_LEVEL.set(level).is_err() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .try_init();
}

/// The active level, if logging has been initialized.
pub fn level() -> Option<LogLevel> {
    ACTIVE_LEVEL.get().copied()
}
