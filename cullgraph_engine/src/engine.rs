/// Cullgraph Engine - process-wide logger and configuration
///
/// Both live in `OnceLock<RwLock<..>>` statics so that every validation cache
/// can log without threading a handle through its API.

use std::sync::{OnceLock, RwLock};
use crate::config::EngineConfig;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Global configuration (initialized with EngineConfig::default())
static CONFIG: OnceLock<RwLock<EngineConfig>> = OnceLock::new();

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn config_lock() -> &'static RwLock<EngineConfig> {
    CONFIG.get_or_init(|| RwLock::new(EngineConfig::default()))
}

// ===== PUBLIC API =====

/// Engine singleton accessors
///
/// # Example
///
/// ```no_run
/// use cullgraph_engine::cullgraph::{Engine, EngineConfig};
/// use cullgraph_engine::cullgraph::log::LogSeverity;
///
/// Engine::configure(EngineConfig {
///     min_log_severity: LogSeverity::Debug,
///     ..EngineConfig::default()
/// });
/// ```
pub struct Engine;

impl Engine {
    /// Replace the engine configuration
    pub fn configure(config: EngineConfig) {
        if let Ok(mut lock) = config_lock().write() {
            *lock = config;
        }
        crate::engine_debug!("cullgraph::Engine", "Configuration updated: {:?}", config);
    }

    /// Current engine configuration
    pub fn config() -> EngineConfig {
        config_lock()
            .read()
            .map(|lock| *lock)
            .unwrap_or_default()
    }

    /// Install a custom logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Restore the default logger and configuration
    pub fn reset_for_testing() {
        Self::reset_logger();
        if let Ok(mut lock) = config_lock().write() {
            *lock = EngineConfig::default();
        }
    }

    fn enabled(severity: LogSeverity) -> bool {
        severity >= Self::config().min_log_severity
    }

    /// Internal logging method, used by `engine_trace!` .. `engine_warn!`
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry::new(severity, source, message));
        }
    }

    /// Internal logging method with file:line information, used by `engine_error!`
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry::new(severity, source, message).with_location(file, line));
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
