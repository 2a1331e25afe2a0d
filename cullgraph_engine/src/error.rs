//! Error types for the cullgraph engine
//!
//! Nothing in this crate retries. A failed `validate()` leaves the object in
//! its previous state and hands the error back to the caller, which decides
//! whether to tear down the affected surface or device.

use std::fmt;

/// Result type for cullgraph engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Cullgraph engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failed, device lost, ...)
    BackendError(String),

    /// Out of GPU memory while creating a native object
    OutOfMemory,

    /// Invalid resource (buffer, image view, shader code, ...)
    InvalidResource(String),

    /// Initialization failed (engine, device wrapper, subsystems)
    InitializationFailed(String),

    /// Construction-time contract violation: descriptor type not matching
    /// the layout, empty shader-stage list, zero bindings, ...
    ContractViolation(String),

    /// `handle()` was called for a context that was never validated
    NotValidated(String),

    /// Descriptor pool has no free set left
    PoolExhausted {
        /// Number of sets the pool was created for
        capacity: u32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
            Error::NotValidated(msg) => write!(f, "Handle requested before validate(): {}", msg),
            Error::PoolExhausted { capacity } => {
                write!(f, "Descriptor pool exhausted (capacity {})", capacity)
            }
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error::BackendError` with the same message
///
/// # Example
///
/// ```ignore
/// let layout = layouts.get(0)
///     .ok_or_else(|| engine_err!("cullgraph::PipelineLayout", "no set layout at {}", 0))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::cullgraph::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError)` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log an ERROR and build an `Error::ContractViolation`
#[macro_export]
macro_rules! engine_contract_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::cullgraph::Error::ContractViolation(message)
    }};
}

/// Log an ERROR and return `Err(Error::ContractViolation)`
#[macro_export]
macro_rules! engine_bail_contract {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_contract_err!($source, $($arg)*))
    };
}

/// Log an already-built error and evaluate to it
#[macro_export]
macro_rules! engine_raise {
    ($source:expr, $error:expr) => {{
        let error = $error;
        $crate::engine_error!($source, "{}", error);
        error
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
