//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes the controller
//! can hit:
//!
//! - **`Config`** wraps parse/format errors from the `config` crate.
//! - **`Configuration`** covers semantic errors that pass parsing but are
//!   logically invalid (a non-positive encoder resolution, a malformed IP
//!   address). These are caught during validation, before any device call.
//! - **`Io`** wraps `std::io::Error` for file operations on the output sink.
//! - **`DeviceNotFound`** is raised when discovery does not return the
//!   requested device serial.
//! - **`Driver`** carries the raw status code a device call returned.
//!   Control flow only ever branches on ok/err; the status itself feeds
//!   diagnostics via [`crate::response::describe`].
//! - **`AcquisitionInit`** marks the two fatal entry points of the
//!   streaming loop (start and connect-data). These are never retried.
//!
//! With `#[from]` conversions, `DaqError` composes cleanly with the `?`
//! operator throughout the library.

use thiserror::Error;

use crate::driver::Status;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unable to detect device #{0}")]
    DeviceNotFound(u32),

    #[error("Device call {operation} failed: {status}")]
    Driver {
        operation: &'static str,
        status: Status,
    },

    #[error("Acquisition initialization failed: {operation} returned {status}")]
    AcquisitionInit {
        operation: &'static str,
        status: Status,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::DeviceNotFound(31337);
        assert_eq!(err.to_string(), "Unable to detect device #31337");
    }

    #[test]
    fn test_driver_error_carries_phrase() {
        let err = DaqError::Driver {
            operation: "SetFrameRate",
            status: Status::BadParameter,
        };
        assert!(err.to_string().contains("parameter is invalid"));
    }
}
