//! Human-readable translation of device status codes.
//!
//! Every device call produces a status; the acquisition components log the
//! translated form when verbose diagnostics are enabled. The translation is
//! strictly for observability — control flow never branches on the phrase.

use crate::driver::Status;

/// Formats a device response line for an operation, e.g.
/// `<< SetTriggerSource response: ok >>`.
pub fn describe(operation: &str, status: Status) -> String {
    format!("<< {} response: {} >>", operation, status)
}
