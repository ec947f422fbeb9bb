//! Error types for accelerator register access

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for register window and controller operations
pub type Result<T> = std::result::Result<T, XdmaError>;

/// Errors that can occur while driving the accelerator control window
///
/// Every variant is a recoverable outcome for the caller. `IoFault` is
/// terminal for the window it came from; the others leave the window usable.
#[derive(Debug, Error)]
pub enum XdmaError {
    /// The device node could not be opened
    #[error("Device unavailable: {path}: {source}")]
    DeviceUnavailable {
        /// Device node that was opened
        path: PathBuf,
        /// Underlying open error
        #[source]
        source: std::io::Error,
    },

    /// Address-space mapping of the window was requested but failed
    #[error("Cannot map {path}: {reason}")]
    MapFailed {
        /// Device node that was mapped
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// A register transaction did not complete all 4 bytes
    #[error("Register I/O fault at {offset:#06x}: {reason}")]
    IoFault {
        /// Register offset
        offset: usize,
        /// Reason for failure
        reason: String,
    },

    /// Operation called outside its legal session state
    #[error("Cannot {operation} in state {state}")]
    InvalidState {
        /// Operation that was refused
        operation: &'static str,
        /// State description at the time of the call
        state: String,
    },

    /// Poll loop exceeded the caller-supplied bound
    #[error("Timed out after {elapsed_ms}ms ({polls} polls) waiting for DONE")]
    TimedOut {
        /// Elapsed time in milliseconds
        elapsed_ms: u64,
        /// Number of status reads issued
        polls: u32,
    },

    /// Result registers read before the accelerator reported DONE
    #[error("Result not ready (session is {state})")]
    NotReady {
        /// State description at the time of the call
        state: String,
    },

    /// Offset is unaligned or outside the window
    #[error("Invalid register offset {offset:#x} for a {len:#x}-byte window")]
    InvalidOffset {
        /// Requested offset
        offset: usize,
        /// Window length in bytes
        len: usize,
    },

    /// Control value sets bits the register map reserves
    #[error("Control value {value:#010x} sets reserved bits {reserved:#010x}")]
    ReservedBits {
        /// Rejected value
        value: u32,
        /// Offending bits
        reserved: u32,
    },

    /// The register map has no registers for this operation
    #[error("{operation} is not supported by the {layout} register layout")]
    Unsupported {
        /// Operation that was refused
        operation: &'static str,
        /// Register layout name
        layout: &'static str,
    },

    /// Write through a window opened read-only
    #[error("Window is read-only (write to {offset:#06x})")]
    ReadOnly {
        /// Register offset
        offset: usize,
    },

    /// Wait was cancelled by the caller
    #[error("Wait cancelled after {polls} polls")]
    Cancelled {
        /// Number of status reads issued
        polls: u32,
    },
}

impl XdmaError {
    /// Create a device unavailable error
    pub fn device_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeviceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a map failed error
    pub fn map_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MapFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O fault error
    pub fn io_fault(offset: usize, reason: impl Into<String>) -> Self {
        Self::IoFault {
            offset,
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Create a not ready error
    pub fn not_ready(state: impl ToString) -> Self {
        Self::NotReady {
            state: state.to_string(),
        }
    }

    /// True for faults that invalidate the window
    #[must_use]
    pub const fn is_io_fault(&self) -> bool {
        matches!(self, Self::IoFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_offsets_in_hex() {
        let e = XdmaError::io_fault(0x0c, "short read: 2 of 4 bytes");
        assert_eq!(
            e.to_string(),
            "Register I/O fault at 0x000c: short read: 2 of 4 bytes"
        );
        assert!(e.is_io_fault());
    }

    #[test]
    fn reserved_bits_message() {
        let e = XdmaError::ReservedBits {
            value: 0x0000_0108,
            reserved: 0x0000_0108,
        };
        assert!(e.to_string().contains("0x00000108"));
        assert!(!e.is_io_fault());
    }

    #[test]
    fn invalid_state_names_operation() {
        let e = XdmaError::invalid_state("configure routing", "Busy");
        assert_eq!(e.to_string(), "Cannot configure routing in state Busy");
    }
}
