//! Error types for reve-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The chip identifier register did not read the expected value
    /// within the bring-up poll bound. Fatal; requires a full re-bring-up.
    DeviceNotDetected,
    /// The graphics engine did not consume committed commands within the
    /// polling bound. The engine is unresponsive; polling harder will not
    /// recover it.
    DrainTimeout,
    /// The graphics engine parked its read pointer at the fault mark after
    /// decoding an invalid command. Requires an engine reset.
    CoprocessorFault,
    /// The byte transport reported a failure. Propagated unchanged; retry
    /// policy, if any, belongs to the transport implementation.
    Transport,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotDetected => write!(f, "device not detected"),
            Self::DrainTimeout => write!(f, "command buffer did not drain before timeout"),
            Self::CoprocessorFault => write!(f, "graphics engine fault"),
            Self::Transport => write!(f, "transport failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
