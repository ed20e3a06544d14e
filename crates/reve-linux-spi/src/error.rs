//! Error types for the Linux transport and board control

use thiserror::Error;

/// Linux transport specific errors
#[derive(Debug, Error)]
pub enum LinuxEveError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to {mode}: {source}")]
    SetModeFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Transaction exceeds the kernel's spidev buffer
    #[error("Transaction of {len} bytes exceeds kernel buffer of {max}")]
    TransactionTooLarge { len: usize, max: usize },

    /// Bus used outside a selection scope, or writes after the read phase
    #[error("Unsupported transaction sequence: {0}")]
    UnsupportedSequence(&'static str),

    /// Device not specified
    #[error("No device specified. Use a /dev/spidevX.Y path")]
    NoDevice,

    /// Failed to request the power-down GPIO line
    #[error("Failed to request GPIO line: {0}")]
    LineRequestFailed(#[source] gpiocdev::Error),

    /// Failed to set the power-down GPIO line
    #[error("Failed to set GPIO line value: {0}")]
    SetValueFailed(#[source] gpiocdev::Error),
}

/// Result type for Linux transport operations
pub type Result<T> = std::result::Result<T, LinuxEveError>;
