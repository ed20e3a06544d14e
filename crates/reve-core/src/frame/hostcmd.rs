//! Host command opcodes
//!
//! Host commands are a distinct three-byte framing that addresses the chip
//! itself rather than its memory space: `[cmd, param, 0x00]`. They control
//! power state and clocking and are only meaningful outside normal memory
//! traffic.

/// Switch from standby/sleep to active mode
pub const ACTIVE: u8 = 0x00;
/// Put the device into standby (PLL and oscillator remain on)
pub const STANDBY: u8 = 0x41;
/// Put the device to sleep (PLL and oscillator off)
pub const SLEEP: u8 = 0x42;
/// Power down core circuits
pub const PWRDOWN: u8 = 0x50;
/// Select the external clock source
pub const CLKEXT: u8 = 0x44;
/// Select the internal clock source
pub const CLKINT: u8 = 0x48;
/// Set the system clock frequency (parameter selects the multiplier)
pub const CLKSEL: u8 = 0x61;
/// Send a reset pulse to the core
pub const RST_PULSE: u8 = 0x68;
