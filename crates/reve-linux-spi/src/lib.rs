//! reve-linux-spi - Linux spidev transport for reve
//!
//! This crate provides the byte transport and board-control seams for
//! Linux hosts: the bus via the `/dev/spidevX.Y` character device, the
//! power-down line via the GPIO character device.
//!
//! # Example
//!
//! ```no_run
//! use reve_core::{Device, DeviceMap};
//! use reve_linux_spi::{LinuxBoard, LinuxBoardConfig, LinuxSpi, LinuxSpiConfig};
//!
//! let spi = LinuxSpi::open(&LinuxSpiConfig::new("/dev/spidev0.0").with_speed(10_000_000))?;
//! let board = LinuxBoard::open(&LinuxBoardConfig::new("/dev/gpiochip0", 25))?;
//!
//! let mut dev = Device::new(spi, board, DeviceMap::ft81x());
//! dev.bring_up()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` and the GPIO chip device
//! - May require adding the user to the `spi`/`gpio` groups or udev rules

pub mod board;
pub mod device;
pub mod error;

// Re-exports
pub use board::{LinuxBoard, LinuxBoardConfig};
pub use device::{mode, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxEveError, Result};
