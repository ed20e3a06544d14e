//! reve-core - Command/transport layer for EVE-family display coprocessors
//!
//! This crate drives a display coprocessor chip (a memory-mapped peripheral
//! with its own execution engine, reached over a byte-serial bus) from a
//! host. It frames register/memory reads and writes across the bus, manages
//! the chip's circular command buffer without ever over-running it, and
//! sequences device bring-up. It is designed to be `no_std` compatible for
//! use in embedded environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation (boxed transport trait objects)
//! - `is_sync` - Compile the async seams as synchronous code
//!
//! # Example
//!
//! ```ignore
//! use reve_core::{Device, DeviceMap};
//!
//! fn splash<T: reve_core::Transport, B: reve_core::Board>(t: T, b: B) -> reve_core::Result<()> {
//!     let mut dev = Device::new(t, b, DeviceMap::ft81x());
//!     dev.bring_up()?;
//!
//!     let free = dev.cmd_free_space()?;
//!     assert!(free >= 8);
//!     dev.cmd_write(0xFFFF_FF32)?; // engine command words are opaque here
//!     dev.cmd_write(0x0000_0000)?;
//!     dev.cmd_commit()?;
//!     dev.cmd_wait_drain(100, 100_000)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod device;
pub mod error;
pub mod fifo;
pub mod frame;
pub mod map;
pub mod protocol;
pub mod transport;

pub use device::{Device, Lifecycle};
pub use error::{Error, Result};
pub use fifo::CmdFifo;
pub use frame::Width;
pub use map::{ClockSource, DeviceMap};
pub use transport::{Board, Transport};
