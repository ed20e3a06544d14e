//! Transport seam trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, traits are async (suitable for WASM/web, Embassy, tokio)
//! - With the `is_sync` feature, traits become synchronous

use crate::error::Result;
use maybe_async::maybe_async;

/// Byte transport trait (sync or async depending on `is_sync` feature)
///
/// This trait represents the raw byte-serial bus below the transaction
/// framer: ordered, reliable byte exchange once the device is selected.
/// The framer owns all protocol knowledge; implementations only shift bytes
/// and drive the selection line.
///
/// The selection line is a scoped, non-reentrant resource. Exactly one
/// transaction may be open between `select(true)` and `select(false)`;
/// the framer brackets every transaction it issues. Implementations must
/// not toggle the line on their own between `write` and `read` calls.
///
/// Transport failures are surfaced as [`Error::Transport`](crate::Error)
/// and propagated unchanged by the layers above. After a failure mid
/// transaction the selection state is undefined; the caller should
/// re-run device bring-up.
#[maybe_async(AFIT)]
pub trait Transport {
    /// Drive the selection line. `true` selects the device (logic low on
    /// a SPI CS pin), `false` deselects it and ends the transaction.
    async fn select(&mut self, enable: bool) -> Result<()>;

    /// Clock bytes out to the device. Only valid while selected.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Clock bytes in from the device. Only valid while selected.
    async fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}

/// Board bring-up seam
///
/// Abstracts the board-specific power-down/reset line. Datasheet reset
/// timing between edges is sequenced by the caller through
/// [`Transport::delay_us`]; implementations only drive the line.
#[maybe_async(AFIT)]
pub trait Board {
    /// Drive the power state. `true` releases the power-down line (device
    /// running), `false` asserts it (device held in power-down).
    async fn set_power(&mut self, enable: bool) -> Result<()>;
}

// Blanket impl for boxed transports to allow trait objects (sync mode only)
// In async mode, traits with async fn are not object-safe
#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl Transport for alloc::boxed::Box<dyn Transport + Send> {
    fn select(&mut self, enable: bool) -> Result<()> {
        (**self).select(enable)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
