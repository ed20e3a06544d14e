//! Memory transaction framer
//!
//! Frames register/memory reads and writes, and host commands, over a raw
//! byte transport. Every function here either brackets its own selection
//! scope or is an explicitly unscoped streaming primitive for callers
//! composing a multi-step write inside one transaction.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async
//!
//! No retries happen at this layer: transport errors propagate unchanged
//! to the caller, and a failure mid-transaction leaves the selection line
//! in an undefined state (re-run bring-up to recover).

use crate::error::Result;
use crate::frame::{encode_host_command, MemFrame, Width};
use crate::transport::Transport;
use maybe_async::maybe_async;

/// Open a write transaction: emit the write preamble for `addr`
///
/// Unscoped - the caller must have selected the device and is responsible
/// for deselecting it after streaming the payload.
#[maybe_async]
pub async fn begin_write<T: Transport + ?Sized>(t: &mut T, addr: u32) -> Result<()> {
    let mut hdr = [0u8; 4];
    let n = MemFrame::write(addr).encode(&mut hdr);
    t.write(&hdr[..n]).await
}

/// Open a read transaction: emit the read preamble (including the dummy
/// byte) for `addr`
///
/// Unscoped, like [`begin_write`]. After this the device returns data on
/// every clocked byte until deselection.
#[maybe_async]
pub async fn begin_read<T: Transport + ?Sized>(t: &mut T, addr: u32) -> Result<()> {
    let mut hdr = [0u8; 4];
    let n = MemFrame::read(addr).encode(&mut hdr);
    t.write(&hdr[..n]).await
}

/// Stream a scalar value into an open write transaction, little-endian
#[maybe_async]
pub async fn stream_word<T: Transport + ?Sized>(t: &mut T, value: u32, width: Width) -> Result<()> {
    let bytes = value.to_le_bytes();
    t.write(&bytes[..width.bytes()]).await
}

/// Stream raw bytes into an open transaction without re-framing
///
/// Used when pushing many command bytes to consecutive buffer offsets
/// under a single address preamble.
#[maybe_async]
pub async fn stream_bytes<T: Transport + ?Sized>(t: &mut T, data: &[u8]) -> Result<()> {
    t.write(data).await
}

/// Read a scalar value from a device memory location
///
/// Frames the read, clocks the dummy byte, then clocks `width` bits back.
/// Controls the selection line.
#[maybe_async]
pub async fn mem_read<T: Transport + ?Sized>(t: &mut T, addr: u32, width: Width) -> Result<u32> {
    let mut buf = [0u8; 4];
    t.select(true).await?;
    begin_read(t, addr).await?;
    t.read(&mut buf[..width.bytes()]).await?;
    t.select(false).await?;
    Ok(width.mask(u32::from_le_bytes(buf)))
}

/// Write a scalar value to a device memory location
///
/// Controls the selection line.
#[maybe_async]
pub async fn mem_write<T: Transport + ?Sized>(
    t: &mut T,
    addr: u32,
    value: u32,
    width: Width,
) -> Result<()> {
    t.select(true).await?;
    begin_write(t, addr).await?;
    stream_word(t, value, width).await?;
    t.select(false).await
}

/// Read a block of bytes from a device memory location
///
/// Controls the selection line.
#[maybe_async]
pub async fn mem_read_block<T: Transport + ?Sized>(
    t: &mut T,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    t.select(true).await?;
    begin_read(t, addr).await?;
    t.read(buf).await?;
    t.select(false).await
}

/// Write a block of bytes to a device memory location
///
/// Controls the selection line.
#[maybe_async]
pub async fn mem_write_block<T: Transport + ?Sized>(
    t: &mut T,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    t.select(true).await?;
    begin_write(t, addr).await?;
    stream_bytes(t, data).await?;
    t.select(false).await
}

/// Send a host command: `[cmd, param, 0x00]`
///
/// A distinct framing that is not a memory access at all. Fully brackets
/// its own selection scope.
#[maybe_async]
pub async fn host_command<T: Transport + ?Sized>(t: &mut T, cmd: u8, param: u8) -> Result<()> {
    let frame = encode_host_command(cmd, param);
    t.select(true).await?;
    t.write(&frame).await?;
    t.select(false).await
}
