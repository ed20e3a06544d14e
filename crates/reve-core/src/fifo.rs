//! Command ring-buffer manager
//!
//! The command buffer is a classic single-producer/single-consumer circular
//! buffer where the consumer cursor is a hardware register: the host owns
//! the write pointer, the graphics engine advances the read pointer as it
//! executes. There is no mutex anywhere - synchronization is exactly these
//! two pointers plus explicit polling.
//!
//! The one invariant that matters: the host never writes enough to make the
//! two pointers equal after a wrap, because that state is indistinguishable
//! from "empty". [`CmdFifo::free_space`] under-reports by a reserved margin
//! (one minimal command slot) to guarantee it.
//!
//! `advance` is local bookkeeping only; `commit` is the separate, explicit
//! act of publishing the pointer, which is what authorizes the engine to
//! execute newly written bytes. The split lets a caller stage several writes
//! and publish them atomically as one pointer update, so the engine never
//! observes a half-written instruction.

use crate::error::{Error, Result};
use crate::frame::Width;
use crate::map::DeviceMap;
use crate::protocol;
use crate::transport::Transport;
use maybe_async::maybe_async;

/// Read-pointer value the engine parks at after decoding an invalid
/// command. Command pointers are always 4-byte aligned, so this value
/// cannot occur in normal operation.
pub const FAULT_MARK: u16 = 0xFFF;

/// Host-side state for the device's command ring buffer
///
/// Holds only scalar fields; the buffer itself lives on the device.
#[derive(Debug)]
pub struct CmdFifo {
    base: u32,
    reg_read: u32,
    reg_write: u32,
    capacity: u16,
    margin: u16,
    write_ptr: u16,
    committed: u16,
    // Space the caller is currently authorized to consume: set by
    // `free_space`, decremented by `advance`. Advancing past it is a
    // caller bug and panics rather than corrupting the ring.
    known_space: u16,
}

impl CmdFifo {
    /// Create a manager for the command buffer described by `map`
    ///
    /// Both pointers start at zero (the device resets its registers to
    /// zero at bring-up). No space is authorized until the first
    /// [`free_space`](Self::free_space) call.
    pub fn new(map: &DeviceMap) -> Self {
        Self {
            base: map.cmd_base,
            reg_read: map.reg_cmd_read,
            reg_write: map.reg_cmd_write,
            capacity: map.cmd_capacity,
            margin: map.cmd_margin,
            write_ptr: 0,
            committed: 0,
            known_space: 0,
        }
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Reserved margin in bytes
    pub fn margin(&self) -> u16 {
        self.margin
    }

    /// Current local write pointer, without side effects
    ///
    /// Useful when composing multi-step writes before committing.
    pub fn pointer(&self) -> u16 {
        self.write_ptr
    }

    /// Last pointer value published to the device
    pub fn committed(&self) -> u16 {
        self.committed
    }

    /// Device address of the byte the write pointer refers to
    pub fn pointer_address(&self) -> u32 {
        self.base + self.write_ptr as u32
    }

    /// Reset both pointers to the device's post-reset state
    pub fn reset(&mut self) {
        self.write_ptr = 0;
        self.committed = 0;
        self.known_space = 0;
    }

    /// What `free_space` would report for a given read-pointer value
    ///
    /// Pure wraparound arithmetic: the distance from the local write
    /// pointer to `read_ptr` minus one, minus the reserved margin,
    /// clamped at zero. Reporting strictly less than the true free space
    /// is what keeps the pointers from ever becoming equal after a wrap.
    pub fn space_from(&self, read_ptr: u16) -> u16 {
        let cap = self.capacity as u32;
        let dist = (read_ptr as u32 + cap - self.write_ptr as u32 - 1) % cap;
        (dist as u16).saturating_sub(self.margin)
    }

    /// Free bytes available for new command data
    ///
    /// Reads the device's read-pointer register fresh and refreshes the
    /// authorized space. A caller that writes no more than the returned
    /// amount before the next call can never violate the margin.
    #[maybe_async]
    pub async fn free_space<T: Transport + ?Sized>(&mut self, t: &mut T) -> Result<u16> {
        let read_ptr = protocol::mem_read(t, self.reg_read, Width::W16).await? as u16;
        let free = self.space_from(read_ptr);
        self.known_space = free;
        Ok(free)
    }

    /// Advance the local write pointer by `n` bytes, wrapping at capacity
    ///
    /// Pure local bookkeeping - does not touch the device. The caller must
    /// already have written `n` bytes at the prior pointer value.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the space authorized by the last
    /// [`free_space`](Self::free_space) call. That is a caller bug, and
    /// clamping it silently would corrupt the ring.
    pub fn advance(&mut self, n: u16) {
        assert!(
            n <= self.known_space,
            "advance({}) exceeds authorized free space ({})",
            n,
            self.known_space
        );
        self.write_ptr = ((self.write_ptr as u32 + n as u32) % self.capacity as u32) as u16;
        self.known_space -= n;
    }

    /// Publish the local write pointer to the device
    ///
    /// This is the only operation that makes staged bytes visible to the
    /// engine; until committed, bytes already written to the buffer region
    /// are present but dormant.
    #[maybe_async]
    pub async fn commit<T: Transport + ?Sized>(&mut self, t: &mut T) -> Result<()> {
        protocol::mem_write(t, self.reg_write, self.write_ptr as u32, Width::W16).await?;
        self.committed = self.write_ptr;
        log::trace!("cmd: committed write pointer {:#05x}", self.committed);
        Ok(())
    }

    /// Stage one 32-bit command word at the current pointer and advance
    ///
    /// Staging only - the caller still commits explicitly. The caller must
    /// hold at least 4 bytes of authorized space.
    #[maybe_async]
    pub async fn cmd_write<T: Transport + ?Sized>(&mut self, t: &mut T, word: u32) -> Result<()> {
        protocol::mem_write(t, self.pointer_address(), word, Width::W32).await?;
        self.advance(4);
        Ok(())
    }

    /// Stage a block of command bytes, wrapping at the region end
    ///
    /// The block is zero-padded to the next 4-byte slot boundary and the
    /// pointer advances by the padded length. Staging only.
    #[maybe_async]
    pub async fn cmd_append<T: Transport + ?Sized>(&mut self, t: &mut T, data: &[u8]) -> Result<()> {
        let padded = (data.len() + 3) & !3;
        assert!(
            padded <= self.known_space as usize,
            "append of {} bytes exceeds authorized free space ({})",
            padded,
            self.known_space
        );

        let cap = self.capacity as usize;
        let off = self.write_ptr as usize;
        let first = core::cmp::min(data.len(), cap - off);
        protocol::mem_write_block(t, self.base + off as u32, &data[..first]).await?;
        if first < data.len() {
            protocol::mem_write_block(t, self.base, &data[first..]).await?;
        }

        let pad = padded - data.len();
        if pad > 0 {
            let zeros = [0u8; 4];
            let pstart = (off + data.len()) % cap;
            let pfirst = core::cmp::min(pad, cap - pstart);
            protocol::mem_write_block(t, self.base + pstart as u32, &zeros[..pfirst]).await?;
            if pfirst < pad {
                protocol::mem_write_block(t, self.base, &zeros[pfirst..pad]).await?;
            }
        }

        self.advance(padded as u16);
        Ok(())
    }

    /// Poll until the engine has executed everything up to the last commit
    ///
    /// Polls the read-pointer register until it equals the committed write
    /// pointer. Returns [`Error::DrainTimeout`] once the poll bound elapses
    /// without convergence - an unresponsive engine cannot be recovered by
    /// polling harder. A read pointer parked at [`FAULT_MARK`] returns
    /// [`Error::CoprocessorFault`] instead, so callers can reset rather
    /// than wait.
    ///
    /// # Arguments
    /// * `poll_delay_us` - Delay in microseconds between register polls
    /// * `timeout_us` - Maximum time to wait before returning DrainTimeout
    #[maybe_async]
    pub async fn wait_drain<T: Transport + ?Sized>(
        &mut self,
        t: &mut T,
        poll_delay_us: u32,
        timeout_us: u32,
    ) -> Result<()> {
        let max_polls = if poll_delay_us > 0 {
            timeout_us / poll_delay_us
        } else {
            timeout_us // Fall back to polling once per microsecond
        };

        for _ in 0..max_polls {
            let read_ptr = protocol::mem_read(t, self.reg_read, Width::W16).await? as u16;
            if read_ptr == FAULT_MARK && self.committed != FAULT_MARK {
                log::warn!("cmd: engine fault mark in read pointer");
                return Err(Error::CoprocessorFault);
            }
            if read_ptr == self.committed {
                return Ok(());
            }
            if poll_delay_us > 0 {
                t.delay_us(poll_delay_us).await;
            }
        }

        log::warn!(
            "cmd: drain timeout, committed {:#05x} not reached within {} us",
            self.committed,
            timeout_us
        );
        Err(Error::DrainTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::DeviceMap;

    #[test]
    fn empty_buffer_reports_capacity_minus_margin_minus_one() {
        // read == write == 100: one byte plus the margin stays reserved
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        fifo.write_ptr = 100;
        assert_eq!(fifo.space_from(100), 4096 - 1 - 4);
    }

    #[test]
    fn space_follows_wraparound_formula() {
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        for (write, read) in [(0u16, 0u16), (4000, 12), (12, 4000), (4092, 4092), (1, 0)] {
            fifo.write_ptr = write;
            let expect = ((read as u32 + 4096 - write as u32 - 1) % 4096)
                .saturating_sub(4) as u16;
            assert_eq!(fifo.space_from(read), expect, "write={write} read={read}");
        }
    }

    #[test]
    fn space_clamps_at_zero() {
        // writer one byte behind the reader: distance 0, margin clamps to 0
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        fifo.write_ptr = 99;
        assert_eq!(fifo.space_from(100), 0);
        // distance smaller than the margin also clamps
        fifo.write_ptr = 97;
        assert_eq!(fifo.space_from(100), 0);
    }

    #[test]
    fn advance_wraps_at_capacity() {
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        fifo.write_ptr = 4094;
        fifo.known_space = 8;
        fifo.advance(5);
        assert_eq!(fifo.pointer(), 3);
    }

    #[test]
    #[should_panic(expected = "exceeds authorized free space")]
    fn advance_past_authorization_panics() {
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        fifo.known_space = 4;
        fifo.advance(8);
    }

    #[test]
    fn reset_clears_pointers_and_authorization() {
        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        fifo.write_ptr = 200;
        fifo.committed = 200;
        fifo.known_space = 100;
        fifo.reset();
        assert_eq!(fifo.pointer(), 0);
        assert_eq!(fifo.committed(), 0);
        assert_eq!(fifo.known_space, 0);
    }
}
