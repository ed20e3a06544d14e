//! Device handle and lifecycle controller
//!
//! [`Device`] is the explicit handle that ties a transport, a board
//! collaborator and a register map together - there is no ambient global
//! "current device", so multiple independent devices and mock transports
//! compose naturally.

use crate::error::{Error, Result};
use crate::fifo::CmdFifo;
use crate::frame::{hostcmd, Width};
use crate::map::{ClockSource, DeviceMap};
use crate::protocol;
use crate::transport::{Board, Transport};
use maybe_async::maybe_async;

/// Hold time on the power-down line while cycling power, microseconds
const POWER_CYCLE_HOLD_US: u32 = 20_000;
/// Settle time after releasing the power-down line, before host commands
const POST_POWER_DELAY_US: u32 = 20_000;

/// Lifecycle state of the device
///
/// `Powered` is the unverified state between power-up and a successful
/// identifier check. Recovery from `Faulted` is a full
/// [`bring_up`](Device::bring_up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Power-down line asserted, device off
    #[default]
    Unpowered,
    /// Powered but not yet verified present
    Powered,
    /// Identifier verified; framer and command buffer are usable
    Active,
    /// Identifier mismatch during bring-up
    Faulted,
}

/// Handle for one display coprocessor device
pub struct Device<T: Transport, B: Board> {
    transport: T,
    board: B,
    map: DeviceMap,
    fifo: CmdFifo,
    state: Lifecycle,
}

impl<T: Transport, B: Board> Device<T, B> {
    /// Create a handle in the `Unpowered` state
    ///
    /// The map's addresses are masked to the 24-bit device space.
    pub fn new(transport: T, board: B, map: DeviceMap) -> Self {
        let map = map.masked();
        let fifo = CmdFifo::new(&map);
        Self {
            transport,
            board,
            map,
            fifo,
            state: Lifecycle::Unpowered,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// The register map this handle was configured with
    pub fn map(&self) -> &DeviceMap {
        &self.map
    }

    /// Read-only view of the command buffer state
    pub fn fifo(&self) -> &CmdFifo {
        &self.fifo
    }

    /// Consume the handle, returning the transport and board
    pub fn into_parts(self) -> (T, B) {
        (self.transport, self.board)
    }

    /// Current local command write pointer
    pub fn cmd_pointer(&self) -> u16 {
        self.fifo.pointer()
    }

    /// Advance the local command write pointer (local bookkeeping only)
    pub fn cmd_advance(&mut self, n: u16) {
        self.fifo.advance(n);
    }
}

impl<T: Transport, B: Board> Device<T, B> {
    /// Power cycle the device and verify its presence
    ///
    /// Sequences the power-down line with datasheet hold times, issues the
    /// wake sequence (clock select, then `ACTIVE`), then polls the chip
    /// identifier register within the map's bounded retry count. On a
    /// match the command buffer pointers are reset and the device is
    /// `Active`; on exhaustion the device is `Faulted` and the call fails
    /// with [`Error::DeviceNotDetected`] - no automatic retry beyond the
    /// datasheet's own timing.
    #[maybe_async]
    pub async fn bring_up(&mut self) -> Result<()> {
        log::debug!("bring-up: power cycling");
        self.board.set_power(false).await?;
        self.transport.delay_us(POWER_CYCLE_HOLD_US).await;
        self.board.set_power(true).await?;
        self.transport.delay_us(POST_POWER_DELAY_US).await;
        self.state = Lifecycle::Powered;

        let clock = match self.map.clock {
            ClockSource::External => hostcmd::CLKEXT,
            ClockSource::Internal => hostcmd::CLKINT,
        };
        protocol::host_command(&mut self.transport, clock, 0).await?;
        protocol::host_command(&mut self.transport, hostcmd::ACTIVE, 0).await?;

        for _ in 0..self.map.id_poll_limit {
            let id = protocol::mem_read(&mut self.transport, self.map.reg_id, Width::W8).await?;
            if id as u8 == self.map.chip_id {
                self.fifo.reset();
                self.state = Lifecycle::Active;
                log::info!("bring-up: device active, id {:#04x}", id);
                return Ok(());
            }
            self.transport.delay_us(self.map.id_poll_delay_us).await;
        }

        log::warn!(
            "bring-up: identifier register {:#08x} never read {:#04x}",
            self.map.reg_id,
            self.map.chip_id
        );
        self.state = Lifecycle::Faulted;
        Err(Error::DeviceNotDetected)
    }

    /// Thin pass-through to the board power-down control
    ///
    /// `enable` asserts power-down (device off). No wake sequence is
    /// issued when releasing it; use [`bring_up`](Self::bring_up) for that.
    #[maybe_async]
    pub async fn power_down(&mut self, enable: bool) -> Result<()> {
        self.board.set_power(!enable).await?;
        self.state = if enable {
            Lifecycle::Unpowered
        } else {
            Lifecycle::Powered
        };
        Ok(())
    }

    /// Thin pass-through to the transport selection line
    #[maybe_async]
    pub async fn select(&mut self, enable: bool) -> Result<()> {
        self.transport.select(enable).await
    }

    // =========================================================================
    // Framer pass-throughs
    // =========================================================================

    /// Read a scalar from a device memory location
    #[maybe_async]
    pub async fn mem_read(&mut self, addr: u32, width: Width) -> Result<u32> {
        protocol::mem_read(&mut self.transport, addr, width).await
    }

    /// Write a scalar to a device memory location
    #[maybe_async]
    pub async fn mem_write(&mut self, addr: u32, value: u32, width: Width) -> Result<()> {
        protocol::mem_write(&mut self.transport, addr, value, width).await
    }

    /// Read a block of bytes from a device memory location
    #[maybe_async]
    pub async fn mem_read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        protocol::mem_read_block(&mut self.transport, addr, buf).await
    }

    /// Write a block of bytes to a device memory location
    #[maybe_async]
    pub async fn mem_write_block(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        protocol::mem_write_block(&mut self.transport, addr, data).await
    }

    /// Send a host command
    #[maybe_async]
    pub async fn host_command(&mut self, cmd: u8, param: u8) -> Result<()> {
        protocol::host_command(&mut self.transport, cmd, param).await
    }

    // =========================================================================
    // Command buffer pass-throughs
    // =========================================================================

    /// Free bytes available in the command buffer
    #[maybe_async]
    pub async fn cmd_free_space(&mut self) -> Result<u16> {
        self.fifo.free_space(&mut self.transport).await
    }

    /// Publish the local write pointer to the device
    #[maybe_async]
    pub async fn cmd_commit(&mut self) -> Result<()> {
        self.fifo.commit(&mut self.transport).await
    }

    /// Stage one 32-bit command word and advance
    #[maybe_async]
    pub async fn cmd_write(&mut self, word: u32) -> Result<()> {
        self.fifo.cmd_write(&mut self.transport, word).await
    }

    /// Stage a block of command bytes, wrapping at the region end
    #[maybe_async]
    pub async fn cmd_append(&mut self, data: &[u8]) -> Result<()> {
        self.fifo.cmd_append(&mut self.transport, data).await
    }

    /// Poll until the engine has drained everything up to the last commit
    #[maybe_async]
    pub async fn cmd_wait_drain(&mut self, poll_delay_us: u32, timeout_us: u32) -> Result<()> {
        self.fifo
            .wait_drain(&mut self.transport, poll_delay_us, timeout_us)
            .await
    }
}
