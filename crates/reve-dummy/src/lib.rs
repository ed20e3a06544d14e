//! reve-dummy - In-memory display coprocessor emulator for testing
//!
//! This crate provides a dummy device that emulates the chip's 24-bit
//! memory space, its pointer registers, its power/wake state and a
//! configurable command-consuming engine. It decodes the wire framing from
//! raw `select`/`write`/`read` calls, so the framer's exact byte stream is
//! what gets exercised. Useful for testing and development without real
//! hardware.

use std::cell::RefCell;
use std::rc::Rc;

use reve_core::error::{Error, Result};
use reve_core::fifo::FAULT_MARK;
use reve_core::frame::{hostcmd, ADDR_MASK};
use reve_core::map::DeviceMap;
use reve_core::transport::{Board, Transport};

/// How the emulated engine consumes committed command bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consume {
    /// The read pointer snaps to the write pointer as soon as it is
    /// published
    Immediate,
    /// The read pointer never advances (an unresponsive engine)
    Stalled,
    /// The read pointer advances up to `n` bytes on every read-pointer
    /// register probe
    PerPoll(u16),
}

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Register map the emulation honors
    pub map: DeviceMap,
    /// Engine consumption policy
    pub consume: Consume,
    /// Identifier value the emulated chip reports once awake
    pub chip_id: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            map: DeviceMap::ft81x(),
            consume: Consume::Immediate,
            chip_id: 0x7C,
        }
    }
}

struct Inner {
    config: DummyConfig,
    mem: Vec<u8>,
    powered: bool,
    awake: bool,
    selected: bool,
    // bytes clocked out by the host since selection
    tx: Vec<u8>,
    // active read cursor once a read preamble has been decoded
    read_addr: Option<u32>,
    read_ptr: u16,
    write_reg: u16,
    fault: bool,
    host_commands: Vec<(u8, u8)>,
    fail_after: Option<u32>,
    delay_calls: u32,
}

/// Dummy display coprocessor
///
/// Cheaply cloneable: clones share one emulated chip, so a test can hand
/// one clone to [`Device`](reve_core::Device) as the transport, another as
/// the board, and keep a third for inspection.
#[derive(Clone)]
pub struct DummyEve {
    inner: Rc<RefCell<Inner>>,
}

impl DummyEve {
    /// Create a dummy device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mem = vec![0u8; (ADDR_MASK as usize) + 1];
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                mem,
                powered: false,
                awake: false,
                selected: false,
                tx: Vec::new(),
                read_addr: None,
                read_ptr: 0,
                write_reg: 0,
                fault: false,
                host_commands: Vec::new(),
                fail_after: None,
                delay_calls: 0,
            })),
        }
    }

    /// Create a dummy device with default configuration (FT81x map)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// The emulated engine's read pointer
    pub fn read_pointer(&self) -> u16 {
        self.inner.borrow().read_ptr
    }

    /// Force the engine's read pointer to a value
    pub fn set_read_pointer(&self, value: u16) {
        self.inner.borrow_mut().read_ptr = value;
    }

    /// The write-pointer register value last published by the host
    pub fn write_register(&self) -> u16 {
        self.inner.borrow().write_reg
    }

    /// Change the consumption policy
    pub fn set_consume(&self, consume: Consume) {
        self.inner.borrow_mut().config.consume = consume;
    }

    /// Park the read pointer at the engine fault mark
    pub fn set_fault(&self, fault: bool) {
        self.inner.borrow_mut().fault = fault;
    }

    /// Fail every transport operation after `n` more succeed
    pub fn fail_after(&self, n: u32) {
        self.inner.borrow_mut().fail_after = Some(n);
    }

    /// Host commands observed so far, in order
    pub fn host_commands(&self) -> Vec<(u8, u8)> {
        self.inner.borrow().host_commands.clone()
    }

    /// Number of `delay_us` calls observed
    pub fn delay_calls(&self) -> u32 {
        self.inner.borrow().delay_calls
    }

    /// Is the emulated device powered?
    pub fn powered(&self) -> bool {
        self.inner.borrow().powered
    }

    /// Copy a range out of the emulated memory
    pub fn mem_snapshot(&self, addr: u32, len: usize) -> Vec<u8> {
        let addr = (addr & ADDR_MASK) as usize;
        self.inner.borrow().mem[addr..addr + len].to_vec()
    }
}

impl Inner {
    fn tick(&mut self) -> Result<()> {
        if let Some(n) = self.fail_after {
            if n == 0 {
                return Err(Error::Transport);
            }
            self.fail_after = Some(n - 1);
        }
        Ok(())
    }

    /// Mirror register state into the memory image so reads can be served
    /// uniformly from it
    fn sync_regs(&mut self) {
        let read_ptr = if self.fault { FAULT_MARK } else { self.read_ptr };
        let id = if self.powered && self.awake {
            self.config.chip_id as u32
        } else {
            0
        };
        let map = self.config.map.clone();
        self.store(map.reg_cmd_read, read_ptr as u32);
        self.store(map.reg_cmd_write, self.write_reg as u32);
        self.store(map.reg_id, id);
    }

    fn store(&mut self, addr: u32, value: u32) {
        let addr = (addr & ADDR_MASK) as usize;
        self.mem[addr..addr + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn consume_on_poll(&mut self) {
        if self.fault {
            return;
        }
        let cap = self.config.map.cmd_capacity as u32;
        match self.config.consume {
            Consume::Immediate => self.read_ptr = self.write_reg,
            Consume::Stalled => {}
            Consume::PerPoll(n) => {
                let pending = (self.write_reg as u32 + cap - self.read_ptr as u32) % cap;
                let step = pending.min(n as u32);
                self.read_ptr = ((self.read_ptr as u32 + step) % cap) as u16;
            }
        }
    }

    fn apply_write(&mut self, addr: u32, payload: &[u8]) {
        if !self.powered {
            log::trace!("dummy: dropping write while unpowered");
            return;
        }
        for (i, &byte) in payload.iter().enumerate() {
            let a = ((addr as usize) + i) & ADDR_MASK as usize;
            self.mem[a] = byte;
        }

        // A write covering the write-pointer register publishes a commit
        let map = self.config.map.clone();
        let reg = map.reg_cmd_write;
        let end = addr + payload.len() as u32;
        if addr <= reg && reg < end {
            let lo = self.mem[reg as usize] as u16;
            let hi = self.mem[(reg + 1) as usize] as u16;
            self.write_reg = ((hi << 8) | lo) % map.cmd_capacity;
            if let Consume::Immediate = self.config.consume {
                if !self.fault {
                    self.read_ptr = self.write_reg;
                }
            }
        }
    }

    fn handle_host_command(&mut self, cmd: u8, param: u8) {
        self.host_commands.push((cmd, param));
        match cmd {
            hostcmd::ACTIVE => {
                if self.powered {
                    self.awake = true;
                }
            }
            hostcmd::STANDBY | hostcmd::SLEEP => self.awake = false,
            hostcmd::PWRDOWN => {
                self.powered = false;
                self.awake = false;
            }
            _ => {}
        }
    }

    /// End-of-transaction decode for write and host-command frames
    fn finish_transaction(&mut self) {
        if self.read_addr.is_some() {
            return; // read transaction, already served
        }
        if self.tx.len() >= 3 && self.tx[0] & 0x80 != 0 {
            let addr = ((self.tx[0] as u32 & 0x3F) << 16)
                | ((self.tx[1] as u32) << 8)
                | self.tx[2] as u32;
            let payload = self.tx.split_off(3);
            self.apply_write(addr, &payload);
        } else if self.tx.len() == 3 && self.tx[2] == 0 {
            let (cmd, param) = (self.tx[0], self.tx[1]);
            self.handle_host_command(cmd, param);
        }
    }
}

impl Transport for DummyEve {
    fn select(&mut self, enable: bool) -> Result<()> {
        let mut d = self.inner.borrow_mut();
        d.tick()?;
        if enable {
            if d.selected {
                return Err(Error::Transport); // nested selection is forbidden
            }
            d.selected = true;
            d.tx.clear();
            d.read_addr = None;
        } else {
            if !d.selected {
                return Err(Error::Transport);
            }
            d.selected = false;
            d.finish_transaction();
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut d = self.inner.borrow_mut();
        d.tick()?;
        if !d.selected || d.read_addr.is_some() {
            return Err(Error::Transport);
        }
        d.tx.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut d = self.inner.borrow_mut();
        d.tick()?;
        if !d.selected {
            return Err(Error::Transport);
        }

        let addr = match d.read_addr {
            Some(addr) => addr,
            None => {
                // decode the read preamble: 3 address bytes + 1 dummy
                if d.tx.len() < 4 || d.tx[0] & 0xC0 != 0 {
                    return Err(Error::Transport);
                }
                ((d.tx[0] as u32 & 0x3F) << 16) | ((d.tx[1] as u32) << 8) | d.tx[2] as u32
            }
        };

        // A probe touching the read-pointer register drives the engine
        let reg = d.config.map.reg_cmd_read;
        let end = addr + buf.len() as u32;
        if addr <= reg && reg < end {
            d.consume_on_poll();
        }
        d.sync_regs();

        let start = (addr & ADDR_MASK) as usize;
        if start + buf.len() > d.mem.len() {
            return Err(Error::Transport);
        }
        buf.copy_from_slice(&d.mem[start..start + buf.len()]);
        d.read_addr = Some(addr + buf.len() as u32);
        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {
        self.inner.borrow_mut().delay_calls += 1;
    }
}

impl Board for DummyEve {
    fn set_power(&mut self, enable: bool) -> Result<()> {
        let mut d = self.inner.borrow_mut();
        d.powered = enable;
        d.awake = false;
        if enable {
            // device reset: pointer registers come up at zero
            d.read_ptr = 0;
            d.write_reg = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reve_core::frame::Width;
    use reve_core::{protocol, CmdFifo, Device, Error, Lifecycle};

    fn active_device(config: DummyConfig) -> (Device<DummyEve, DummyEve>, DummyEve) {
        let dummy = DummyEve::new(config);
        let map = dummy.inner.borrow().config.map.clone();
        let mut dev = Device::new(dummy.clone(), dummy.clone(), map);
        dev.bring_up().unwrap();
        (dev, dummy)
    }

    #[test]
    fn bring_up_reaches_active() {
        let (dev, dummy) = active_device(DummyConfig::default());
        assert_eq!(dev.state(), Lifecycle::Active);
        // wake sequence: clock select, then ACTIVE
        assert_eq!(
            dummy.host_commands(),
            vec![(hostcmd::CLKEXT, 0), (hostcmd::ACTIVE, 0)]
        );
    }

    #[test]
    fn bring_up_wrong_id_faults() {
        let dummy = DummyEve::new(DummyConfig {
            chip_id: 0x15,
            ..DummyConfig::default()
        });
        let mut dev = Device::new(dummy.clone(), dummy, DeviceMap::ft81x());
        assert_eq!(dev.bring_up(), Err(Error::DeviceNotDetected));
        assert_eq!(dev.state(), Lifecycle::Faulted);
    }

    #[test]
    fn scalar_round_trips() {
        let (mut dev, _) = active_device(DummyConfig::default());
        for (value, width) in [
            (0xA5, Width::W8),
            (0xBEEF, Width::W16),
            (0xDEAD_BEEF, Width::W32),
        ] {
            dev.mem_write(0x20_0000, value, width).unwrap();
            assert_eq!(dev.mem_read(0x20_0000, width).unwrap(), value);
        }
    }

    #[test]
    fn block_round_trip() {
        let (mut dev, _) = active_device(DummyConfig::default());
        let pattern: Vec<u8> = (0u8..64).map(|i| i.wrapping_mul(7)).collect();
        dev.mem_write_block(0x21_0000, &pattern).unwrap();
        let mut back = vec![0u8; pattern.len()];
        dev.mem_read_block(0x21_0000, &mut back).unwrap();
        assert_eq!(back, pattern);
    }

    #[test]
    fn empty_buffer_free_space() {
        let (mut dev, _) = active_device(DummyConfig {
            consume: Consume::Stalled,
            ..DummyConfig::default()
        });
        // capacity 4096, margin 4, both pointers equal
        assert_eq!(dev.cmd_free_space().unwrap(), 4091);
    }

    #[test]
    fn margin_never_violated() {
        let (mut dev, dummy) = active_device(DummyConfig {
            consume: Consume::Stalled,
            ..DummyConfig::default()
        });
        // consume every byte the manager will authorize against a stalled
        // engine; the pointers must never meet
        loop {
            let free = dev.cmd_free_space().unwrap();
            if free == 0 {
                break;
            }
            dev.cmd_advance(free.min(512));
            assert_ne!(dev.cmd_pointer(), dummy.read_pointer());
        }
        assert_ne!(dev.cmd_pointer(), dummy.read_pointer());
    }

    #[test]
    fn advance_wraps_at_boundary() {
        let (mut dev, _) = active_device(DummyConfig::default());
        // walk the pointer to capacity - 2, letting the engine drain so
        // space keeps being authorized
        dev.cmd_free_space().unwrap();
        dev.cmd_advance(4000);
        dev.cmd_commit().unwrap();
        dev.cmd_free_space().unwrap();
        dev.cmd_advance(94);
        dev.cmd_commit().unwrap();
        assert_eq!(dev.cmd_pointer(), 4094);

        dev.cmd_free_space().unwrap();
        dev.cmd_advance(5);
        assert_eq!(dev.cmd_pointer(), 3);
    }

    #[test]
    #[should_panic(expected = "exceeds authorized free space")]
    fn advance_without_authorization_panics() {
        let (mut dev, _) = active_device(DummyConfig::default());
        // no free_space call yet, nothing is authorized
        dev.cmd_advance(4);
    }

    #[test]
    fn drained_commit_needs_no_polling() {
        let (mut dev, dummy) = active_device(DummyConfig::default());
        dev.cmd_free_space().unwrap();
        dev.cmd_write(0xFFFF_FF00).unwrap();
        dev.cmd_write(0x0000_0000).unwrap();
        let delays_before = dummy.delay_calls();
        dev.cmd_commit().unwrap();
        dev.cmd_wait_drain(100, 100_000).unwrap();
        // the engine had already drained: the first probe matches, no spin
        assert_eq!(dummy.delay_calls(), delays_before);
    }

    #[test]
    fn stalled_engine_times_out() {
        let (mut dev, dummy) = active_device(DummyConfig {
            consume: Consume::Stalled,
            ..DummyConfig::default()
        });
        dev.cmd_free_space().unwrap();
        dev.cmd_append(&[0x11; 100]).unwrap();
        dev.cmd_commit().unwrap();
        assert_eq!(dummy.read_pointer(), 0);
        // bound of 1000 polls: must return, never hang
        assert_eq!(dev.cmd_wait_drain(1, 1000), Err(Error::DrainTimeout));
    }

    #[test]
    fn slow_engine_drains_within_bound() {
        let (mut dev, _) = active_device(DummyConfig {
            consume: Consume::PerPoll(8),
            ..DummyConfig::default()
        });
        dev.cmd_free_space().unwrap();
        dev.cmd_append(&[0x22; 32]).unwrap();
        dev.cmd_commit().unwrap();
        dev.cmd_wait_drain(1, 1000).unwrap();
    }

    #[test]
    fn fault_mark_is_distinguished_from_timeout() {
        let (mut dev, dummy) = active_device(DummyConfig {
            consume: Consume::Stalled,
            ..DummyConfig::default()
        });
        dev.cmd_free_space().unwrap();
        dev.cmd_write(0xFFFF_FF01).unwrap();
        dev.cmd_commit().unwrap();
        dummy.set_fault(true);
        assert_eq!(dev.cmd_wait_drain(1, 1000), Err(Error::CoprocessorFault));
    }

    #[test]
    fn append_wraps_across_region_end() {
        let (mut dev, dummy) = active_device(DummyConfig::default());
        let base = dev.map().cmd_base;
        dev.cmd_free_space().unwrap();
        dev.cmd_advance(4088);
        dev.cmd_commit().unwrap();
        dev.cmd_free_space().unwrap();

        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        dev.cmd_append(&data).unwrap();
        // 8 bytes fit before the region end, the tail wraps to the base
        assert_eq!(dummy.mem_snapshot(base + 4088, 8), &data[..8]);
        assert_eq!(dummy.mem_snapshot(base, 2), &data[8..]);
        // padded to the next 4-byte slot: 4088 + 12 wraps to 4
        assert_eq!(dev.cmd_pointer(), 4);
    }

    #[test]
    fn transport_failure_propagates_unchanged() {
        let (mut dev, dummy) = active_device(DummyConfig::default());
        dummy.fail_after(0);
        assert_eq!(dev.mem_read(0x20_0000, Width::W32), Err(Error::Transport));
        assert_eq!(dev.cmd_free_space(), Err(Error::Transport));
    }

    #[test]
    fn streaming_primitives_compose_one_transaction() {
        let dummy = DummyEve::new_default();
        let mut t = dummy.clone();
        let mut board = dummy.clone();
        Board::set_power(&mut board, true).unwrap();
        protocol::host_command(&mut t, hostcmd::ACTIVE, 0).unwrap();

        t.select(true).unwrap();
        protocol::begin_write(&mut t, 0x25_0000).unwrap();
        protocol::stream_word(&mut t, 0x1122_3344, Width::W32).unwrap();
        protocol::stream_bytes(&mut t, &[0xAA, 0xBB]).unwrap();
        t.select(false).unwrap();

        assert_eq!(
            dummy.mem_snapshot(0x25_0000, 6),
            &[0x44, 0x33, 0x22, 0x11, 0xAA, 0xBB]
        );
    }

    #[test]
    fn free_space_reflects_staged_but_uncommitted_bytes() {
        let (mut dev, dummy) = active_device(DummyConfig {
            consume: Consume::Stalled,
            ..DummyConfig::default()
        });
        dev.cmd_free_space().unwrap();
        dev.cmd_write(0xFFFF_FF02).unwrap();
        dev.cmd_write(0x0000_0064).unwrap();
        // advance is local bookkeeping: nothing published yet
        assert_eq!(dummy.write_register(), 0);
        assert_eq!(dev.cmd_free_space().unwrap(), 4091 - 8);

        dev.cmd_commit().unwrap();
        assert_eq!(dummy.write_register(), 8);
    }

    #[test]
    fn fifo_drives_a_borrowed_transport() {
        // CmdFifo is usable without the Device handle
        let dummy = DummyEve::new_default();
        let mut t = dummy.clone();
        let mut board = dummy.clone();
        Board::set_power(&mut board, true).unwrap();
        protocol::host_command(&mut t, hostcmd::ACTIVE, 0).unwrap();

        let mut fifo = CmdFifo::new(&DeviceMap::ft81x());
        assert_eq!(fifo.free_space(&mut t).unwrap(), 4091);
        fifo.cmd_write(&mut t, 0xFFFF_FF32).unwrap();
        fifo.commit(&mut t).unwrap();
        fifo.wait_drain(&mut t, 1, 100).unwrap();
        assert_eq!(dummy.read_pointer(), 4);
    }
}
