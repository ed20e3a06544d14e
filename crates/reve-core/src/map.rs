//! Device register map configuration
//!
//! The addresses of the pointer registers, the identifier register and the
//! command buffer region are datasheet constants that differ between chip
//! generations. They are configuration, not behavior: everything in this
//! crate takes them from a [`DeviceMap`] value instead of hard-coding them.

use crate::frame::ADDR_MASK;

/// Which clock source the wake sequence selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockSource {
    /// External crystal/oscillator (the usual board design)
    #[default]
    External,
    /// Internal oscillator
    Internal,
}

/// Register map and command-buffer geometry for one chip generation
///
/// All addresses live in the device's flat 24-bit space and are masked at
/// construction. Use a preset ([`ft80x`](Self::ft80x), [`ft81x`](Self::ft81x))
/// and adjust with the `with_*` methods where a board deviates.
#[derive(Debug, Clone)]
pub struct DeviceMap {
    /// Chip identifier register address
    pub reg_id: u32,
    /// Expected identifier value
    pub chip_id: u8,
    /// Read-pointer register (device-owned, read-only from the host)
    pub reg_cmd_read: u32,
    /// Write-pointer register (published by the host on commit)
    pub reg_cmd_write: u32,
    /// Base address of the command buffer region
    pub cmd_base: u32,
    /// Command buffer capacity in bytes
    pub cmd_capacity: u16,
    /// Reserved margin in bytes - one minimal command slot. Keeps the two
    /// pointers from ever becoming equal through host writes, which would
    /// make "full" indistinguishable from "empty".
    pub cmd_margin: u16,
    /// Clock source selected during the wake sequence
    pub clock: ClockSource,
    /// How many times to poll the identifier register during bring-up
    pub id_poll_limit: u32,
    /// Delay between identifier polls, microseconds
    pub id_poll_delay_us: u32,
}

impl DeviceMap {
    /// Map for the FT800/FT801 generation
    pub fn ft80x() -> Self {
        Self {
            reg_id: 0x10_2400,
            chip_id: 0x7C,
            reg_cmd_read: 0x10_24E4,
            reg_cmd_write: 0x10_24E8,
            cmd_base: 0x10_8000,
            cmd_capacity: 4096,
            cmd_margin: 4,
            clock: ClockSource::External,
            id_poll_limit: 100,
            id_poll_delay_us: 3_000,
        }
    }

    /// Map for the FT810..FT813 generation
    pub fn ft81x() -> Self {
        Self {
            reg_id: 0x30_2000,
            chip_id: 0x7C,
            reg_cmd_read: 0x30_20F8,
            reg_cmd_write: 0x30_20FC,
            cmd_base: 0x30_8000,
            cmd_capacity: 4096,
            cmd_margin: 4,
            clock: ClockSource::External,
            id_poll_limit: 100,
            id_poll_delay_us: 3_000,
        }
    }

    /// Override the clock source
    pub fn with_clock(mut self, clock: ClockSource) -> Self {
        self.clock = clock;
        self
    }

    /// Override the reserved margin (bytes)
    ///
    /// Tie this to the target chip's minimum instruction size; it is not a
    /// universal constant.
    pub fn with_margin(mut self, margin: u16) -> Self {
        self.cmd_margin = margin;
        self
    }

    /// Override the identifier poll bound
    pub fn with_id_poll(mut self, limit: u32, delay_us: u32) -> Self {
        self.id_poll_limit = limit;
        self.id_poll_delay_us = delay_us;
        self
    }

    /// Mask every address to the 24-bit device space
    pub fn masked(mut self) -> Self {
        self.reg_id &= ADDR_MASK;
        self.reg_cmd_read &= ADDR_MASK;
        self.reg_cmd_write &= ADDR_MASK;
        self.cmd_base &= ADDR_MASK;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_in_24_bit_space() {
        for map in [DeviceMap::ft80x(), DeviceMap::ft81x()] {
            assert_eq!(map.reg_id & !ADDR_MASK, 0);
            assert_eq!(map.cmd_base & !ADDR_MASK, 0);
            assert_eq!(map.cmd_capacity, 4096);
            assert_eq!(map.cmd_margin, 4);
        }
    }

    #[test]
    fn masked_truncates_addresses() {
        let mut map = DeviceMap::ft81x();
        map.reg_id = 0xAB30_2000;
        let map = map.masked();
        assert_eq!(map.reg_id, 0x30_2000);
    }
}
