//! Linux spidev transport implementation
//!
//! This module provides the `LinuxSpi` struct that implements the reve
//! `Transport` trait using Linux's spidev interface.
//!
//! spidev asserts chip select per kernel message, not per file handle, so
//! the explicit `select(true) .. select(false)` scope is mapped onto
//! messages as follows: written bytes are buffered and flushed as one
//! message (chip select held between chunks via `cs_change`), and a `read`
//! call flushes the buffered bytes plus the receive transfer in a single
//! scope-ending exchange. One read phase per transaction, at its end -
//! which is exactly the shape of the framed protocol above.

use crate::error::{LinuxEveError, Result};

use reve_core::error::{Error as CoreError, Result as CoreResult};
use reve_core::transport::Transport;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (10 MHz; the chips accept up to 30 MHz
/// once the system clock is up, but must be driven below 11 MHz until the
/// wake sequence completes)
const DEFAULT_SPEED_HZ: u32 = 10_000_000;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of spi_ioc_transfer struct (for 64-bit systems)
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * transfer size])
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 10 MHz)
    pub speed_hz: u32,
    /// SPI mode (0-3, default: 0)
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Linux spidev transport
///
/// Implements the reve `Transport` trait for Linux systems using the
/// `/dev/spidevX.Y` device interface.
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    /// Inside a selection scope
    selected: bool,
    /// Bytes buffered since selection, not yet on the wire
    tx: Vec<u8>,
    /// The transaction's read phase has completed (chip select released)
    read_done: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxEveError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxEveError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        let spi_mode = config.mode;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &spi_mode).map_err(|e| LinuxEveError::SetModeFailed {
                mode: spi_mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxEveError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxEveError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz)",
            config.device,
            spi_mode,
            speed / 1000
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
            speed_hz: speed,
            selected: false,
            tx: Vec::new(),
            read_done: false,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Set a new SPI clock speed
    pub fn set_speed(&mut self, speed_hz: u32) -> Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed_hz).map_err(|e| {
                LinuxEveError::SetSpeedFailed {
                    speed: speed_hz,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        self.speed_hz = speed_hz;
        log::debug!("linux_spi: Set speed to {} Hz", speed_hz);
        Ok(())
    }

    /// Issue one kernel message with a single transfer
    ///
    /// `hold_cs` keeps chip select asserted after the message completes
    /// (the kernel's `cs_change`-on-final-transfer convention), which is
    /// how a logical transaction spans multiple messages.
    fn send_message(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, hold_cs: bool) -> Result<()> {
        let len = tx.map(<[u8]>::len).or(rx.as_ref().map(|b| b.len())).unwrap_or(0);
        if len == 0 {
            return Ok(());
        }

        let transfer = SpiIocTransfer {
            tx_buf: tx.map_or(0, |b| b.as_ptr() as u64),
            rx_buf: rx.map_or(0, |b| b.as_mut_ptr() as u64),
            len: len as u32,
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            cs_change: hold_cs as u8,
            ..Default::default()
        };

        let fd = self.file.as_raw_fd();
        let ioctl_num = ioctl::spi_ioc_message(1);
        let ret = unsafe { libc::ioctl(fd, ioctl_num, &transfer) };
        if ret < 0 {
            return Err(LinuxEveError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// Flush the buffered transmit bytes, optionally followed by a receive
    /// phase; the final message releases chip select
    fn flush(&mut self, mut rx: Option<&mut [u8]>) -> Result<()> {
        let chunk = self.max_kernel_buf_size;
        let tx = std::mem::take(&mut self.tx);

        let mut remaining = tx.as_slice();
        while !remaining.is_empty() {
            let n = remaining.len().min(chunk);
            let last = remaining.len() == n && rx.is_none();
            self.send_message(Some(&remaining[..n]), None, !last)?;
            remaining = &remaining[n..];
        }

        if let Some(buf) = rx.take() {
            let mut off = 0;
            while off < buf.len() {
                let n = (buf.len() - off).min(chunk);
                let last = off + n == buf.len();
                let (_, tail) = buf.split_at_mut(off);
                self.send_message(None, Some(&mut tail[..n]), !last)?;
                off += n;
            }
        }
        Ok(())
    }

    fn do_select(&mut self, enable: bool) -> Result<()> {
        if enable {
            if self.selected {
                return Err(LinuxEveError::UnsupportedSequence("nested selection"));
            }
            self.selected = true;
            self.tx.clear();
            self.read_done = false;
        } else {
            if !self.selected {
                return Err(LinuxEveError::UnsupportedSequence("deselect while idle"));
            }
            // write-only transactions hit the wire at deselection; a read
            // phase has already flushed and released chip select
            if !self.read_done {
                self.flush(None)?;
            }
            self.selected = false;
        }
        Ok(())
    }

    fn do_write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.selected {
            return Err(LinuxEveError::UnsupportedSequence(
                "write outside selection scope",
            ));
        }
        if self.read_done {
            return Err(LinuxEveError::UnsupportedSequence("write after read phase"));
        }
        self.tx.extend_from_slice(bytes);
        Ok(())
    }

    fn do_read(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.selected {
            return Err(LinuxEveError::UnsupportedSequence(
                "read outside selection scope",
            ));
        }
        if self.read_done {
            return Err(LinuxEveError::UnsupportedSequence(
                "second read phase in one transaction",
            ));
        }
        self.flush(Some(buf))?;
        self.read_done = true;
        Ok(())
    }
}

impl Transport for LinuxSpi {
    fn select(&mut self, enable: bool) -> CoreResult<()> {
        self.do_select(enable).map_err(|e| {
            log::error!("linux_spi: {}", e);
            CoreError::Transport
        })
    }

    fn write(&mut self, bytes: &[u8]) -> CoreResult<()> {
        self.do_write(bytes).map_err(|e| {
            log::error!("linux_spi: {}", e);
            CoreError::Transport
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        self.do_read(buf).map_err(|e| {
            log::error!("linux_spi: {}", e);
            CoreError::Transport
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}
