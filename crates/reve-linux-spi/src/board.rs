//! Power-down line control via the Linux GPIO character device
//!
//! The chip's PD# pin is active low: driving the line low holds the device
//! in power-down. `set_power(true)` therefore drives the line high.
//! Datasheet hold times around the edges are sequenced by the caller
//! (`Device::bring_up`), not here.

use crate::error::{LinuxEveError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use reve_core::error::{Error as CoreError, Result as CoreResult};
use reve_core::transport::Board;

/// Configuration for the power-down line
#[derive(Debug, Clone)]
pub struct LinuxBoardConfig {
    /// GPIO chip path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Power-down line offset on that chip
    pub pd: Offset,
}

impl LinuxBoardConfig {
    /// Create a new configuration for the given chip path and PD line
    pub fn new(device: impl Into<String>, pd: Offset) -> Self {
        Self {
            device: device.into(),
            pd,
        }
    }
}

/// Board collaborator driving the power-down line through gpiocdev
pub struct LinuxBoard {
    request: Request,
    pd: Offset,
}

impl LinuxBoard {
    /// Request the power-down line, initially asserted (device off)
    pub fn open(config: &LinuxBoardConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxEveError::NoDevice);
        }

        log::debug!(
            "linux_board: Requesting PD line {} on {}",
            config.pd,
            config.device
        );

        let mut req_config = Config::default();
        // PD# is active low: start low, device held in power-down
        req_config.with_line(config.pd).as_output(Value::Inactive);

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("reve")
            .request()
            .map_err(LinuxEveError::LineRequestFailed)?;

        Ok(Self {
            request,
            pd: config.pd,
        })
    }

    fn set_line(&mut self, high: bool) -> Result<()> {
        let value = if high { Value::Active } else { Value::Inactive };
        self.request
            .set_value(self.pd, value)
            .map_err(LinuxEveError::SetValueFailed)?;
        log::trace!("linux_board: PD line {}", if high { "high" } else { "low" });
        Ok(())
    }
}

impl Board for LinuxBoard {
    fn set_power(&mut self, enable: bool) -> CoreResult<()> {
        self.set_line(enable).map_err(|e| {
            log::error!("linux_board: {}", e);
            CoreError::Transport
        })
    }
}
