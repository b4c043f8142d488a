// MIT License - Copyright (c) 2026 Peter Wright
// Serial device link

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use super::SerialLink;
use crate::constants::BAUD_RATE;
use crate::error::Result;

/// A real serial device configured for the automation module:
/// 9600 baud, 8 data bits, odd parity, 1 stop bit, no flow control.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialPortLink {
    /// Open `device` with `byte_timeout` as the per-byte read deadline.
    pub fn open(device: &str, byte_timeout: Duration) -> Result<Self> {
        let port = serialport::new(device, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::Odd)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(byte_timeout)
            .open()?;
        info!("Opened serial device {} at {} baud", device, BAUD_RATE);
        Ok(Self {
            port,
            device: device.to_string(),
        })
    }
}

impl SerialLink for SerialPortLink {
    fn bytes_waiting(&mut self) -> Result<bool> {
        Ok(self.port.bytes_to_read()? > 0)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // The descriptor is released on drop; make sure nothing is left buffered.
        self.port.flush()?;
        debug!("Closed serial device {}", self.device);
        Ok(())
    }
}
