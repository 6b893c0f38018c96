
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{FlowControl, SerialPort};

use crate::error::{Error, Result};

pub const DEFAULT_ADDRESS: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 57_600;
pub const DEFAULT_TIMEOUT_SEC: f32 = 2.0;

/// Connection parameters for one serial instrument.
///
/// The instrument expects a DTR/DSR handshake; `serialport` only exposes
/// RTS/CTS as its hardware mode, so the default is `FlowControl::Hardware`
/// and `SerialClient::open` asserts DTR on top of it.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub address: String,
    pub baud_rate: u32,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl Default for SerialConfig {

    fn default() -> Self {
        SerialConfig {
            address: DEFAULT_ADDRESS.to_owned(),
            baud_rate: DEFAULT_BAUD_RATE,
            flow_control: FlowControl::Hardware,
            timeout: Duration::from_secs_f32(DEFAULT_TIMEOUT_SEC),
        }
    }

}

/// Seam between device drivers and the wire.  Every call is synchronous and
/// blocks until the underlying transport confirms it (or its timeout fires).
pub trait Transport {

    /// Send one SCPI command; the transport appends the `\n` terminator.
    fn write_str(&mut self, cmd: &str) -> Result<()>;

    /// Send bytes exactly as given, no terminator.
    fn write_raw(&mut self, data: &[u8]) -> Result<()>;

    /// Block until one newline-terminated response line arrives and return
    /// it with the terminator (and any trailing `\r`) stripped.
    fn read_line(&mut self) -> Result<String>;

}

pub struct SerialClient {
    port: Box<dyn SerialPort>,
}

impl SerialClient {

    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut port = serialport::new(&config.address, config.baud_rate)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|e| Error::Connection(format!("{}: {}", config.address, e)))?;

        port.write_data_terminal_ready(true)?;

        Ok(SerialClient { port })
    }

}

impl Transport for SerialClient {

    fn write_str(&mut self, cmd: &str) -> Result<()> {
        self.port.write_all(cmd.as_bytes())?;
        self.port.write_all(b"\n")?;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buff: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            self.port.read_exact(&mut byte)?;
            if byte[0] == b'\n' { break; }
            buff.push(byte[0]);
        }

        if buff.last() == Some(&b'\r') { buff.pop(); }

        String::from_utf8(buff)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Unable to parse response as UTF-8").into())
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn default_config_matches_instrument_serial_settings() {
        let config = SerialConfig::default();
        assert_eq!(config.address, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.flow_control, FlowControl::Hardware);
    }

}
