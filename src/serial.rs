use crate::config::SerialSettings;
use crate::framing::ByteSource;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Byte source over a serial device (8N1, no flow control).
///
/// Reads block until data arrives, waking every poll timeout to check the
/// shutdown flag. Once the flag is set, reads fail with
/// [`io::ErrorKind::Interrupted`].
pub struct SerialByteSource {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    shutdown: Arc<AtomicBool>,
}

impl SerialByteSource {
    pub fn open(settings: &SerialSettings, shutdown: Arc<AtomicBool>) -> serialport::Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.poll_timeout())
            .open()?;

        info!(port = %settings.port, baud = settings.baud_rate, "Serial port opened");
        Ok(Self {
            path: settings.port.clone(),
            port: Some(port),
            shutdown,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ByteSource for SerialByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "shutdown requested",
                ));
            }
            let Some(port) = self.port.as_mut() else {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "serial port closed",
                ));
            };

            match port.read(buf) {
                Ok(n) => return Ok(n),
                // Nothing arrived within the poll timeout, or a signal woke us
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!(port = %self.path, "Serial port closed");
        }
        Ok(())
    }
}
