//! The read → decode → route loop.

use crate::framing::{ByteSource, FrameError, FrameReceiver, FramingMode};
use crate::protocol::Endianness;
use crate::router::{InputRouter, RouteError};
use std::io;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl BridgeError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::Frame(e) => e.is_recoverable(),
            BridgeError::Route(e) => e.is_recoverable(),
        }
    }

    /// The byte source was interrupted on purpose (shutdown requested).
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            BridgeError::Frame(FrameError::Transport(e)) if e.kind() == io::ErrorKind::Interrupted
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub packets: u64,
    pub framing_errors: u64,
    pub invalid_controls: u64,
    pub invalid_values: u64,
    pub discarded_bytes: u64,
}

pub struct Bridge<S> {
    receiver: FrameReceiver<S>,
    router: InputRouter,
    endianness: Endianness,
    stats: BridgeStats,
}

impl<S: ByteSource> Bridge<S> {
    pub fn new(receiver: FrameReceiver<S>, router: InputRouter, endianness: Endianness) -> Self {
        Self {
            receiver,
            router,
            endianness,
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            discarded_bytes: self.receiver.stats().discarded_bytes,
            ..self.stats
        }
    }

    /// Read, decode and route exactly one packet.
    pub fn step(&mut self) -> Result<(), BridgeError> {
        let packet = self.receiver.next_packet()?;
        let event = packet.decode(self.endianness);
        self.stats.packets += 1;
        debug!(
            control = event.control_id,
            name = self.router.control_label(event.control_id),
            value = event.value,
            "Received"
        );
        self.router.apply(event.control_id, event.value)?;
        Ok(())
    }

    /// Run until the byte source fails, the actuator fails or shutdown is
    /// requested. The byte source is closed and pending releases are
    /// cancelled on every exit.
    pub fn run(mut self) -> Result<BridgeStats, BridgeError> {
        info!(
            framing = ?self.receiver.mode(),
            endianness = ?self.endianness,
            controls = self.router.mapping().len(),
            "Bridge running"
        );

        let result = loop {
            match self.step() {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!("Packet dropped: {}", e);
                    self.count(&e);
                }
                Err(e) if e.is_shutdown() => {
                    info!("Shutdown requested, stopping bridge");
                    break Ok(());
                }
                Err(e) => {
                    error!("Bridge stopped: {}", e);
                    break Err(e);
                }
            }
        };

        self.cleanup();
        let stats = self.stats();
        info!(
            packets = stats.packets,
            framing_errors = stats.framing_errors,
            invalid_controls = stats.invalid_controls,
            invalid_values = stats.invalid_values,
            discarded_bytes = stats.discarded_bytes,
            "Bridge finished"
        );
        result.map(|()| stats)
    }

    fn count(&mut self, e: &BridgeError) {
        match e {
            BridgeError::Frame(_) => self.stats.framing_errors += 1,
            BridgeError::Route(RouteError::InvalidControl(_)) => self.stats.invalid_controls += 1,
            BridgeError::Route(RouteError::InvalidValue { .. }) => self.stats.invalid_values += 1,
            BridgeError::Route(RouteError::Actuator(_)) => {}
        }
    }

    fn cleanup(&mut self) {
        self.router.shutdown();
        if let Err(e) = self.receiver.close() {
            warn!("Failed to close byte source: {}", e);
        }
    }

    pub fn framing_mode(&self) -> FramingMode {
        self.receiver.mode()
    }
}
