//! Packet framing over an unstructured byte stream.
//!
//! The link has no length prefix, only a trailing `0xFF`. A receiver that
//! starts mid-packet (or loses a byte) has to find its way back to a packet
//! boundary; both disciplines below discard at most one 4-byte window per
//! malformed sequence, so a single bad byte never stalls the stream.

use crate::protocol::{PACKET_LEN, Packet, TERMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io;
use thiserror::Error;
use tracing::{debug, trace};

/// Blocking source of raw bytes (a serial port in production).
pub trait ByteSource: Send {
    /// Block until at least one byte is available and copy up to
    /// `buf.len()` bytes into `buf`. Returning `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the underlying transport.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Read exactly four bytes and require the last one to be the terminator.
    FixedWindow,
    /// Accumulate bytes and cut a packet whenever a terminator closes a
    /// 4-byte buffer.
    ///
    /// A `0xFF` value byte is taken for a terminator, so every packet whose
    /// value has one is dropped: all negative values in big-endian (high
    /// byte `0xFF`) and values such as 255 (low byte `0xFF`). With a
    /// `-255..=255` stick that is the whole negative half of its travel.
    /// Fixed-window framing does not have this limitation while the stream
    /// stays aligned.
    #[default]
    Resync,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("framing error: invalid packet end {0:#04X}")]
    MissingTerminator(u8),

    #[error("framing error: packet length exceeded")]
    LengthExceeded,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl FrameError {
    /// Framing errors resync and continue; transport failures end the stream.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Transport(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub packets: u64,
    pub framing_errors: u64,
    pub discarded_bytes: u64,
}

pub struct FrameReceiver<S> {
    source: S,
    mode: FramingMode,
    /// Bytes read from the source but not consumed yet.
    pending: VecDeque<u8>,
    /// Resync accumulator.
    window: Vec<u8>,
    /// Fixed-window mode lost alignment; skip to the next terminator first.
    resync_pending: bool,
    chunk: Vec<u8>,
    stats: FrameStats,
}

impl<S: ByteSource> FrameReceiver<S> {
    /// `read_chunk` bounds how many bytes a single source read may return.
    pub fn new(source: S, mode: FramingMode, read_chunk: usize) -> Self {
        Self {
            source,
            mode,
            pending: VecDeque::new(),
            window: Vec::with_capacity(PACKET_LEN + 1),
            resync_pending: false,
            chunk: vec![0u8; read_chunk.max(1)],
            stats: FrameStats::default(),
        }
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Block until the next well-formed packet arrives.
    pub fn next_packet(&mut self) -> Result<Packet, FrameError> {
        let result = match self.mode {
            FramingMode::FixedWindow => self.next_fixed(),
            FramingMode::Resync => self.next_accumulated(),
        };
        match &result {
            Ok(packet) => {
                self.stats.packets += 1;
                trace!(raw = ?packet.payload(), "Packet framed");
            }
            Err(e) if e.is_recoverable() => self.stats.framing_errors += 1,
            Err(_) => {}
        }
        result
    }

    /// Close the byte source. Buffered bytes are dropped.
    pub fn close(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.window.clear();
        self.source.close()
    }

    fn next_fixed(&mut self) -> Result<Packet, FrameError> {
        if self.resync_pending {
            self.skip_to_terminator()?;
            self.resync_pending = false;
        }

        let mut window = [0u8; PACKET_LEN];
        for slot in window.iter_mut() {
            *slot = self.next_byte(PACKET_LEN)?;
        }

        if let Some(packet) = Packet::from_window(window) {
            return Ok(packet);
        }

        // A terminator inside the window marks where the next packet starts
        match window[..PACKET_LEN - 1].iter().rposition(|&b| b == TERMINATOR) {
            Some(end) => {
                self.stats.discarded_bytes += (end + 1) as u64;
                for &b in window[end + 1..].iter().rev() {
                    self.pending.push_front(b);
                }
            }
            None => {
                self.stats.discarded_bytes += PACKET_LEN as u64;
                self.resync_pending = true;
            }
        }
        Err(FrameError::MissingTerminator(window[PACKET_LEN - 1]))
    }

    fn skip_to_terminator(&mut self) -> Result<(), FrameError> {
        let mut skipped = 0u64;
        loop {
            let b = self.next_byte(1)?;
            if b == TERMINATOR {
                break;
            }
            skipped += 1;
        }
        self.stats.discarded_bytes += skipped + 1;
        debug!(skipped, "Resynchronized on terminator");
        Ok(())
    }

    fn next_accumulated(&mut self) -> Result<Packet, FrameError> {
        loop {
            let b = self.next_byte(self.chunk.len())?;
            self.window.push(b);

            if b == TERMINATOR {
                if self.window.len() == PACKET_LEN {
                    let mut window = [0u8; PACKET_LEN];
                    window.copy_from_slice(&self.window);
                    self.window.clear();
                    if let Some(packet) = Packet::from_window(window) {
                        return Ok(packet);
                    }
                }
                debug!(
                    len = self.window.len(),
                    "Misaligned terminator, discarding buffer"
                );
                self.stats.discarded_bytes += self.window.len() as u64;
                self.window.clear();
                continue;
            }

            if self.window.len() > PACKET_LEN {
                self.stats.discarded_bytes += self.window.len() as u64;
                self.window.clear();
                return Err(FrameError::LengthExceeded);
            }
        }
    }

    /// Next byte of the stream, reading at most `want` bytes from the source
    /// when the pending buffer is empty.
    fn next_byte(&mut self, want: usize) -> Result<u8, FrameError> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(b);
        }

        let want = want.clamp(1, self.chunk.len());
        let n = self.source.read(&mut self.chunk[..want])?;
        if n == 0 {
            return Err(FrameError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "byte source closed",
            )));
        }
        self.pending.extend(&self.chunk[..n]);
        // Just filled with at least one byte
        self.pending
            .pop_front()
            .ok_or_else(|| FrameError::Transport(io::ErrorKind::UnexpectedEof.into()))
    }
}
