//! Base64 pass-through sink
//!
//! Every byte written is encoded with the standard alphabet before it reaches
//! the destination. At most two raw bytes are held back waiting for a full
//! 3-byte group; [`Base64Relay::close`] flushes them with padding.

use base64::engine::general_purpose::STANDARD;
use base64::engine::GeneralPurpose;
use base64::write::EncoderWriter;
use std::io::{self, Write};

pub struct Base64Relay<W: Write> {
    encoder: EncoderWriter<'static, GeneralPurpose, FullWrite<W>>,
    bytes_in: u64,
}

/// Hands every encoded chunk to the destination in full.
///
/// `EncoderWriter` answers `Ok(0)` while it still holds output from a short
/// delegate write, which `write_all` callers see as `WriteZero`. Draining each
/// chunk here keeps that state unreachable for sinks that accept a few bytes
/// at a time.
struct FullWrite<W> {
    inner: W,
}

impl<W: Write> Write for FullWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Base64Relay<W> {
    pub fn new(destination: W) -> Self {
        Self {
            encoder: EncoderWriter::new(FullWrite { inner: destination }, &STANDARD),
            bytes_in: 0,
        }
    }

    /// Raw bytes accepted so far
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Encoded length of everything accepted so far, padding included
    pub fn encoded_len(&self) -> u64 {
        self.bytes_in.div_ceil(3) * 4
    }

    /// Flush the final partial group with padding and return the destination.
    pub fn close(mut self) -> io::Result<W> {
        self.encoder.finish().map(|sink| sink.inner)
    }
}

impl<W: Write> Write for Base64Relay<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.bytes_in += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}
