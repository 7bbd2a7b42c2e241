//! Chunked copy with cancellation checks between reads

use crate::cancel::CancelSignal;
use crate::error::Result;
use std::io::{ErrorKind, Read, Write};

/// Default chunk size: large enough for throughput, small enough that a
/// cancellation is noticed after at most one chunk of I/O.
pub const COPY_CHUNK_SIZE: usize = 256 * 1024;

/// Copy `reader` to `writer` in [`COPY_CHUNK_SIZE`] chunks.
pub fn copy_cancellable<C, R, W>(cancel: &C, reader: &mut R, writer: &mut W) -> Result<u64>
where
    C: CancelSignal + ?Sized,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    copy_chunked(cancel, reader, writer, COPY_CHUNK_SIZE)
}

/// Copy `reader` to `writer` using chunks of `chunk_size` bytes.
///
/// The signal is checked before every read. A read chunk is always written in
/// full before the next check, and a failed write stops the copy without
/// reading further. Returns the number of bytes copied. A `chunk_size` of 0
/// uses [`COPY_CHUNK_SIZE`].
pub fn copy_chunked<C, R, W>(
    cancel: &C,
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> Result<u64>
where
    C: CancelSignal + ?Sized,
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let chunk_size = if chunk_size == 0 {
        COPY_CHUNK_SIZE
    } else {
        chunk_size
    };
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;

    loop {
        cancel.check()?;
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}
