//! Streaming ZIP writer that compresses data on-the-fly into any `Write`
//!
//! The sink does not need to be seekable: every entry is written with the
//! data-descriptor flag set, so CRC and sizes follow the data instead of being
//! patched into the local header. Offsets are tracked by counting bytes.
//!
//! Memory stays bounded: compressed output is buffered per entry only until
//! it reaches [`FLUSH_THRESHOLD`], then handed to the sink.

use crate::error::{Error, Result};
use crate::policy::CompressionMethod;
use chrono::{DateTime, Datelike, Timelike, Utc};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: u32 = 0x07064b50;

const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_UTF8: u16 = 1 << 11;

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;

const EXTRA_ZIP64: u16 = 0x0001;
const EXTRA_EXTENDED_TIMESTAMP: u16 = 0x5455;

/// Sizes and offsets at or above this need ZIP64 fields
const ZIP64_LIMIT: u64 = u32::MAX as u64;

/// Compressed bytes held per entry before they are pushed to the sink
pub const FLUSH_THRESHOLD: usize = 256 * 1024;

/// Entry already written, kept for the central directory
struct ZipEntry {
    name: String,
    local_header_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    compression_method: u16,
    flags: u16,
    timestamp: EntryTimestamp,
    /// Data descriptor used 8-byte sizes
    zip64: bool,
}

/// Streaming ZIP writer over an arbitrary sink
pub struct StreamingZipWriter<W: Write> {
    output: CountingWriter<W>,
    entries: Vec<ZipEntry>,
    current_entry: Option<CurrentEntry>,
    compression_level: u32,
    finished: bool,
}

struct CurrentEntry {
    name: String,
    local_header_offset: u64,
    encoder: Box<dyn CompressorWrite>,
    counter: CrcCounter,
    compression_method: u16,
    flags: u16,
    timestamp: EntryTimestamp,
    /// Local header announced ZIP64 sizes
    zip64: bool,
}

trait CompressorWrite: Write {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer>;
    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer;
}

struct DeflateCompressor {
    encoder: DeflateEncoder<CompressedBuffer>,
}

impl Write for DeflateCompressor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.encoder.flush()
    }
}

impl CompressorWrite for DeflateCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.encoder.finish()?)
    }

    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer {
        self.encoder.get_mut()
    }
}

/// Pass-through for stored entries
struct StoredCompressor {
    buffer: CompressedBuffer,
}

impl Write for StoredCompressor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CompressorWrite for StoredCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.buffer)
    }

    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer {
        &mut self.buffer
    }
}

/// Metadata tracker for CRC and byte counts
struct CrcCounter {
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

impl CrcCounter {
    fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        }
    }

    fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    fn add_compressed(&mut self, count: u64) {
        self.compressed_count += count;
    }

    fn finalize(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

/// Compressed output waiting to be flushed to the sink
struct CompressedBuffer {
    buffer: Vec<u8>,
}

impl CompressedBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(32 * 1024),
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn should_flush(&self) -> bool {
        self.buffer.len() >= FLUSH_THRESHOLD
    }
}

impl Write for CompressedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Sink wrapper that knows how many bytes went through it
struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Modification time in both encodings a zip reader may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTimestamp {
    pub dos_time: u16,
    pub dos_date: u16,
    /// Seconds since the Unix epoch, clamped to the 32-bit field
    pub unix_mtime: u32,
}

impl EntryTimestamp {
    /// Convert using UTC. MS-DOS dates cover 1980-2107; times outside are clamped.
    pub fn from_system_time(time: SystemTime) -> Self {
        const DOS_MIN: (u16, u16) = (0, (1 << 5) | 1);
        const DOS_MAX: (u16, u16) = ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);

        let secs = unix_seconds(time);
        let (dos_time, dos_date) = match DateTime::<Utc>::from_timestamp(secs, 0) {
            None if secs < 0 => DOS_MIN,
            None => DOS_MAX,
            Some(utc) => match utc.year() {
                y if y < 1980 => DOS_MIN,
                y if y > 2107 => DOS_MAX,
                y => (
                    ((utc.hour() << 11) | (utc.minute() << 5) | (utc.second() / 2)) as u16,
                    (((y - 1980) as u32) << 9 | (utc.month() << 5) | utc.day()) as u16,
                ),
            },
        };
        let unix_mtime = secs.clamp(0, u32::MAX as i64) as u32;
        Self {
            dos_time,
            dos_date,
            unix_mtime,
        }
    }
}

/// Whole seconds relative to the Unix epoch, saturating at the `i64` range
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_secs())
            .map(|s| -s)
            .unwrap_or(i64::MIN),
    }
}

impl<W: Write> StreamingZipWriter<W> {
    /// Create a writer with the default deflate level (6)
    pub fn new(writer: W) -> Self {
        Self::with_compression(writer, 6)
    }

    /// Create a writer with a deflate level (0-9) used for deflated entries
    pub fn with_compression(writer: W, compression_level: u32) -> Self {
        Self {
            output: CountingWriter {
                inner: writer,
                position: 0,
            },
            entries: Vec::new(),
            current_entry: None,
            compression_level: compression_level.min(9),
            finished: false,
        }
    }

    /// Number of bytes written to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.output.position
    }

    /// Number of entries started so far, including the open one
    pub fn entry_count(&self) -> usize {
        self.entries.len() + usize::from(self.current_entry.is_some())
    }

    /// Start a new entry, finishing the previous one.
    pub fn start_entry(
        &mut self,
        name: &str,
        method: CompressionMethod,
        modified: SystemTime,
    ) -> Result<()> {
        self.start_entry_with_hint(name, method, modified, None)
    }

    /// Start a new entry with an expected uncompressed size.
    ///
    /// A hint at or above 4 GiB - 1 marks the entry as ZIP64 up front: the
    /// local header carries a ZIP64 extra field, so readers that walk local
    /// headers know the data descriptor holds 8-byte sizes.
    ///
    /// # Arguments
    /// * `name` - The name/path of the entry in the ZIP
    /// * `method` - How the entry's bytes are encoded
    /// * `modified` - Modification time recorded in the headers
    /// * `size_hint` - Expected uncompressed size, if known
    pub fn start_entry_with_hint(
        &mut self,
        name: &str,
        method: CompressionMethod,
        modified: SystemTime,
        size_hint: Option<u64>,
    ) -> Result<()> {
        if self.finished {
            return Err(Error::Archive("archive already finished".to_string()));
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::Archive(format!(
                "entry name too long: {} bytes",
                name.len()
            )));
        }
        self.finish_current_entry()?;

        let local_header_offset = self.output.position;
        let compression_method = method.to_zip_method();
        let timestamp = EntryTimestamp::from_system_time(modified);
        let mut flags = FLAG_DATA_DESCRIPTOR;
        if !name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        let zip64 = size_hint.is_some_and(|size| size >= ZIP64_LIMIT);

        let mut extra: Vec<u8> = Vec::with_capacity(29);
        if zip64 {
            // sizes are unknown until the data descriptor
            extra.extend_from_slice(&EXTRA_ZIP64.to_le_bytes());
            extra.extend_from_slice(&16u16.to_le_bytes());
            extra.extend_from_slice(&[0u8; 16]);
        }
        extra.extend_from_slice(&timestamp_extra(&timestamp));
        let version = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };

        let out = &mut self.output;
        out.write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes())?;
        out.write_all(&version.to_le_bytes())?; // version needed
        out.write_all(&flags.to_le_bytes())?;
        out.write_all(&compression_method.to_le_bytes())?;
        out.write_all(&timestamp.dos_time.to_le_bytes())?;
        out.write_all(&timestamp.dos_date.to_le_bytes())?;
        // ZIP64 entries point readers at the extra field for their sizes
        let size_placeholder = if zip64 { u32::MAX } else { 0 };
        out.write_all(&0u32.to_le_bytes())?; // crc32 placeholder
        out.write_all(&size_placeholder.to_le_bytes())?; // compressed size
        out.write_all(&size_placeholder.to_le_bytes())?; // uncompressed size
        out.write_all(&(name.len() as u16).to_le_bytes())?;
        out.write_all(&(extra.len() as u16).to_le_bytes())?;
        out.write_all(name.as_bytes())?;
        out.write_all(&extra)?;

        let encoder: Box<dyn CompressorWrite> = match method {
            CompressionMethod::Deflate => Box::new(DeflateCompressor {
                encoder: DeflateEncoder::new(
                    CompressedBuffer::new(),
                    Compression::new(self.compression_level),
                ),
            }),
            CompressionMethod::Stored => Box::new(StoredCompressor {
                buffer: CompressedBuffer::new(),
            }),
        };

        self.current_entry = Some(CurrentEntry {
            name: name.to_string(),
            local_header_offset,
            encoder,
            counter: CrcCounter::new(),
            compression_method,
            flags,
            timestamp,
            zip64,
        });

        Ok(())
    }

    /// Write uncompressed data to the current entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| Error::Archive("no entry started".to_string()))?;

        entry.counter.update_uncompressed(data);
        entry.encoder.write_all(data)?;

        let buffer = entry.encoder.get_buffer_mut();
        if buffer.should_flush() {
            let compressed_data = buffer.take();
            self.output.write_all(&compressed_data)?;
            entry.counter.add_compressed(compressed_data.len() as u64);
        }

        Ok(())
    }

    /// Finish current entry and write data descriptor
    fn finish_current_entry(&mut self) -> Result<()> {
        if let Some(mut entry) = self.current_entry.take() {
            let mut buffer = entry.encoder.finish_compression()?;

            let remaining_data = buffer.take();
            if !remaining_data.is_empty() {
                self.output.write_all(&remaining_data)?;
                entry.counter.add_compressed(remaining_data.len() as u64);
            }

            let crc = entry.counter.finalize();
            let compressed_size = entry.counter.compressed_count;
            let uncompressed_size = entry.counter.uncompressed_count;

            self.output
                .write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
            self.output.write_all(&crc.to_le_bytes())?;
            // ZIP64 data descriptor carries 64-bit sizes
            let zip64 = entry.zip64
                || compressed_size >= ZIP64_LIMIT
                || uncompressed_size >= ZIP64_LIMIT;
            if zip64 {
                self.output.write_all(&compressed_size.to_le_bytes())?;
                self.output.write_all(&uncompressed_size.to_le_bytes())?;
            } else {
                self.output
                    .write_all(&(compressed_size as u32).to_le_bytes())?;
                self.output
                    .write_all(&(uncompressed_size as u32).to_le_bytes())?;
            }

            self.entries.push(ZipEntry {
                name: entry.name,
                local_header_offset: entry.local_header_offset,
                crc32: crc,
                compressed_size,
                uncompressed_size,
                compression_method: entry.compression_method,
                flags: entry.flags,
                timestamp: entry.timestamp,
                zip64,
            });
        }
        Ok(())
    }

    /// Write the central directory and end records.
    ///
    /// Safe to call after a failed write; a second call is a no-op. The sink
    /// stays inside the writer, use [`into_inner`](Self::into_inner) to get it
    /// back.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.finish_current_entry()?;

        let central_dir_offset = self.output.position;

        for entry in &self.entries {
            write_central_header(&mut self.output, entry)?;
        }

        let central_dir_size = self.output.position - central_dir_offset;

        let need_zip64 = self.entries.len() >= u16::MAX as usize
            || central_dir_size >= ZIP64_LIMIT
            || central_dir_offset >= ZIP64_LIMIT;

        let out = &mut self.output;
        if need_zip64 {
            let zip64_eocd_pos = out.position;
            out.write_all(&ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
            // size of the remaining record
            out.write_all(&44u64.to_le_bytes())?;
            out.write_all(&VERSION_ZIP64.to_le_bytes())?; // version made by
            out.write_all(&VERSION_ZIP64.to_le_bytes())?; // version needed
            out.write_all(&0u32.to_le_bytes())?; // this disk
            out.write_all(&0u32.to_le_bytes())?; // disk with central dir
            out.write_all(&(self.entries.len() as u64).to_le_bytes())?;
            out.write_all(&(self.entries.len() as u64).to_le_bytes())?;
            out.write_all(&central_dir_size.to_le_bytes())?;
            out.write_all(&central_dir_offset.to_le_bytes())?;

            out.write_all(&ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE.to_le_bytes())?;
            out.write_all(&0u32.to_le_bytes())?; // disk with zip64 eocd
            out.write_all(&zip64_eocd_pos.to_le_bytes())?;
            out.write_all(&1u32.to_le_bytes())?; // total disks
        }

        out.write_all(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?; // disk number
        out.write_all(&0u16.to_le_bytes())?; // disk with central dir

        let count = clamp_u16(self.entries.len() as u64);
        out.write_all(&count.to_le_bytes())?;
        out.write_all(&count.to_le_bytes())?;
        out.write_all(&clamp_u32(central_dir_size).to_le_bytes())?;
        out.write_all(&clamp_u32(central_dir_offset).to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?; // comment len

        out.flush()?;
        Ok(())
    }

    /// Give back the sink. Call [`finish`](Self::finish) first, or the archive
    /// has no central directory.
    pub fn into_inner(self) -> W {
        self.output.inner
    }
}

/// Writes into the open entry, so the writer can be a `std::io::copy` target.
impl<W: Write> Write for StreamingZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_data(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.output.flush()
    }
}

fn into_io(err: Error) -> std::io::Error {
    match err {
        Error::Io { source, .. } => source,
        other => std::io::Error::new(std::io::ErrorKind::Other, other),
    }
}

fn write_central_header<W: Write>(out: &mut W, entry: &ZipEntry) -> Result<()> {
    // Same decision as the data descriptor, so both agree on the layout.
    let needs_size64 = entry.zip64;
    let needs_offset64 = entry.local_header_offset >= ZIP64_LIMIT;

    let mut extra: Vec<u8> = Vec::new();
    if needs_size64 || needs_offset64 {
        // Sizes come as a pair once either overflows; readers expect
        // uncompressed, compressed, offset in that order.
        let mut data: Vec<u8> = Vec::with_capacity(24);
        if needs_size64 {
            data.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            data.extend_from_slice(&entry.compressed_size.to_le_bytes());
        }
        if needs_offset64 {
            data.extend_from_slice(&entry.local_header_offset.to_le_bytes());
        }
        extra.extend_from_slice(&EXTRA_ZIP64.to_le_bytes());
        extra.extend_from_slice(&(data.len() as u16).to_le_bytes());
        extra.extend_from_slice(&data);
    }
    extra.extend_from_slice(&timestamp_extra(&entry.timestamp));

    let version = if needs_size64 || needs_offset64 {
        VERSION_ZIP64
    } else {
        VERSION_DEFAULT
    };
    let (compressed, uncompressed) = if needs_size64 {
        (u32::MAX, u32::MAX)
    } else {
        (entry.compressed_size as u32, entry.uncompressed_size as u32)
    };

    out.write_all(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())?;
    out.write_all(&version.to_le_bytes())?; // version made by
    out.write_all(&version.to_le_bytes())?; // version needed
    out.write_all(&entry.flags.to_le_bytes())?;
    out.write_all(&entry.compression_method.to_le_bytes())?;
    out.write_all(&entry.timestamp.dos_time.to_le_bytes())?;
    out.write_all(&entry.timestamp.dos_date.to_le_bytes())?;
    out.write_all(&entry.crc32.to_le_bytes())?;
    out.write_all(&compressed.to_le_bytes())?;
    out.write_all(&uncompressed.to_le_bytes())?;
    out.write_all(&(entry.name.len() as u16).to_le_bytes())?;
    out.write_all(&(extra.len() as u16).to_le_bytes())?;
    out.write_all(&0u16.to_le_bytes())?; // file comment len
    out.write_all(&0u16.to_le_bytes())?; // disk number start
    out.write_all(&0u16.to_le_bytes())?; // internal attrs
    out.write_all(&0u32.to_le_bytes())?; // external attrs
    out.write_all(&clamp_u32(entry.local_header_offset).to_le_bytes())?;
    out.write_all(entry.name.as_bytes())?;
    out.write_all(&extra)?;
    Ok(())
}

/// Extended timestamp extra field holding only the modification time
fn timestamp_extra(timestamp: &EntryTimestamp) -> [u8; 9] {
    let mut field = [0u8; 9];
    field[0..2].copy_from_slice(&EXTRA_EXTENDED_TIMESTAMP.to_le_bytes());
    field[2..4].copy_from_slice(&5u16.to_le_bytes());
    field[4] = 1; // mtime present
    field[5..9].copy_from_slice(&timestamp.unix_mtime.to_le_bytes());
    field
}

fn clamp_u16(value: u64) -> u16 {
    if value >= u16::MAX as u64 {
        u16::MAX
    } else {
        value as u16
    }
}

fn clamp_u32(value: u64) -> u32 {
    if value >= ZIP64_LIMIT {
        u32::MAX
    } else {
        value as u32
    }
}
