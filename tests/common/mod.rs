//! Test-only helpers: decode the base64 output and walk the zip it contains.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use zipstream::{OpenedSource, SourceProvider};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// Entry as listed in the central directory, with its inflated contents
#[derive(Debug, Clone)]
pub struct ArchivedEntry {
    pub name: String,
    pub compression_method: u16,
    pub flags: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

pub fn decode_base64(text: &[u8]) -> Vec<u8> {
    STANDARD.decode(text).expect("output is valid base64")
}

/// Parse a complete archive, inflating and CRC-checking every entry.
pub fn read_archive(bytes: &[u8]) -> Vec<ArchivedEntry> {
    let eocd = (0..=bytes.len() - 22)
        .rev()
        .find(|&i| u32_at(bytes, i) == END_OF_CENTRAL_DIRECTORY_SIGNATURE)
        .expect("end of central directory present");
    let count = u16_at(bytes, eocd + 10) as usize;
    let cd_size = u32_at(bytes, eocd + 12) as usize;
    let cd_offset = u32_at(bytes, eocd + 16) as usize;
    assert_eq!(cd_offset + cd_size, eocd, "central directory ends at EOCD");

    let mut entries = Vec::with_capacity(count);
    let mut pos = cd_offset;
    for _ in 0..count {
        assert_eq!(u32_at(bytes, pos), CENTRAL_DIRECTORY_SIGNATURE);
        let name_len = u16_at(bytes, pos + 28) as usize;
        let extra_len = u16_at(bytes, pos + 30) as usize;
        let comment_len = u16_at(bytes, pos + 32) as usize;
        let mut entry = ArchivedEntry {
            flags: u16_at(bytes, pos + 8),
            compression_method: u16_at(bytes, pos + 10),
            dos_time: u16_at(bytes, pos + 12),
            dos_date: u16_at(bytes, pos + 14),
            crc32: u32_at(bytes, pos + 16),
            compressed_size: u32_at(bytes, pos + 20) as u64,
            uncompressed_size: u32_at(bytes, pos + 24) as u64,
            offset: u32_at(bytes, pos + 42) as u64,
            name: String::from_utf8(bytes[pos + 46..pos + 46 + name_len].to_vec()).unwrap(),
            data: Vec::new(),
        };
        entry.data = read_entry_data(bytes, &entry);
        entries.push(entry);
        pos += 46 + name_len + extra_len + comment_len;
    }
    entries
}

fn read_entry_data(bytes: &[u8], entry: &ArchivedEntry) -> Vec<u8> {
    let local = entry.offset as usize;
    assert_eq!(u32_at(bytes, local), LOCAL_FILE_HEADER_SIGNATURE);
    assert_eq!(u16_at(bytes, local + 8), entry.compression_method);
    let name_len = u16_at(bytes, local + 26) as usize;
    let extra_len = u16_at(bytes, local + 28) as usize;
    let start = local + 30 + name_len + extra_len;
    let end = start + entry.compressed_size as usize;
    let compressed = &bytes[start..end];

    let data = match entry.compression_method {
        0 => compressed.to_vec(),
        8 => {
            let mut out = Vec::new();
            DeflateDecoder::new(compressed)
                .read_to_end(&mut out)
                .expect("valid deflate stream");
            out
        }
        other => panic!("unexpected compression method {other}"),
    };

    assert_eq!(u32_at(bytes, end), DATA_DESCRIPTOR_SIGNATURE);
    assert_eq!(u32_at(bytes, end + 4), entry.crc32);
    assert_eq!(data.len() as u64, entry.uncompressed_size);
    assert_eq!(crc32fast::hash(&data), entry.crc32, "crc of {}", entry.name);
    data
}

/// In-memory sources that remember which locators were opened
#[derive(Default)]
pub struct MemorySources {
    files: HashMap<PathBuf, Vec<u8>>,
    modified: Option<SystemTime>,
    pub opened: RefCell<Vec<PathBuf>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, locator: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(locator.into(), data.into());
        self
    }

    pub fn with_modified(mut self, time: SystemTime) -> Self {
        self.modified = Some(time);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opened.borrow().len()
    }
}

impl SourceProvider for MemorySources {
    type Reader = Cursor<Vec<u8>>;

    fn open(&self, locator: &Path) -> io::Result<OpenedSource<Self::Reader>> {
        self.opened.borrow_mut().push(locator.to_path_buf());
        match self.files.get(locator) {
            Some(data) => Ok(OpenedSource {
                reader: Cursor::new(data.clone()),
                modified: self.modified,
                size: Some(data.len() as u64),
            }),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such source")),
        }
    }
}
