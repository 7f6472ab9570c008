//! Random-access byte sources and the little-endian/length-prefixed
//! primitives the rest of the crate reads through them.
//!
//! Every primitive here takes a 1-based byte position, matching the
//! vendor's own documentation convention for this file format: each
//! method subtracts one internally before reading.

use std::fs::File;
use std::io;

use byteorder::{ByteOrder, LittleEndian};
use memmap::Mmap;

use crate::error::Error;

/// A positional, read-only view of a BIN file's bytes.
///
/// Only `read_at` is required: implementations perform no seeking and hold
/// no shared cursor, so a `Database` built over any `ByteSource` is safe
/// to query from multiple threads concurrently.
pub trait ByteSource {
    /// Reads `buf.len()` bytes starting at the 0-based byte `offset`.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error>;

    /// Reads one little-endian `u8` at 1-based position `pos1`.
    fn read_u8(&self, pos1: usize) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_at(pos1 - 1, &mut buf)?;
        Ok(buf[0])
    }

    /// Reads one little-endian `u32` at 1-based position `pos1`.
    fn read_u32(&self, pos1: usize) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_at(pos1 - 1, &mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Reads a little-endian `f32` at 1-based position `pos1`.
    fn read_f32(&self, pos1: usize) -> Result<f32, Error> {
        let mut buf = [0u8; 4];
        self.read_at(pos1 - 1, &mut buf)?;
        Ok(LittleEndian::read_f32(&buf))
    }

    /// Reads a little-endian `u128` (assembled from four little-endian
    /// `u32` words, matching the row layout of an IPv6 `ipFrom` column) at
    /// 1-based position `pos1`.
    fn read_u128(&self, pos1: usize) -> Result<u128, Error> {
        let mut buf = [0u8; 16];
        self.read_at(pos1 - 1, &mut buf)?;
        Ok(LittleEndian::read_u128(&buf))
    }

    /// Reads a length-prefixed string at 0-based position `pos0`: one
    /// length byte `L` followed by `L` content bytes.
    fn read_string(&self, pos0: usize) -> Result<String, Error> {
        let mut len_buf = [0u8; 1];
        self.read_at(pos0, &mut len_buf)?;
        let len = len_buf[0] as usize;
        let mut data = vec![0u8; len];
        self.read_at(pos0 + 1, &mut data)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Bulk-reads `n` bytes starting at 1-based position `pos1`, used for
    /// row fetches that need both the row body and the following row's
    /// `ipFrom` (serving as this row's `ipTo`) in one call.
    fn read_row(&self, pos1: usize, n: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; n];
        self.read_at(pos1 - 1, &mut buf)?;
        Ok(buf)
    }
}

/// Decodes a little-endian `u32` from an already-fetched buffer at byte
/// offset `off`.
pub fn read_u32_from_buf(buf: &[u8], off: usize) -> u32 {
    LittleEndian::read_u32(&buf[off..off + 4])
}

/// Decodes a little-endian `u128` from an already-fetched buffer at byte
/// offset `off`.
pub fn read_u128_from_buf(buf: &[u8], off: usize) -> u128 {
    LittleEndian::read_u128(&buf[off..off + 16])
}

/// Decodes a little-endian `f32` from an already-fetched buffer at byte
/// offset `off`.
pub fn read_f32_from_buf(buf: &[u8], off: usize) -> f32 {
    LittleEndian::read_f32(&buf[off..off + 4])
}

/// A memory-mapped BIN file. The default source for [`crate::Database::open`].
pub struct MmapSource {
    map: Mmap,
    // Kept alive for the lifetime of the mapping; never read directly.
    #[allow(dead_code)]
    file: File,
}

impl MmapSource {
    pub fn open(file: File) -> io::Result<MmapSource> {
        let map = unsafe { Mmap::map(&file)? };
        Ok(MmapSource { map, file })
    }
}

impl ByteSource for MmapSource {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "offset overflow")))?;
        let slice = self.map.get(offset..end).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read past end of file: {}..{} (len {})", offset, end, self.map.len()),
            ))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

/// An in-memory BIN "file", used by [`crate::Database::open_bytes`] and by
/// every test in this crate.
pub struct SliceSource {
    bytes: Vec<u8>,
}

impl SliceSource {
    pub fn new(bytes: Vec<u8>) -> SliceSource {
        SliceSource { bytes }
    }
}

impl ByteSource for SliceSource {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "offset overflow")))?;
        let slice = self.bytes.get(offset..end).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read past end of buffer: {}..{} (len {})", offset, end, self.bytes.len()),
            ))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}
