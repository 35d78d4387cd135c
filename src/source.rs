//! Random-access byte sources backing a document.
//!
//! A document holds one `Box<dyn ByteSource>` chosen at construction: a
//! buffered file or an in-memory buffer. All access is synchronous.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access read over the bytes of a PDF file.
pub trait ByteSource: Send {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Read up to `buf.len()` bytes starting at `offset`; returns the count read.
    ///
    /// Reads past the end return fewer bytes (zero at or beyond the end).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// True when the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset`, truncated at the end of the source.
    fn read_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let available = self.len().saturating_sub(offset).min(len as u64) as usize;
        let mut buf = vec![0u8; available];
        let mut filled = 0;
        while filled < available {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

/// Byte source over any seekable reader.
pub struct ReaderSource<R: Read + Seek + Send> {
    reader: R,
    len: u64,
}

/// Buffered file source.
pub type FileSource = ReaderSource<BufReader<File>>;

impl<R: Read + Seek + Send> ReaderSource<R> {
    /// Wrap a seekable reader, measuring its length.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, len })
    }
}

impl FileSource {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        ReaderSource::new(BufReader::new(file))
    }
}

impl<R: Read + Seek + Send> ByteSource for ReaderSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        let max = ((self.len - offset) as usize).min(buf.len());
        let n = self.reader.read(&mut buf[..max])?;
        Ok(n)
    }
}

impl<R: Read + Seek + Send> std::fmt::Debug for ReaderSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSource").field("len", &self.len).finish()
    }
}

/// In-memory byte source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The whole buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = (self.data.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn read_range(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = (offset.min(self.data.len() as u64)) as usize;
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }
}
