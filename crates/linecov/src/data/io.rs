//! Binary primitives for coverage reports.
//!
//! Every field is encoded on its own with bincode's default options:
//! unsigned integers as varints, signed integers zigzag-varint, strings as a
//! varint length followed by UTF-8 bytes. Record layout is decided by the
//! callers (`LineData::save`, `ClassData::save`, `ProjectData::save`).

use crate::result::CoverageResult;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Upper bound for a single encoded field (guards against corrupt lengths)
const MAX_FIELD_BYTES: u64 = 16 * 1024 * 1024;

/// Largest up-front allocation made from a count read off the wire
pub(crate) const MAX_PREALLOCATED: usize = 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_FIELD_BYTES)
}

/// Field-by-field writer for the binary report format
#[derive(Debug)]
pub struct CoverageWriter<W: Write> {
    inner: W,
}

impl<W: Write> CoverageWriter<W> {
    /// Wrap an output sink
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CoverageResult<()> {
        options().serialize_into(&mut self.inner, value)?;
        Ok(())
    }

    /// Write an unsigned integer (counts, line numbers, hit counters)
    pub fn write_int(&mut self, value: u32) -> CoverageResult<()> {
        self.write_value(&value)
    }

    /// Write a signed integer (switch keys)
    pub fn write_signed(&mut self, value: i32) -> CoverageResult<()> {
        self.write_value(&value)
    }

    /// Write a single tag byte
    pub fn write_byte(&mut self, value: u8) -> CoverageResult<()> {
        self.write_value(&value)
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_utf(&mut self, value: &str) -> CoverageResult<()> {
        self.write_value(value)
    }

    /// Write a collection length
    pub fn write_len(&mut self, len: usize) -> CoverageResult<()> {
        self.write_int(len as u32)
    }

    /// Flush the underlying sink
    pub fn flush(&mut self) -> CoverageResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Unwrap the underlying sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Field-by-field reader for the binary report format
#[derive(Debug)]
pub struct CoverageReader<R: Read> {
    inner: R,
}

impl<R: Read> CoverageReader<R> {
    /// Wrap an input source
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_value<T: DeserializeOwned>(&mut self) -> CoverageResult<T> {
        Ok(options().deserialize_from(&mut self.inner)?)
    }

    /// Read an unsigned integer
    pub fn read_int(&mut self) -> CoverageResult<u32> {
        self.read_value()
    }

    /// Read a signed integer
    pub fn read_signed(&mut self) -> CoverageResult<i32> {
        self.read_value()
    }

    /// Read a single tag byte
    pub fn read_byte(&mut self) -> CoverageResult<u8> {
        self.read_value()
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_utf(&mut self) -> CoverageResult<String> {
        self.read_value()
    }

    /// Read a collection length
    pub fn read_len(&mut self) -> CoverageResult<usize> {
        Ok(self.read_int()? as usize)
    }

    /// Unwrap the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }
}
