//! String dictionary for compact class-name encoding.
//!
//! A report stores each class name once, in the dictionary header, and refers
//! to it by index everywhere else. The dictionary lives for one report-writing
//! (or reading) session and is passed in explicitly.

use super::io::{CoverageReader, CoverageWriter, MAX_PREALLOCATED};
use crate::result::CoverageResult;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Interned strings addressed by dense `u32` indices
#[derive(Debug, Clone, Default)]
pub struct StringDictionary {
    names: Vec<Arc<str>>,
    indices: HashMap<Arc<str>, u32>,
}

impl StringDictionary {
    /// Create an empty dictionary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `name`, interning it on first use
    pub fn index_of(&mut self, name: &str) -> u32 {
        if let Some(&idx) = self.indices.get(name) {
            return idx;
        }
        let idx = self.names.len() as u32;
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        let _ = self.indices.insert(name, idx);
        idx
    }

    /// Index of an already interned name
    #[must_use]
    pub fn index(&self, name: &str) -> Option<u32> {
        self.indices.get(name).copied()
    }

    /// Name stored at `idx`
    #[must_use]
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.names.get(idx as usize).map(|name| &**name)
    }

    /// Number of interned names
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if nothing was interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| &**name)
    }

    /// Write the name count followed by every name in index order
    pub fn save<W: Write>(&self, out: &mut CoverageWriter<W>) -> CoverageResult<()> {
        out.write_len(self.names.len())?;
        for name in &self.names {
            out.write_utf(name)?;
        }
        Ok(())
    }

    /// Read a dictionary written by [`StringDictionary::save`]
    pub fn load<R: Read>(input: &mut CoverageReader<R>) -> CoverageResult<Self> {
        let count = input.read_len()?;
        let mut dictionary = Self {
            names: Vec::with_capacity(count.min(MAX_PREALLOCATED)),
            indices: HashMap::with_capacity(count.min(MAX_PREALLOCATED)),
        };
        for _ in 0..count {
            let name = input.read_utf()?;
            let _ = dictionary.index_of(&name);
        }
        Ok(dictionary)
    }
}
