//! Report root: every class of one coverage run.
//!
//! ```text
//! magic | version | dictionary | class count | class...
//! ```
//!
//! The dictionary is written before any class so a reader can resolve class
//! name indices as it goes.

use super::class::ClassData;
use super::dictionary::StringDictionary;
use super::io::{CoverageReader, CoverageWriter};
use crate::result::{CoverageError, CoverageResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// First field of every report
pub const REPORT_MAGIC: u32 = 0x4C43_5652;

/// Current report layout version
pub const FORMAT_VERSION: u32 = 1;

/// Coverage of all classes seen in one run, keyed by class name
#[derive(Debug, Clone, Default)]
pub struct ProjectData {
    classes: BTreeMap<String, ClassData>,
}

impl ProjectData {
    /// Create an empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for `name`, created empty on first use
    pub fn get_or_create_class(&mut self, name: &str) -> &mut ClassData {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| ClassData::new(name))
    }

    /// Replace the store of a class, returning the previous one
    ///
    /// Used when a class is loaded again by another class loader.
    pub fn insert_class(&mut self, class: ClassData) -> Option<ClassData> {
        self.classes.insert(class.name().to_string(), class)
    }

    /// Store for `name`
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Mutable store for `name`
    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassData> {
        self.classes.get_mut(name)
    }

    /// All class stores, ordered by name
    pub fn classes(&self) -> impl Iterator<Item = &ClassData> {
        self.classes.values()
    }

    /// Number of classes
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Merge every class of `other` into this report
    pub fn merge(&mut self, other: &ProjectData) -> CoverageResult<()> {
        for theirs in other.classes.values() {
            match self.classes.get_mut(theirs.name()) {
                Some(ours) => ours.merge(theirs)?,
                None => {
                    let _ = self.insert_class(theirs.clone());
                }
            }
        }
        Ok(())
    }

    /// Write the whole report to `writer`
    ///
    /// Folds any sampling-mode line counters into hit counts.
    pub fn save<W: Write>(&mut self, writer: W) -> CoverageResult<()> {
        let mut dictionary = StringDictionary::new();
        for name in self.classes.keys() {
            let _ = dictionary.index_of(name);
        }

        let mut out = CoverageWriter::new(writer);
        out.write_int(REPORT_MAGIC)?;
        out.write_int(FORMAT_VERSION)?;
        dictionary.save(&mut out)?;
        out.write_len(self.classes.len())?;
        for class in self.classes.values_mut() {
            class.save(&mut out, &mut dictionary)?;
        }
        out.flush()?;
        debug!(classes = self.classes.len(), "saved coverage report");
        Ok(())
    }

    /// Read a report written by [`ProjectData::save`]
    pub fn load<R: Read>(reader: R) -> CoverageResult<Self> {
        let mut input = CoverageReader::new(reader);
        let magic = input.read_int()?;
        if magic != REPORT_MAGIC {
            return Err(CoverageError::malformed(format!(
                "bad magic {magic:#x}"
            )));
        }
        let version = input.read_int()?;
        if version != FORMAT_VERSION {
            return Err(CoverageError::malformed(format!(
                "unsupported format version {version}"
            )));
        }
        let dictionary = StringDictionary::load(&mut input)?;
        let count = input.read_len()?;
        let mut project = Self::new();
        for _ in 0..count {
            let class = ClassData::load(&mut input, &dictionary)?;
            if project.insert_class(class).is_some() {
                return Err(CoverageError::malformed("class appears twice"));
            }
        }
        debug!(classes = project.class_count(), "loaded coverage report");
        Ok(project)
    }

    /// Write the report to a file, replacing it
    pub fn save_to_file(&mut self, path: &Path) -> CoverageResult<()> {
        let file = File::create(path)?;
        self.save(BufWriter::new(file))
    }

    /// Read a report from a file
    pub fn load_from_file(path: &Path) -> CoverageResult<Self> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file))
    }
}
