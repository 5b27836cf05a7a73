//! Class Coverage Store
//!
//! [`ClassData`] owns every [`LineData`] of one class, keyed by line number.
//!
//! While the class is being instrumented and executed the lines live in a
//! hash map (sparse). [`ClassData::finalize`] turns that into an array
//! indexed by line number (dense) for cheap repeated lookup while a report
//! is rendered. Any later structural change (the class is instrumented again
//! under another loader, a merge, a retraction) rebuilds the map first.

use super::dictionary::StringDictionary;
use super::io::{CoverageReader, CoverageWriter, MAX_PREALLOCATED};
use super::line::{JumpData, LineCoverage, LineData, SwitchKeys, MAX_LINE_NUMBER};
use crate::counters::CounterArray;
use crate::result::{CoverageError, CoverageResult};
use std::collections::{hash_map, BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};
use std::iter::Flatten;
use std::slice;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum LineTable {
    Sparse(HashMap<u32, LineData>),
    Dense(Vec<Option<LineData>>),
}

impl LineTable {
    fn get(&self, line: u32) -> Option<&LineData> {
        match self {
            Self::Sparse(map) => map.get(&line),
            Self::Dense(array) => array.get(line as usize).and_then(Option::as_ref),
        }
    }

    fn get_mut(&mut self, line: u32) -> Option<&mut LineData> {
        match self {
            Self::Sparse(map) => map.get_mut(&line),
            Self::Dense(array) => array.get_mut(line as usize).and_then(Option::as_mut),
        }
    }

    #[allow(clippy::unreachable)]
    fn sparse(&mut self) -> &mut HashMap<u32, LineData> {
        if let Self::Dense(array) = self {
            let map: HashMap<u32, LineData> = std::mem::take(array)
                .into_iter()
                .flatten()
                .map(|data| (data.line(), data))
                .collect();
            debug!(lines = map.len(), "rebuilt sparse line table");
            *self = Self::Sparse(map);
        }
        match self {
            Self::Sparse(map) => map,
            Self::Dense(_) => unreachable!("line table was rebuilt as sparse"),
        }
    }
}

/// Iterator over the line records of a class, in no particular order
#[derive(Debug)]
pub struct Lines<'a> {
    inner: LinesInner<'a>,
}

#[derive(Debug)]
enum LinesInner<'a> {
    Sparse(hash_map::Values<'a, u32, LineData>),
    Dense(Flatten<slice::Iter<'a, Option<LineData>>>),
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a LineData;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            LinesInner::Sparse(values) => values.next(),
            LinesInner::Dense(values) => values.next(),
        }
    }
}

/// Coverage data of one class
#[derive(Debug, Clone)]
pub struct ClassData {
    name: String,
    lines: LineTable,
    max_line: u32,
    /// Interned method signatures shared by line records
    signatures: HashSet<Arc<str>>,
    /// Memoized method statuses; valid once run-time touches have stopped
    status_cache: HashMap<Arc<str>, LineCoverage>,
    /// Sampling-mode line counters, folded into hit counts by `save`
    line_mask: Option<CounterArray>,
}

impl ClassData {
    /// Create an empty store for `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: LineTable::Sparse(HashMap::new()),
            max_line: 0,
            signatures: HashSet::new(),
            status_cache: HashMap::new(),
            line_mask: None,
        }
    }

    /// Class name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Highest line number ever created in this class
    #[must_use]
    pub fn max_line(&self) -> u32 {
        self.max_line
    }

    /// Check if the store is in its dense (finalized) representation
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self.lines, LineTable::Dense(_))
    }

    fn intern(&mut self, signature: &str) -> Arc<str> {
        if let Some(existing) = self.signatures.get(signature) {
            return Arc::clone(existing);
        }
        let signature: Arc<str> = Arc::from(signature);
        let _ = self.signatures.insert(Arc::clone(&signature));
        signature
    }

    /// Return the record for `line`, creating it for `method_signature` if absent
    ///
    /// An existing record keeps its original signature.
    pub fn get_or_create_line(&mut self, line: u32, method_signature: &str) -> &mut LineData {
        if line > self.max_line {
            self.max_line = line;
        }
        let signature = self.intern(method_signature);
        self.lines
            .sparse()
            .entry(line)
            .or_insert_with(|| LineData::new(line, signature))
    }

    /// Record for `line`
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&LineData> {
        self.lines.get(line)
    }

    /// Check if `line` has a record
    #[must_use]
    pub fn contains_line(&self, line: u32) -> bool {
        self.lines.get(line).is_some()
    }

    /// All line records
    pub fn lines(&self) -> Lines<'_> {
        let inner = match &self.lines {
            LineTable::Sparse(map) => LinesInner::Sparse(map.values()),
            LineTable::Dense(array) => LinesInner::Dense(array.iter().flatten()),
        };
        Lines { inner }
    }

    /// Line numbers with a record, ascending
    #[must_use]
    pub fn line_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.lines().map(LineData::line).collect();
        numbers.sort_unstable();
        numbers
    }

    /// Number of line records
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Distinct method signatures that own at least one line, sorted
    #[must_use]
    pub fn method_signatures(&self) -> Vec<&str> {
        let mut signatures: Vec<&str> = self
            .lines()
            .map(LineData::method_signature)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        signatures.sort_unstable();
        signatures
    }

    /// Delete the record for `line`; no-op if absent
    pub fn remove_line(&mut self, line: u32) -> Option<LineData> {
        if !self.contains_line(line) {
            return None;
        }
        self.lines.sparse().remove(&line)
    }

    /// Drop the most recently declared jump of `line`; no-op if absent
    pub fn remove_last_jump(&mut self, line: u32) -> Option<JumpData> {
        if !self.contains_line(line) {
            return None;
        }
        self.lines
            .sparse()
            .get_mut(&line)
            .and_then(LineData::remove_last_jump)
    }

    /// Declare jump `jump` on `line`; ignored for unknown lines
    pub fn add_line_jump(&mut self, line: u32, jump: u32) {
        if self.contains_line(line) {
            if let Some(data) = self.lines.sparse().get_mut(&line) {
                data.add_jump(jump);
            }
        }
    }

    /// Declare switch `switch` on `line`; ignored for unknown lines
    pub fn add_line_switch(&mut self, line: u32, switch: u32, keys: SwitchKeys) {
        if self.contains_line(line) {
            if let Some(data) = self.lines.sparse().get_mut(&line) {
                data.add_switch(switch, keys);
            }
        }
    }

    /// Record one execution of `line`
    ///
    /// Unknown lines are ignored: this runs inside the instrumented program
    /// and must never fail there.
    #[inline]
    pub fn touch_line(&self, line: u32) {
        if let Some(data) = self.lines.get(line) {
            data.touch();
        }
    }

    /// Record a jump outcome on `line`
    #[inline]
    pub fn touch_jump(&self, line: u32, jump: u32, taken: bool) {
        if let Some(data) = self.lines.get(line) {
            data.touch_jump(jump, taken);
        }
    }

    /// Record a switch dispatch on `line`
    #[inline]
    pub fn touch_switch(&self, line: u32, switch: u32, key: i32) {
        if let Some(data) = self.lines.get(line) {
            data.touch_switch(switch, key);
        }
    }

    /// Allocate sampling-mode line counters for lines `0..=max_line`
    ///
    /// `max_line` is capped at [`MAX_LINE_NUMBER`].
    pub fn init_line_mask(&mut self, max_line: u32) {
        let max_line = max_line.min(MAX_LINE_NUMBER);
        self.line_mask = Some(CounterArray::new(max_line as usize + 1));
    }

    /// Check if sampling-mode counters are allocated
    #[must_use]
    pub fn has_line_mask(&self) -> bool {
        self.line_mask.is_some()
    }

    /// Record one execution of `line` in the sampling-mode counters
    #[inline]
    pub fn touch_line_mask(&self, line: u32) {
        if let Some(mask) = &self.line_mask {
            mask.increment(line as usize);
        }
    }

    /// Fold sampling-mode counters into line hit counts and drop them
    fn fold_line_mask(&mut self) {
        if let Some(mask) = self.line_mask.take() {
            self.add_mask_hits(&mask);
        }
    }

    fn add_mask_hits(&mut self, mask: &CounterArray) {
        for (line, count) in mask.values().into_iter().enumerate() {
            if count == 0 {
                continue;
            }
            if let Some(data) = self.lines.get_mut(line as u32) {
                data.add_hits(count);
            }
        }
    }

    /// Add every line of `other` into this store
    ///
    /// Lines missing here are created with `other`'s signature and structure.
    /// Unfolded sampling-mode counters of `other` are added to the hit counts.
    /// Both stores must describe the same class, and shared lines must have
    /// identical jump and switch structure. Every line is checked before any
    /// counter moves, so a failed merge leaves `self` untouched.
    pub fn merge(&mut self, other: &ClassData) -> CoverageResult<()> {
        if self.name != other.name {
            return Err(CoverageError::ClassMismatch {
                expected: self.name.clone(),
                actual: other.name.clone(),
            });
        }
        for theirs in other.lines() {
            let Some(ours) = self.lines.get(theirs.line()) else {
                continue;
            };
            if ours.method_signature() != theirs.method_signature() {
                return Err(CoverageError::shape_mismatch(
                    theirs.line(),
                    format!(
                        "owned by {} here and by {} in merged data",
                        ours.method_signature(),
                        theirs.method_signature()
                    ),
                ));
            }
            ours.check_same_shape(theirs)?;
        }
        for theirs in other.lines() {
            let line = theirs.line();
            if let Some(ours) = self.lines.sparse().get_mut(&line) {
                ours.merge(theirs)?;
                continue;
            }
            let signature = self.intern(theirs.method_signature());
            let mut created = theirs.clone();
            created.set_signature_handle(signature);
            let _ = self.lines.sparse().insert(line, created);
            if line > self.max_line {
                self.max_line = line;
            }
        }
        if let Some(mask) = &other.line_mask {
            self.add_mask_hits(mask);
        }
        debug!(class = %self.name, lines = other.line_count(), "merged class coverage");
        Ok(())
    }

    /// Switch to the dense representation indexed by line number
    ///
    /// A class holding a line above [`MAX_LINE_NUMBER`] stays sparse.
    pub fn finalize(&mut self) {
        let LineTable::Sparse(map) = &mut self.lines else {
            return;
        };
        if self.max_line > MAX_LINE_NUMBER {
            warn!(
                class = %self.name,
                max_line = self.max_line,
                "line number out of class file range, keeping sparse table"
            );
            return;
        }
        let mut array: Vec<Option<LineData>> = Vec::new();
        array.resize_with(self.max_line as usize + 1, || None);
        for (line, data) in map.drain() {
            if let Some(slot) = array.get_mut(line as usize) {
                *slot = Some(data);
            }
        }
        debug!(class = %self.name, max_line = self.max_line, "finalized class coverage");
        self.lines = LineTable::Dense(array);
    }

    /// Aggregate status of all lines owned by `method_signature`
    ///
    /// `None` if every line is uncovered, `Full` if every line is fully
    /// covered, `Partial` otherwise. The result is memoized for the lifetime
    /// of the store, so only query it after run-time touches have stopped.
    pub fn method_status(&mut self, method_signature: &str) -> LineCoverage {
        if let Some(&status) = self.status_cache.get(method_signature) {
            return status;
        }
        let mut any_covered = false;
        let mut all_full = true;
        let mut seen = false;
        for data in self
            .lines()
            .filter(|data| data.method_signature() == method_signature)
        {
            seen = true;
            match data.status() {
                LineCoverage::None => all_full = false,
                LineCoverage::Partial => {
                    any_covered = true;
                    all_full = false;
                }
                LineCoverage::Full => any_covered = true,
            }
        }
        let status = if !seen || !any_covered {
            LineCoverage::None
        } else if all_full {
            LineCoverage::Full
        } else {
            LineCoverage::Partial
        };
        let key = self.intern(method_signature);
        let _ = self.status_cache.insert(key, status);
        status
    }

    /// Serialize the class, grouped by method signature
    ///
    /// Sampling-mode counters are folded into the hit counts first.
    pub fn save<W: Write>(
        &mut self,
        out: &mut CoverageWriter<W>,
        dictionary: &mut StringDictionary,
    ) -> CoverageResult<()> {
        self.fold_line_mask();
        out.write_int(dictionary.index_of(&self.name))?;

        let mut by_signature: BTreeMap<&str, Vec<&LineData>> = BTreeMap::new();
        for data in self.lines() {
            by_signature
                .entry(data.method_signature())
                .or_default()
                .push(data);
        }
        out.write_len(by_signature.len())?;
        for (signature, mut lines) in by_signature {
            lines.sort_unstable_by_key(|data| data.line());
            out.write_utf(signature)?;
            out.write_len(lines.len())?;
            for data in lines {
                data.save(out)?;
            }
        }
        Ok(())
    }

    /// Read a class written by [`ClassData::save`]
    pub fn load<R: Read>(
        input: &mut CoverageReader<R>,
        dictionary: &StringDictionary,
    ) -> CoverageResult<Self> {
        let index = input.read_int()?;
        let name = dictionary
            .get(index)
            .ok_or(CoverageError::UnknownDictionaryIndex { index })?;
        let mut class = Self::new(name);

        let signature_count = input.read_len()?;
        for _ in 0..signature_count {
            let signature = input.read_utf()?;
            let signature = class.intern(&signature);
            let line_count = input.read_len()?;
            let map = class.lines.sparse();
            map.reserve(line_count.min(MAX_PREALLOCATED));
            for _ in 0..line_count {
                let data = LineData::load(input, Arc::clone(&signature))?;
                let line = data.line();
                if map.insert(line, data).is_some() {
                    return Err(CoverageError::malformed(format!(
                        "line {line} of class {} appears twice",
                        class.name
                    )));
                }
                if line > class.max_line {
                    class.max_line = line;
                }
            }
        }
        Ok(class)
    }
}
