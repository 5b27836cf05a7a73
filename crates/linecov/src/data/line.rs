//! Line Records
//!
//! One [`LineData`] per instrumented source line: a hit counter, plus the
//! jumps (conditional branches) and switches whose outcomes were recorded on
//! that line. The *set* of jumps and switches is fixed during instrumentation;
//! afterwards only their counters move, and only upwards.

use super::io::{CoverageReader, CoverageWriter, MAX_PREALLOCATED};
use crate::counters::{CounterArray, HitCounter};
use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Highest line number a class file can carry (`LineNumberTable` entries are `u2`)
pub const MAX_LINE_NUMBER: u32 = u16::MAX as u32;

/// Coverage classification of a line or a method
///
/// Ordered so that `None < Partial < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineCoverage {
    /// Never executed
    None,
    /// Executed, but some branch outcome or switch arm was never taken
    Partial,
    /// Executed with every branch outcome and switch arm taken
    Full,
}

/// Covered and total branch outcomes on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchCounts {
    /// Outcomes taken at least once
    pub covered: usize,
    /// All outcomes
    pub total: usize,
}

/// Taken/not-taken counters of one conditional jump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpData {
    id: u32,
    true_hits: HitCounter,
    false_hits: HitCounter,
}

impl JumpData {
    /// Create an untouched jump record
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            true_hits: HitCounter::default(),
            false_hits: HitCounter::default(),
        }
    }

    /// Per-line jump index
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Times the jump was taken
    #[must_use]
    pub fn true_hits(&self) -> u32 {
        self.true_hits.get()
    }

    /// Times the jump fell through
    #[must_use]
    pub fn false_hits(&self) -> u32 {
        self.false_hits.get()
    }

    /// Record one outcome (hot path)
    #[inline]
    pub fn touch(&self, taken: bool) {
        if taken {
            self.true_hits.increment();
        } else {
            self.false_hits.increment();
        }
    }

    /// Check if both outcomes were observed
    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.true_hits.is_hit() && self.false_hits.is_hit()
    }

    fn merge(&mut self, other: &JumpData) {
        self.true_hits.add(other.true_hits());
        self.false_hits.add(other.false_hits());
    }
}

/// Case keys of a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchKeys {
    /// `lookupswitch`: an explicit set of case values
    Explicit(Vec<i32>),
    /// `tableswitch`: every value in `min..=max`
    Range {
        /// Lowest case value
        min: i32,
        /// Highest case value
        max: i32,
    },
}

impl SwitchKeys {
    /// Number of non-default arms
    #[must_use]
    pub fn arm_count(&self) -> usize {
        match self {
            Self::Explicit(keys) => keys.len(),
            Self::Range { min, max } => {
                if max < min {
                    0
                } else {
                    (i64::from(*max) - i64::from(*min) + 1) as usize
                }
            }
        }
    }

    /// Arm index for a run-time key, `None` for the default arm
    #[inline]
    #[must_use]
    pub fn arm_index(&self, key: i32) -> Option<usize> {
        match self {
            Self::Explicit(keys) => keys.iter().position(|&k| k == key),
            Self::Range { min, max } => {
                (*min..=*max).contains(&key).then(|| (i64::from(key) - i64::from(*min)) as usize)
            }
        }
    }
}

/// Per-arm counters of one switch, plus the default arm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchData {
    id: u32,
    keys: SwitchKeys,
    default_hits: HitCounter,
    hits: CounterArray,
}

impl SwitchData {
    /// Create an untouched switch record sized for `keys`
    #[must_use]
    pub fn new(id: u32, keys: SwitchKeys) -> Self {
        let hits = CounterArray::new(keys.arm_count());
        Self {
            id,
            keys,
            default_hits: HitCounter::default(),
            hits,
        }
    }

    /// Per-line switch index
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Case keys
    #[must_use]
    pub fn keys(&self) -> &SwitchKeys {
        &self.keys
    }

    /// Times no case matched
    #[must_use]
    pub fn default_hits(&self) -> u32 {
        self.default_hits.get()
    }

    /// Hits per non-default arm, in key order
    #[must_use]
    pub fn arm_hits(&self) -> Vec<u32> {
        self.hits.values()
    }

    /// Record one dispatch on `key` (hot path)
    #[inline]
    pub fn touch(&self, key: i32) {
        match self.keys.arm_index(key) {
            Some(idx) => self.hits.increment(idx),
            None => self.default_hits.increment(),
        }
    }

    /// Check if every arm, default included, was taken
    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.default_hits.is_hit() && self.hits.all_hit()
    }

    fn any_hit(&self) -> bool {
        self.default_hits.is_hit() || self.hits.any_hit()
    }

    fn merge(&mut self, other: &SwitchData) {
        self.default_hits.add(other.default_hits());
        self.hits.add_all(&other.hits);
    }

    fn save<W: Write>(&self, out: &mut CoverageWriter<W>) -> CoverageResult<()> {
        match &self.keys {
            SwitchKeys::Explicit(keys) => {
                out.write_byte(0)?;
                out.write_len(keys.len())?;
                for key in keys {
                    out.write_signed(*key)?;
                }
            }
            SwitchKeys::Range { min, max } => {
                out.write_byte(1)?;
                out.write_signed(*min)?;
                out.write_signed(*max)?;
            }
        }
        out.write_int(self.default_hits())?;
        for hits in self.hits.values() {
            out.write_int(hits)?;
        }
        Ok(())
    }

    fn load<R: Read>(id: u32, input: &mut CoverageReader<R>) -> CoverageResult<Self> {
        let keys = match input.read_byte()? {
            0 => {
                let count = input.read_len()?;
                let mut keys = Vec::with_capacity(count.min(MAX_PREALLOCATED));
                for _ in 0..count {
                    keys.push(input.read_signed()?);
                }
                SwitchKeys::Explicit(keys)
            }
            1 => {
                let min = input.read_signed()?;
                let max = input.read_signed()?;
                SwitchKeys::Range { min, max }
            }
            tag => {
                return Err(CoverageError::malformed(format!(
                    "unknown switch key tag {tag}"
                )))
            }
        };
        let default_hits = input.read_int()?;
        let arms = keys.arm_count();
        if arms > u32::MAX as usize {
            return Err(CoverageError::malformed("switch range too wide"));
        }
        let mut values = Vec::with_capacity(arms.min(MAX_PREALLOCATED));
        for _ in 0..arms {
            values.push(input.read_int()?);
        }
        Ok(Self {
            id,
            keys,
            default_hits: HitCounter::new(default_hits),
            hits: CounterArray::from_values(&values),
        })
    }
}

/// Coverage record of one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineData {
    line: u32,
    method_signature: Arc<str>,
    hits: HitCounter,
    jumps: Vec<JumpData>,
    switches: Vec<SwitchData>,
}

impl LineData {
    /// Create an empty record for `line` inside the given method
    #[must_use]
    pub fn new(line: u32, method_signature: Arc<str>) -> Self {
        Self {
            line,
            method_signature,
            hits: HitCounter::default(),
            jumps: Vec::new(),
            switches: Vec::new(),
        }
    }

    /// Source line number
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Owning method, `name + descriptor`
    #[must_use]
    pub fn method_signature(&self) -> &str {
        &self.method_signature
    }

    pub(crate) fn set_signature_handle(&mut self, signature: Arc<str>) {
        self.method_signature = signature;
    }

    /// Times the line was executed
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits.get()
    }

    /// Add hits collected elsewhere (line mask, loaded reports)
    pub fn add_hits(&mut self, count: u32) {
        self.hits.add(count);
    }

    /// Registered jumps, in registration order
    #[must_use]
    pub fn jumps(&self) -> &[JumpData] {
        &self.jumps
    }

    /// Registered switches, in registration order
    #[must_use]
    pub fn switches(&self) -> &[SwitchData] {
        &self.switches
    }

    /// Look up a jump by its per-line index
    #[must_use]
    pub fn jump(&self, id: u32) -> Option<&JumpData> {
        self.jumps
            .get(id as usize)
            .filter(|jump| jump.id == id)
            .or_else(|| self.jumps.iter().find(|jump| jump.id == id))
    }

    /// Look up a switch by its per-line index
    #[must_use]
    pub fn switch(&self, id: u32) -> Option<&SwitchData> {
        self.switches
            .get(id as usize)
            .filter(|switch| switch.id == id)
            .or_else(|| self.switches.iter().find(|switch| switch.id == id))
    }

    /// Record one execution of the line (hot path)
    #[inline]
    pub fn touch(&self) {
        self.hits.increment();
    }

    /// Record a jump outcome; unknown jump ids are ignored
    #[inline]
    pub fn touch_jump(&self, id: u32, taken: bool) {
        if let Some(jump) = self.jump(id) {
            jump.touch(taken);
        }
    }

    /// Record a switch dispatch; unknown switch ids are ignored
    #[inline]
    pub fn touch_switch(&self, id: u32, key: i32) {
        if let Some(switch) = self.switch(id) {
            switch.touch(key);
        }
    }

    /// Declare a jump; a second declaration of the same id is a no-op
    pub fn add_jump(&mut self, id: u32) {
        if self.jump(id).is_none() {
            self.jumps.push(JumpData::new(id));
        }
    }

    /// Declare a switch; a second declaration of the same id is a no-op
    pub fn add_switch(&mut self, id: u32, keys: SwitchKeys) {
        if self.switch(id).is_none() {
            self.switches.push(SwitchData::new(id, keys));
        }
    }

    /// Drop the most recently declared jump, if any
    pub fn remove_last_jump(&mut self) -> Option<JumpData> {
        self.jumps.pop()
    }

    /// Coverage classification of this line
    #[must_use]
    pub fn status(&self) -> LineCoverage {
        if !self.hits.is_hit() {
            let any_branch = self
                .jumps
                .iter()
                .any(|jump| jump.true_hits.is_hit() || jump.false_hits.is_hit())
                || self.switches.iter().any(SwitchData::any_hit);
            return if any_branch {
                LineCoverage::Partial
            } else {
                LineCoverage::None
            };
        }
        let jumps_covered = self.jumps.iter().all(JumpData::is_fully_covered);
        let switches_covered = self.switches.iter().all(SwitchData::is_fully_covered);
        if jumps_covered && switches_covered {
            LineCoverage::Full
        } else {
            LineCoverage::Partial
        }
    }

    /// Covered and total branch outcomes (two per jump, one per switch arm)
    #[must_use]
    pub fn branch_counts(&self) -> BranchCounts {
        let mut counts = BranchCounts::default();
        for jump in &self.jumps {
            counts.total += 2;
            counts.covered += usize::from(jump.true_hits.is_hit());
            counts.covered += usize::from(jump.false_hits.is_hit());
        }
        for switch in &self.switches {
            counts.total += switch.hits.len() + 1;
            counts.covered += usize::from(switch.default_hits.is_hit());
            counts.covered += switch.hits.values().iter().filter(|&&h| h > 0).count();
        }
        counts
    }

    pub(crate) fn check_same_shape(&self, other: &LineData) -> CoverageResult<()> {
        if self.jumps.len() != other.jumps.len() {
            return Err(CoverageError::shape_mismatch(
                self.line,
                format!("{} jumps vs {}", self.jumps.len(), other.jumps.len()),
            ));
        }
        if let Some((ours, theirs)) = self
            .jumps
            .iter()
            .zip(&other.jumps)
            .find(|(ours, theirs)| ours.id != theirs.id)
        {
            return Err(CoverageError::shape_mismatch(
                self.line,
                format!("jump {} vs jump {}", ours.id, theirs.id),
            ));
        }
        if self.switches.len() != other.switches.len() {
            return Err(CoverageError::shape_mismatch(
                self.line,
                format!("{} switches vs {}", self.switches.len(), other.switches.len()),
            ));
        }
        for (ours, theirs) in self.switches.iter().zip(&other.switches) {
            if ours.id != theirs.id || ours.keys != theirs.keys {
                return Err(CoverageError::shape_mismatch(
                    self.line,
                    format!("switch {} keys differ", ours.id),
                ));
            }
        }
        Ok(())
    }

    /// Add all counters of `other` into this record
    ///
    /// Both records must have identical jump and switch structure; on a
    /// mismatch nothing is modified.
    pub fn merge(&mut self, other: &LineData) -> CoverageResult<()> {
        self.check_same_shape(other)?;
        self.hits.add(other.hits());
        for (ours, theirs) in self.jumps.iter_mut().zip(&other.jumps) {
            ours.merge(theirs);
        }
        for (ours, theirs) in self.switches.iter_mut().zip(&other.switches) {
            ours.merge(theirs);
        }
        Ok(())
    }

    /// Serialize line number, hits, jumps and switches
    pub fn save<W: Write>(&self, out: &mut CoverageWriter<W>) -> CoverageResult<()> {
        out.write_int(self.line)?;
        out.write_int(self.hits())?;
        out.write_len(self.jumps.len())?;
        for jump in &self.jumps {
            out.write_int(jump.true_hits())?;
            out.write_int(jump.false_hits())?;
        }
        out.write_len(self.switches.len())?;
        for switch in &self.switches {
            switch.save(out)?;
        }
        Ok(())
    }

    /// Read a record written by [`LineData::save`]
    ///
    /// Jump and switch ids are positional.
    pub fn load<R: Read>(
        input: &mut CoverageReader<R>,
        method_signature: Arc<str>,
    ) -> CoverageResult<Self> {
        let line = input.read_int()?;
        if line > MAX_LINE_NUMBER {
            return Err(CoverageError::malformed(format!(
                "line number {line} exceeds {MAX_LINE_NUMBER}"
            )));
        }
        let mut data = Self::new(line, method_signature);
        data.hits.set(input.read_int()?);

        let jump_count = input.read_len()?;
        data.jumps.reserve(jump_count.min(MAX_PREALLOCATED));
        for id in 0..jump_count {
            let mut jump = JumpData::new(id as u32);
            jump.true_hits.set(input.read_int()?);
            jump.false_hits.set(input.read_int()?);
            data.jumps.push(jump);
        }

        let switch_count = input.read_len()?;
        data.switches.reserve(switch_count.min(MAX_PREALLOCATED));
        for id in 0..switch_count {
            data.switches.push(SwitchData::load(id as u32, input)?);
        }
        Ok(data)
    }
}
