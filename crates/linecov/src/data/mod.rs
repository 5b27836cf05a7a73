//! Coverage Data Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  LINECOV DATA MODEL                                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ProjectData ─► ClassData ─► LineData ─► JumpData / SwitchData  │
//! │       │             │                                            │
//! │  StringDictionary   Sparse map ⇄ Dense array (finalize)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Counters are written by instrumented code through shared references and
//! read back once execution has quiesced; see [`crate::counters`].

mod class;
mod dictionary;
mod io;
mod line;
mod project;

pub use class::{ClassData, Lines};
pub use dictionary::StringDictionary;
pub use io::{CoverageReader, CoverageWriter};
pub use line::{
    BranchCounts, JumpData, LineCoverage, LineData, SwitchData, SwitchKeys, MAX_LINE_NUMBER,
};
pub use project::{ProjectData, FORMAT_VERSION, REPORT_MAGIC};
