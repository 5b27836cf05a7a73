//! Linecov: Line and Branch Coverage Core for JVM Bytecode
//!
//! The data model an instrumenting coverage agent writes into while the
//! program under test runs, and the compiler-idiom filters that keep
//! javac boilerplate out of the report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    LINECOV Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Insn       │    │ Method     │    │ ClassData  │            │
//! │   │ stream     │───►│ Instrument │───►│ (lines,    │            │
//! │   │            │    │ + Filters  │    │  counters) │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │ touch_* (run time) │
//! │                                             ▼                    │
//! │                     ProjectData ──► merge / save / load          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use linecov::{ClassData, LineCoverage};
//!
//! let mut class = ClassData::new("com.example.Foo");
//! let line = class.get_or_create_line(10, "run()V");
//! line.add_jump(0);
//!
//! class.touch_line(10);
//! class.touch_jump(10, 0, true);
//! assert_eq!(class.line(10).map(|l| l.status()), Some(LineCoverage::Partial));
//!
//! class.touch_jump(10, 0, false);
//! assert_eq!(class.method_status("run()V"), LineCoverage::Full);
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod config;
pub mod counters;
pub mod data;
pub mod discovery;
pub mod filters;
pub mod insn;
pub mod instrument;
mod result;

pub use config::{CoverageMode, FilterConfig, InstrumentationConfig, InstrumentationConfigBuilder};
pub use counters::{CounterArray, HitCounter};
pub use data::{
    BranchCounts, ClassData, CoverageReader, CoverageWriter, JumpData, LineCoverage, LineData,
    ProjectData, StringDictionary, SwitchData, SwitchKeys, MAX_LINE_NUMBER,
};
pub use discovery::{DiscoveryRegistry, MethodVisits, TestTrace};
pub use filters::{FilterChain, FilterContext, LineFilter, MethodContext, TryWithResourcesFilter};
pub use insn::{Insn, InvokeOp, JumpOp, Label, MethodInsn, VarOp};
pub use instrument::{ClassInstrumenter, MethodInstrumenter, MethodSummary};
pub use result::{CoverageError, CoverageResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::config::*;
    pub use super::data::*;
    pub use super::discovery::*;
    pub use super::filters::*;
    pub use super::insn::*;
    pub use super::instrument::*;
    pub use super::result::*;
}
