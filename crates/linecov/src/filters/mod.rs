//! Compiler-Idiom Filters
//!
//! A filter watches the same instruction stream the instrumenter walks and
//! recognizes code the compiler generated on its own. When a source line
//! turns out to contain nothing but such code, the filter retracts the line
//! record (and any jump records it caused) from the class store, so the
//! report does not show compiler boilerplate as uncovered.
//!
//! ```text
//! Insn stream ──► MethodInstrumenter ──► ClassData (create lines, jumps)
//!                        │                    ▲
//!                        ▼                    │ remove_line / remove_last_jump
//!                   FilterChain ──► LineFilter┘
//! ```
//!
//! Filters are built fresh for every method. A filter only retracts at a
//! line boundary or at method end, and only when nothing but idiom code was
//! seen on the line being closed. Anything unexpected keeps the line.

mod try_with_resources;

pub use try_with_resources::TryWithResourcesFilter;

use crate::config::FilterConfig;
use crate::data::ClassData;
use crate::insn::{Insn, JumpOp, MethodInsn, VarOp};
use std::fmt;

/// The method a filter is about to observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContext {
    /// Class name, dotted or internal form
    pub class_name: String,
    /// Method name
    pub method_name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Class file major version, 0 when unknown
    pub class_version: u16,
}

impl MethodContext {
    /// Create a context with an unknown class file version
    #[must_use]
    pub fn new(class_name: &str, method_name: &str, descriptor: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            descriptor: descriptor.to_string(),
            class_version: 0,
        }
    }

    /// Set the class file major version
    #[must_use]
    pub fn with_class_version(mut self, version: u16) -> Self {
        self.class_version = version;
        self
    }

    /// `name + descriptor`, the key line records are grouped by
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.method_name, self.descriptor)
    }
}

/// Bookkeeping a filter may undo
pub trait FilterContext {
    /// Drop the record of `line`; no-op if absent
    fn remove_line(&mut self, line: u32);

    /// Drop the most recent jump record of `line`; no-op if absent
    fn remove_last_jump(&mut self, line: u32);
}

impl FilterContext for ClassData {
    fn remove_line(&mut self, line: u32) {
        let _ = ClassData::remove_line(self, line);
    }

    fn remove_last_jump(&mut self, line: u32) {
        let _ = ClassData::remove_last_jump(self, line);
    }
}

/// An observer of one method's instruction stream
///
/// Every callback has an empty default so a filter only spells out the
/// categories its idiom is made of, plus whatever it must treat as real code.
pub trait LineFilter: fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Decide once per method whether the filter takes part
    fn is_applicable(&self, context: &MethodContext) -> bool;

    /// A new source line starts; close the previous one
    fn on_line_boundary(&mut self, _line: u32, _context: &mut dyn FilterContext) {}

    /// The method ends; close the last line
    fn on_method_end(&mut self, _context: &mut dyn FilterContext) {}

    /// Local variable load or store
    fn on_var_insn(&mut self, _op: VarOp, _reference: bool) {}

    /// Jump
    fn on_jump_insn(&mut self, _op: JumpOp, _context: &mut dyn FilterContext) {}

    /// Method invocation
    fn on_method_insn(&mut self, _insn: &MethodInsn) {}

    /// Zero-operand instruction
    fn on_insn(&mut self, _opcode: u8) {}

    /// Any category no idiom is made of (field access, constants, type
    /// checks, `invokedynamic`, switches, ...)
    fn on_other_insn(&mut self, _insn: &Insn) {}
}

/// Ordered set of filters for one method
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn LineFilter>>,
}

impl FilterChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in filters enabled by `config`
    #[must_use]
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut chain = Self::new();
        if config.try_with_resources {
            chain = chain.with_filter(Box::new(TryWithResourcesFilter::new()));
        }
        chain
    }

    /// Append a filter
    #[must_use]
    pub fn with_filter(mut self, filter: Box<dyn LineFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Drop filters that do not apply to `context`
    #[must_use]
    pub fn retain_applicable(mut self, context: &MethodContext) -> Self {
        self.filters.retain(|filter| filter.is_applicable(context));
        self
    }

    /// Number of filters
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if the chain has no filters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Names of the filters, in order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }

    /// Deliver one event to every filter, in order
    pub fn dispatch(&mut self, insn: &Insn, context: &mut dyn FilterContext) {
        for filter in &mut self.filters {
            match insn {
                Insn::LineNumber(line) => filter.on_line_boundary(*line, context),
                Insn::Var { op, reference, .. } => filter.on_var_insn(*op, *reference),
                Insn::Jump { op, .. } => filter.on_jump_insn(*op, context),
                Insn::Method(method) => filter.on_method_insn(method),
                Insn::Plain(opcode) => filter.on_insn(*opcode),
                other => filter.on_other_insn(other),
            }
        }
    }

    /// Signal method end to every filter
    pub fn finish(&mut self, context: &mut dyn FilterContext) {
        for filter in &mut self.filters {
            filter.on_method_end(context);
        }
    }
}

#[cfg(test)]
mod tests;
