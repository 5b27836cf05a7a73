//! Instrumentation Driver
//!
//! Walks the instruction stream of each method of a class, creates line
//! records at line markers, registers jump and switch records where counters
//! would be injected, and lets the filter chain retract compiler-only lines.
//!
//! Bytecode rewriting itself belongs to the embedding agent; this driver only
//! keeps the [`ClassData`] bookkeeping that the injected counters address.

use crate::config::{CoverageMode, InstrumentationConfig};
use crate::data::{ClassData, SwitchKeys};
use crate::filters::{FilterChain, MethodContext};
use crate::insn::Insn;
use std::collections::BTreeSet;
use tracing::debug;

/// What instrumenting one method left in the class store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSummary {
    /// `name + descriptor`
    pub signature: String,
    /// Lines that still have a record, ascending
    pub lines: Vec<u32>,
    /// Lines created for this method and retracted by a filter, ascending
    pub retracted: Vec<u32>,
}

/// Instrumentation pass over one class
#[derive(Debug)]
pub struct ClassInstrumenter<'a> {
    class: &'a mut ClassData,
    config: &'a InstrumentationConfig,
    methods: usize,
}

impl<'a> ClassInstrumenter<'a> {
    /// Start instrumenting `class`
    pub fn new(class: &'a mut ClassData, config: &'a InstrumentationConfig) -> Self {
        Self {
            class,
            config,
            methods: 0,
        }
    }

    /// Begin a method; filters not applicable to it are dropped
    pub fn method(&mut self, context: &MethodContext) -> MethodInstrumenter<'_> {
        self.methods += 1;
        let filters = FilterChain::from_config(&self.config.filters).retain_applicable(context);
        MethodInstrumenter {
            class: &mut *self.class,
            config: self.config,
            signature: context.signature(),
            filters,
            current_line: None,
            created: BTreeSet::new(),
        }
    }

    /// Instrument a whole method from its event stream
    pub fn instrument_method(&mut self, context: &MethodContext, insns: &[Insn]) -> MethodSummary {
        let mut method = self.method(context);
        for insn in insns {
            method.visit(insn);
        }
        method.finish()
    }

    /// Number of methods instrumented so far
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods
    }

    /// End the pass; sampling mode allocates the line mask here
    pub fn finish(self) {
        if self.config.mode == CoverageMode::Sampling {
            let max_line = self.class.max_line();
            self.class.init_line_mask(max_line);
        }
        debug!(
            class = self.class.name(),
            methods = self.methods,
            lines = self.class.line_count(),
            "instrumented class"
        );
    }
}

/// Instrumentation of one method
#[derive(Debug)]
pub struct MethodInstrumenter<'c> {
    class: &'c mut ClassData,
    config: &'c InstrumentationConfig,
    signature: String,
    filters: FilterChain,
    current_line: Option<u32>,
    created: BTreeSet<u32>,
}

impl MethodInstrumenter<'_> {
    /// Process one event
    pub fn visit(&mut self, insn: &Insn) {
        match insn {
            Insn::LineNumber(line) => {
                // Filters close the previous line before the next one exists.
                self.filters.dispatch(insn, &mut *self.class);
                let _ = self.class.get_or_create_line(*line, &self.signature);
                let _ = self.created.insert(*line);
                self.current_line = Some(*line);
                return;
            }
            Insn::Jump { op, .. } if op.is_conditional() => self.register_jump(),
            Insn::TableSwitch { min, max } => self.register_switch(SwitchKeys::Range {
                min: *min,
                max: *max,
            }),
            Insn::LookupSwitch { keys } => self.register_switch(SwitchKeys::Explicit(keys.clone())),
            _ => {}
        }
        self.filters.dispatch(insn, &mut *self.class);
    }

    fn register_jump(&mut self) {
        if !self.config.tracks_branches() {
            return;
        }
        let Some(line) = self.current_line else {
            return;
        };
        if let Some(data) = self.class.line(line) {
            let id = data.jumps().len() as u32;
            self.class.add_line_jump(line, id);
        }
    }

    fn register_switch(&mut self, keys: SwitchKeys) {
        if !self.config.tracks_branches() {
            return;
        }
        let Some(line) = self.current_line else {
            return;
        };
        if let Some(data) = self.class.line(line) {
            let id = data.switches().len() as u32;
            self.class.add_line_switch(line, id, keys);
        }
    }

    /// End the method and report which of its lines survived
    pub fn finish(mut self) -> MethodSummary {
        self.filters.finish(&mut *self.class);
        let (lines, retracted): (Vec<u32>, Vec<u32>) = self
            .created
            .iter()
            .copied()
            .partition(|&line| self.class.contains_line(line));
        MethodSummary {
            signature: self.signature,
            lines,
            retracted,
        }
    }
}
