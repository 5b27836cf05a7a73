//! Try-with-resources cleanup recognizer.
//!
//! javac attributes the whole resource cleanup (null check, `close()`,
//! `addSuppressed` bookkeeping, rethrow) to the line of the resource or the
//! `try` keyword. Left alone, a fully exercised block shows that line as
//! partially covered because of branches only the compiler can reach.
//!
//! ```text
//! INITIAL → STORE_INITIAL_EXCEPTION <--------|
//!    ↘         ↓                             |
//!     LOAD_RESOURCE ↔ CHECK_RESOURCE_NULL    |
//!          ↕                                 |
//!       CALL_CLOSE*                          |
//!          ↓                                 |
//!         GOTO*                              |
//!          ↓                                 |
//!  STORE_ADDITIONAL_EXCEPTION                |
//!          ↓                                 |
//!  LOAD_INITIAL_EXCEPTION                    |
//!          ↓                                 |
//!  LOAD_ADDITIONAL_EXCEPTION                 |
//!          ↓                                 |
//!  CALL_ADD_SUPPRESSED     ↘                 |
//!          ↓                 GOTO_2          |
//!  LOAD_INITIAL_EXCEPTION_2 ↙                |
//!      ↕             ↘                       |
//! CALL_CLOSE_2       THROW* -----------------|
//!    ↓
//!   GOTO_3*
//! ```
//!
//! `*` marks accepting states. `GOTO_2`, `CALL_CLOSE_2` and `GOTO_3` only
//! appear in Java 8 output.

use super::{FilterContext, LineFilter, MethodContext};
use crate::insn::{opcodes, Insn, InvokeOp, JumpOp, MethodInsn, VarOp};
use tracing::debug;

/// First class file major version that can contain try-with-resources (Java 7)
const JAVA_7: u16 = 51;

const THROWABLE: &str = "java/lang/Throwable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    StoreInitialException,
    LoadResource,
    CheckResourceNull,
    CallClose,
    Goto,
    StoreAdditionalException,
    LoadInitialException,
    LoadAdditionalException,
    CallAddSuppressed,
    Goto2,
    LoadInitialException2,
    Throw,
    CallClose2,
    Goto3,
}

impl State {
    const fn is_accepting(self) -> bool {
        matches!(self, Self::CallClose | Self::Goto | Self::Throw | Self::Goto3)
    }
}

/// Retracts lines made only of try-with-resources cleanup code
#[derive(Debug)]
pub struct TryWithResourcesFilter {
    state: State,
    /// Real (non-idiom) code was seen on the current line
    has_instructions: bool,
    current_line: Option<u32>,
    /// `ifnull` checks whose jump records go away once `close(); goto` matched
    jumps_to_remove: u32,
}

impl Default for TryWithResourcesFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TryWithResourcesFilter {
    /// Create a filter in its initial state
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Initial,
            has_instructions: false,
            current_line: None,
            jumps_to_remove: 0,
        }
    }

    fn real_instruction(&mut self) {
        self.state = State::Initial;
        self.has_instructions = true;
        self.jumps_to_remove = 0;
    }

    fn advance(&mut self, next: Option<State>) {
        match next {
            Some(state) => self.state = state,
            None => self.real_instruction(),
        }
    }

    fn try_remove_line(&mut self, context: &mut dyn FilterContext) {
        let Some(line) = self.current_line else {
            return;
        };
        if !self.has_instructions && self.state.is_accepting() {
            debug!(line, state = ?self.state, "retracting try-with-resources line");
            context.remove_line(line);
            self.current_line = None;
        }
    }
}

impl LineFilter for TryWithResourcesFilter {
    fn name(&self) -> &'static str {
        "try-with-resources"
    }

    fn is_applicable(&self, context: &MethodContext) -> bool {
        context.class_version == 0 || context.class_version >= JAVA_7
    }

    fn on_line_boundary(&mut self, line: u32, context: &mut dyn FilterContext) {
        self.try_remove_line(context);
        self.current_line = Some(line);
        self.state = State::Initial;
        self.has_instructions = false;
        self.jumps_to_remove = 0;
    }

    fn on_method_end(&mut self, context: &mut dyn FilterContext) {
        self.try_remove_line(context);
    }

    fn on_var_insn(&mut self, op: VarOp, reference: bool) {
        let next = match (self.state, op) {
            _ if !reference => None,
            (State::Initial | State::Throw, VarOp::Store) => Some(State::StoreInitialException),
            (
                State::StoreInitialException
                | State::CheckResourceNull
                | State::Initial
                | State::CallClose,
                VarOp::Load,
            ) => Some(State::LoadResource),
            (State::Goto, VarOp::Store) => Some(State::StoreAdditionalException),
            (State::StoreAdditionalException, VarOp::Load) => Some(State::LoadInitialException),
            (State::LoadInitialException, VarOp::Load) => Some(State::LoadAdditionalException),
            (State::CallAddSuppressed | State::Goto2 | State::CallClose2, VarOp::Load) => {
                Some(State::LoadInitialException2)
            }
            _ => None,
        };
        self.advance(next);
    }

    fn on_jump_insn(&mut self, op: JumpOp, context: &mut dyn FilterContext) {
        let next = match (self.state, op) {
            (State::LoadResource, JumpOp::IfNull) => {
                self.jumps_to_remove += 1;
                Some(State::CheckResourceNull)
            }
            (State::CallClose, JumpOp::Goto) => {
                if let Some(line) = self.current_line {
                    for _ in 0..self.jumps_to_remove {
                        context.remove_last_jump(line);
                    }
                }
                self.jumps_to_remove = 0;
                Some(State::Goto)
            }
            (State::CallAddSuppressed, JumpOp::Goto) => Some(State::Goto2),
            (State::CallClose2, JumpOp::Goto) => Some(State::Goto3),
            _ => None,
        };
        self.advance(next);
    }

    fn on_method_insn(&mut self, insn: &MethodInsn) {
        let virtual_call = matches!(insn.op, InvokeOp::Virtual | InvokeOp::Interface);
        let next = if virtual_call && insn.is("close", "()V") {
            match self.state {
                State::LoadResource | State::CheckResourceNull => Some(State::CallClose),
                State::LoadInitialException2 => Some(State::CallClose2),
                _ => None,
            }
        } else if self.state == State::LoadAdditionalException
            && insn.op == InvokeOp::Virtual
            && insn.owner == THROWABLE
            && insn.is("addSuppressed", "(Ljava/lang/Throwable;)V")
        {
            Some(State::CallAddSuppressed)
        } else {
            None
        };
        self.advance(next);
    }

    fn on_insn(&mut self, opcode: u8) {
        let next = (self.state == State::LoadInitialException2 && opcode == opcodes::ATHROW)
            .then_some(State::Throw);
        self.advance(next);
    }

    fn on_other_insn(&mut self, _insn: &Insn) {
        self.real_instruction();
    }
}
