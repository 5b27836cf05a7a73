//! Instruction Events
//!
//! The typed event stream a bytecode reader produces for one method. Only
//! the categories that compiler idioms are made of carry detail (local
//! variable access, jumps, invocations, plain zero-operand instructions);
//! everything else is kept coarse because filters only need to know that
//! "real" code was there.

/// Raw opcodes of zero-operand instructions referenced by filters
pub mod opcodes {
    /// `nop`
    pub const NOP: u8 = 0x00;
    /// `aconst_null`
    pub const ACONST_NULL: u8 = 0x01;
    /// `iconst_0`
    pub const ICONST_0: u8 = 0x03;
    /// `iconst_1`
    pub const ICONST_1: u8 = 0x04;
    /// `pop`
    pub const POP: u8 = 0x57;
    /// `dup`
    pub const DUP: u8 = 0x59;
    /// `ireturn`
    pub const IRETURN: u8 = 0xac;
    /// `areturn`
    pub const ARETURN: u8 = 0xb0;
    /// `return`
    pub const RETURN: u8 = 0xb1;
    /// `athrow`
    pub const ATHROW: u8 = 0xbf;
}

/// Jump target (opaque to filters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Label(pub u32);

/// Local variable access direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarOp {
    /// `*load`
    Load,
    /// `*store`
    Store,
}

/// Jump instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOp {
    /// `goto`
    Goto,
    /// `jsr`
    Jsr,
    /// `ifnull`
    IfNull,
    /// `ifnonnull`
    IfNonNull,
    /// `ifeq`
    IfEq,
    /// `ifne`
    IfNe,
    /// `iflt`
    IfLt,
    /// `ifge`
    IfGe,
    /// `ifgt`
    IfGt,
    /// `ifle`
    IfLe,
    /// `if_icmpeq`
    IfICmpEq,
    /// `if_icmpne`
    IfICmpNe,
    /// `if_icmplt`
    IfICmpLt,
    /// `if_icmpge`
    IfICmpGe,
    /// `if_icmpgt`
    IfICmpGt,
    /// `if_icmple`
    IfICmpLe,
    /// `if_acmpeq`
    IfACmpEq,
    /// `if_acmpne`
    IfACmpNe,
}

impl JumpOp {
    /// Check if the jump has two outcomes
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        !matches!(self, Self::Goto | Self::Jsr)
    }
}

/// Method invocation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOp {
    /// `invokevirtual`
    Virtual,
    /// `invokespecial`
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`
    Interface,
}

/// A method invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInsn {
    /// Invocation kind
    pub op: InvokeOp,
    /// Internal name of the owner class, e.g. `java/lang/Throwable`
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor, e.g. `()V`
    pub descriptor: String,
    /// Owner is an interface
    pub is_interface: bool,
}

impl MethodInsn {
    /// Check for `name` + `descriptor`
    #[must_use]
    pub fn is(&self, name: &str, descriptor: &str) -> bool {
        self.name == name && self.descriptor == descriptor
    }
}

/// One event of a method's instruction stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// Start of code attributed to a source line
    LineNumber(u32),
    /// Local variable load or store
    Var {
        /// Direction
        op: VarOp,
        /// Reference-typed (`aload`/`astore`) rather than primitive
        reference: bool,
        /// Slot index
        var: u16,
    },
    /// Conditional or unconditional jump
    Jump {
        /// Jump kind
        op: JumpOp,
        /// Target
        target: Label,
    },
    /// Method invocation
    Method(MethodInsn),
    /// Zero-operand instruction, see [`opcodes`]
    Plain(u8),
    /// `bipush`, `sipush`, `newarray`
    Int {
        /// Raw opcode
        opcode: u8,
        /// Operand
        operand: i32,
    },
    /// Field access
    Field {
        /// Raw opcode
        opcode: u8,
        /// Owner internal name
        owner: String,
        /// Field name
        name: String,
    },
    /// `iinc`
    Iinc {
        /// Slot index
        var: u16,
        /// Increment
        increment: i16,
    },
    /// `invokedynamic`
    InvokeDynamic {
        /// Call site name
        name: String,
    },
    /// `tableswitch`
    TableSwitch {
        /// Lowest case value
        min: i32,
        /// Highest case value
        max: i32,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Case values
        keys: Vec<i32>,
    },
    /// `new`, `anewarray`, `checkcast`, `instanceof`
    Type {
        /// Raw opcode
        opcode: u8,
        /// Internal type name
        type_name: String,
    },
    /// `multianewarray`
    MultiANewArray {
        /// Array descriptor
        descriptor: String,
        /// Dimensions
        dims: u8,
    },
    /// `ldc`
    Ldc(String),
}

impl Insn {
    /// `aload var`
    #[must_use]
    pub const fn aload(var: u16) -> Self {
        Self::Var {
            op: VarOp::Load,
            reference: true,
            var,
        }
    }

    /// `astore var`
    #[must_use]
    pub const fn astore(var: u16) -> Self {
        Self::Var {
            op: VarOp::Store,
            reference: true,
            var,
        }
    }

    /// `iload var`
    #[must_use]
    pub const fn iload(var: u16) -> Self {
        Self::Var {
            op: VarOp::Load,
            reference: false,
            var,
        }
    }

    /// Jump without a meaningful target
    #[must_use]
    pub const fn jump(op: JumpOp) -> Self {
        Self::Jump {
            op,
            target: Label(0),
        }
    }

    /// `invokevirtual owner.name descriptor`
    #[must_use]
    pub fn invoke_virtual(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::Method(MethodInsn {
            op: InvokeOp::Virtual,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface: false,
        })
    }

    /// `invokeinterface owner.name descriptor`
    #[must_use]
    pub fn invoke_interface(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::Method(MethodInsn {
            op: InvokeOp::Interface,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface: true,
        })
    }

    /// `invokestatic owner.name descriptor`
    #[must_use]
    pub fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::Method(MethodInsn {
            op: InvokeOp::Static,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface: false,
        })
    }

    /// `getstatic owner.name`
    #[must_use]
    pub fn get_static(owner: &str, name: &str) -> Self {
        Self::Field {
            opcode: 0xb2,
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }
}
