use itertools::Itertools;

use crate::{
    jvm::references::{ClassRef, FieldRef, MethodRef},
    types::{
        field_type::{FieldType, PrimitiveType},
        method_descriptor::ReturnType,
    },
};

use super::Label;

/// The computational kind of a value on the operand stack or in a local variable.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, derive_more::Display)]
pub enum ValueKind {
    /// `int`, and every type narrower than `int`.
    #[display("int")]
    Int,
    /// `long`.
    #[display("long")]
    Long,
    /// `float`.
    #[display("float")]
    Float,
    /// `double`.
    #[display("double")]
    Double,
    /// Any reference.
    #[display("reference")]
    Reference,
}

impl ValueKind {
    /// Returns the kind used to hold values of the given type.
    #[must_use]
    pub const fn of(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Base(PrimitiveType::Long) => Self::Long,
            FieldType::Base(PrimitiveType::Float) => Self::Float,
            FieldType::Base(PrimitiveType::Double) => Self::Double,
            FieldType::Base(_) => Self::Int,
            FieldType::Object(_) | FieldType::Array(_) => Self::Reference,
        }
    }

    /// Returns the kind of the value returned by a method, or [`None`] for `void`.
    #[must_use]
    pub const fn of_return(return_type: &ReturnType) -> Option<Self> {
        match return_type {
            ReturnType::Some(it) => Some(Self::of(it)),
            ReturnType::Void => None,
        }
    }

    /// Returns the number of local variable slots taken by a value of this kind.
    #[must_use]
    pub const fn slot_size(self) -> u16 {
        match self {
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Returns the mnemonic prefix, e.g. `i` in `iload`.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Int => "i",
            Self::Long => "l",
            Self::Float => "f",
            Self::Double => "d",
            Self::Reference => "a",
        }
    }

    const fn opcode_offset(self) -> u8 {
        match self {
            Self::Int => 0,
            Self::Long => 1,
            Self::Float => 2,
            Self::Double => 3,
            Self::Reference => 4,
        }
    }
}

/// A comparison used by conditional jumps.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
pub enum Condition {
    /// `==`
    #[display("eq")]
    Eq,
    /// `!=`
    #[display("ne")]
    Ne,
    /// `<`
    #[display("lt")]
    Lt,
    /// `>=`
    #[display("ge")]
    Ge,
    /// `>`
    #[display("gt")]
    Gt,
    /// `<=`
    #[display("le")]
    Le,
}

impl Condition {
    /// Evaluates the condition on the two operands.
    #[must_use]
    pub fn holds(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Ge => lhs >= rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
        }
    }

    const fn opcode_offset(self) -> u8 {
        match self {
            Self::Eq => 0,
            Self::Ne => 1,
            Self::Lt => 2,
            Self::Ge => 3,
            Self::Gt => 4,
            Self::Le => 5,
        }
    }
}

/// An arithmetic operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
pub enum MathOp {
    /// Addition.
    #[display("add")]
    Add,
    /// Subtraction.
    #[display("sub")]
    Sub,
    /// Multiplication.
    #[display("mul")]
    Mul,
    /// Division.
    #[display("div")]
    Div,
    /// Remainder.
    #[display("rem")]
    Rem,
    /// Negation, takes one operand.
    #[display("neg")]
    Neg,
}

/// The dispatch mode of a method invocation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
pub enum InvokeKind {
    /// `invokevirtual`
    #[display("virtual")]
    Virtual,
    /// `invokespecial`
    #[display("special")]
    Special,
    /// `invokestatic`
    #[display("static")]
    Static,
    /// `invokeinterface`
    #[display("interface")]
    Interface,
}

impl InvokeKind {
    /// Checks if the invocation consumes a receiver.
    #[must_use]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// A constant pushed by [`Instruction::Ldc`] or stored in an annotation.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum ConstantValue {
    /// An `int` constant. Also used for `boolean`, `byte`, `char` and `short`.
    #[display("{_0}")]
    Integer(i32),
    /// A `long` constant.
    #[display("{_0}L")]
    Long(i64),
    /// A `float` constant.
    #[display("{_0}F")]
    Float(f32),
    /// A `double` constant.
    #[display("{_0}D")]
    Double(f64),
    /// A string literal.
    #[display("{_0:?}")]
    String(String),
    /// The `null` reference.
    #[display("null")]
    Null,
}

impl ConstantValue {
    /// Returns the kind of the constant once it is on the operand stack.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) | Self::Null => ValueKind::Reference,
        }
    }
}

/// A JVM instruction, with symbolic jump targets.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum Instruction {
    /// Defines a jump target. Zero width.
    #[display("{_0}:")]
    Label(Label),
    /// Source line marker. Zero width.
    #[display("line {_0}")]
    LineNumber(u16),
    /// Stack map frame marker. Zero width.
    #[display("frame")]
    Frame,
    /// `nop`
    #[display("nop")]
    Nop,
    /// Pushes a constant.
    #[display("ldc {_0}")]
    Ldc(ConstantValue),
    /// Loads a local variable.
    #[display("{}load {}", _0.prefix(), _1)]
    Load(ValueKind, u16),
    /// Stores into a local variable.
    #[display("{}store {}", _0.prefix(), _1)]
    Store(ValueKind, u16),
    /// Increments an `int` local variable.
    #[display("iinc {_0} {_1}")]
    IInc(u16, i16),
    /// An arithmetic operation. Not valid on references.
    #[display("{}{}", _0.prefix(), _1)]
    Math(ValueKind, MathOp),
    /// `pop`
    #[display("pop")]
    Pop,
    /// `pop2`
    #[display("pop2")]
    Pop2,
    /// `dup`
    #[display("dup")]
    Dup,
    /// `swap`
    #[display("swap")]
    Swap,
    /// Unconditional jump.
    #[display("goto {_0}")]
    Goto(Label),
    /// Compares an `int` against zero and jumps.
    #[display("if{_0} {_1}")]
    If(Condition, Label),
    /// Compares two `int`s and jumps.
    #[display("if_icmp{_0} {_1}")]
    IfICmp(Condition, Label),
    /// Jumps if the reference is `null`.
    #[display("ifnull {_0}")]
    IfNull(Label),
    /// Jumps if the reference is not `null`.
    #[display("ifnonnull {_0}")]
    IfNonNull(Label),
    /// Jumps according to a key.
    #[display(
        "lookupswitch {{{}}} default {default}",
        branches.iter().map(|(key, label)| format!("{key}: {label}")).join(", ")
    )]
    LookupSwitch {
        /// The target when no key matches.
        default: Label,
        /// The keys and their targets.
        branches: Vec<(i32, Label)>,
    },
    /// Allocates an object.
    #[display("new {_0}")]
    New(ClassRef),
    /// Checks the type of a reference.
    #[display("checkcast {_0}")]
    CheckCast(ClassRef),
    /// Reads an instance field.
    #[display("getfield {_0}")]
    GetField(FieldRef),
    /// Writes an instance field.
    #[display("putfield {_0}")]
    PutField(FieldRef),
    /// Reads a static field.
    #[display("getstatic {_0}")]
    GetStatic(FieldRef),
    /// Writes a static field.
    #[display("putstatic {_0}")]
    PutStatic(FieldRef),
    /// Invokes a method.
    #[display("invoke{_0} {_1}")]
    Invoke(InvokeKind, MethodRef),
    /// Returns from the method, with a value of the given kind or `void`.
    #[display("{}return", _0.map(ValueKind::prefix).unwrap_or_default())]
    Return(Option<ValueKind>),
    /// Throws the reference on top of the stack.
    #[display("athrow")]
    AThrow,
}

impl Instruction {
    /// Returns the opcode of the instruction, or [`None`] if it is a pseudo instruction.
    #[must_use]
    pub fn opcode(&self) -> Option<u8> {
        let opcode = match self {
            Self::Label(_) | Self::LineNumber(_) | Self::Frame => return None,
            Self::Nop => 0x00,
            Self::Ldc(_) => 0x12,
            Self::Load(kind, _) => 0x15 + kind.opcode_offset(),
            Self::Store(kind, _) => 0x36 + kind.opcode_offset(),
            Self::IInc(..) => 0x84,
            Self::Math(kind, op) => {
                let base = match op {
                    MathOp::Add => 0x60,
                    MathOp::Sub => 0x64,
                    MathOp::Mul => 0x68,
                    MathOp::Div => 0x6c,
                    MathOp::Rem => 0x70,
                    MathOp::Neg => 0x74,
                };
                base + kind.opcode_offset()
            }
            Self::Pop => 0x57,
            Self::Pop2 => 0x58,
            Self::Dup => 0x59,
            Self::Swap => 0x5f,
            Self::If(cond, _) => 0x99 + cond.opcode_offset(),
            Self::IfICmp(cond, _) => 0x9f + cond.opcode_offset(),
            Self::Goto(_) => 0xa7,
            Self::LookupSwitch { .. } => 0xab,
            Self::Return(Some(kind)) => 0xac + kind.opcode_offset(),
            Self::Return(None) => 0xb1,
            Self::GetStatic(_) => 0xb2,
            Self::PutStatic(_) => 0xb3,
            Self::GetField(_) => 0xb4,
            Self::PutField(_) => 0xb5,
            Self::Invoke(InvokeKind::Virtual, _) => 0xb6,
            Self::Invoke(InvokeKind::Special, _) => 0xb7,
            Self::Invoke(InvokeKind::Static, _) => 0xb8,
            Self::Invoke(InvokeKind::Interface, _) => 0xb9,
            Self::New(_) => 0xbb,
            Self::AThrow => 0xbf,
            Self::CheckCast(_) => 0xc0,
            Self::IfNull(_) => 0xc6,
            Self::IfNonNull(_) => 0xc7,
        };
        Some(opcode)
    }

    /// Checks if the instruction is a zero-width marker without an opcode.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.opcode().is_none()
    }

    /// Checks if the instruction returns from the method.
    #[must_use]
    pub const fn is_return(&self) -> bool {
        matches!(self, Self::Return(_))
    }

    /// Returns the invocation kind and the invoked method if this is an invocation.
    #[must_use]
    pub const fn as_invoke(&self) -> Option<(InvokeKind, &MethodRef)> {
        match self {
            Self::Invoke(kind, method) => Some((*kind, method)),
            _ => None,
        }
    }

    /// Returns the accessed field if this is a field access.
    #[must_use]
    pub const fn as_field_access(&self) -> Option<&FieldRef> {
        match self {
            Self::GetField(field)
            | Self::PutField(field)
            | Self::GetStatic(field)
            | Self::PutStatic(field) => Some(field),
            _ => None,
        }
    }

    /// Returns the label defined by this instruction, if any.
    #[must_use]
    pub const fn defined_label(&self) -> Option<Label> {
        match self {
            Self::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// Returns the labels this instruction may jump to.
    #[must_use]
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Self::Goto(target)
            | Self::If(_, target)
            | Self::IfICmp(_, target)
            | Self::IfNull(target)
            | Self::IfNonNull(target) => vec![*target],
            Self::LookupSwitch { default, branches } => std::iter::once(*default)
                .chain(branches.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every label defined or referenced by this instruction.
    pub fn map_labels<F>(&mut self, mut f: F)
    where
        F: FnMut(Label) -> Label,
    {
        match self {
            Self::Label(target)
            | Self::Goto(target)
            | Self::If(_, target)
            | Self::IfICmp(_, target)
            | Self::IfNull(target)
            | Self::IfNonNull(target) => *target = f(*target),
            Self::LookupSwitch { default, branches } => {
                *default = f(*default);
                for (_, label) in branches.iter_mut() {
                    *label = f(*label);
                }
            }
            _ => {}
        }
    }
}
