//! A reference interpreter for transformed classes.
//!
//! The interpreter executes the instruction model directly. It knows the classes loaded into
//! it and implements a handful of library classes natively: `java/lang/Object`, the boxing
//! methods of the primitive wrappers and the callback carriers used by cancellable
//! injections.

use crate::{
    jvm::code::Label,
    types::{field_type::PrimitiveType, method_descriptor::InvalidDescriptor},
};

mod frame;
mod heap;
mod interpreter;
mod intrinsics;

pub use heap::{CallbackState, HeapObject, ObjectId};
pub use interpreter::Vm;

/// A value in a local variable or on the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display)]
pub enum Value {
    /// An `int`, also used for `boolean`, `byte`, `char` and `short`.
    #[display("{_0}")]
    Int(i32),
    /// A `long`.
    #[display("{_0}L")]
    Long(i64),
    /// A `float`.
    #[display("{_0}F")]
    Float(f32),
    /// A `double`.
    #[display("{_0}D")]
    Double(f64),
    /// The `null` reference.
    #[display("null")]
    Null,
    /// A reference to a heap object.
    #[display("{_0}")]
    Ref(ObjectId),
    /// An unset local variable, or the upper half of a `long` or `double`.
    #[display("top")]
    Top,
}

impl Value {
    /// Checks if the value takes two local variable slots.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    /// Returns the `int` held by the value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(it) => Some(*it),
            _ => None,
        }
    }

    /// Returns the heap object the value refers to.
    #[must_use]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(it) => Some(*it),
            _ => None,
        }
    }
}

/// An error raised by the callback carriers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancellationError {
    /// `cancel` or `setReturnValue` on a carrier that is not cancellable.
    #[error("The call {name} is not cancellable.")]
    NotCancellable {
        /// The name of the target method.
        name: String,
    },
    /// A return value is read from a carrier that holds none.
    #[error("The call {name} has no return value.")]
    MissingReturnValue {
        /// The name of the target method.
        name: String,
    },
    /// A typed getter is used on a return value of another type.
    #[error("The call {name} returns {found}, which is not a boxed {expected}.")]
    ReturnTypeMismatch {
        /// The name of the target method.
        name: String,
        /// The type of the getter.
        expected: PrimitiveType,
        /// A description of the held value.
        found: String,
    },
}

/// An error raised while executing a method.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// A callback carrier rejected an operation.
    #[error(transparent)]
    Cancellation(#[from] CancellationError),
    /// The invoked method is neither loaded nor native.
    #[error("No such method: {0}")]
    NoSuchMethod(String),
    /// The accessed field does not exist.
    #[error("No such field: {0}")]
    NoSuchField(String),
    /// The invoked method has no code.
    #[error("Method {0} has no code")]
    AbstractMethod(String),
    /// A `null` reference was dereferenced.
    #[error("Null pointer while executing {0}")]
    NullPointer(String),
    /// An instruction popped from an empty operand stack.
    #[error("Operand stack underflow")]
    StackUnderflow,
    /// An instruction pushed past `max_stack`.
    #[error("Operand stack overflow")]
    StackOverflow,
    /// A local variable index is not below `max_locals`.
    #[error("Local variable {0} is out of range")]
    LocalOutOfRange(u16),
    /// Calls nested deeper than the interpreter allows.
    #[error("Call depth exceeded")]
    CallDepthExceeded,
    /// A value does not have the kind an instruction needs.
    #[error("Type mismatch: expected {expected} but found {found}")]
    TypeMismatch {
        /// The expected kind.
        expected: &'static str,
        /// The value found.
        found: Value,
    },
    /// A jump targets a label that is not defined in the method.
    #[error("Undefined label {0}")]
    UndefinedLabel(Label),
    /// Execution ran past the last instruction.
    #[error("Execution fell off the end of {0}")]
    FellOffEnd(String),
    /// An exception was thrown and not caught.
    #[error("Uncaught exception of class {0}")]
    Thrown(String),
    /// An integer division or remainder by zero.
    #[error("Division by zero")]
    DivisionByZero,
    /// A descriptor passed to [`Vm::invoke`] is malformed.
    #[error(transparent)]
    InvalidDescriptor(#[from] InvalidDescriptor),
}
