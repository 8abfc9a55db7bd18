use super::{InstructionList, ValueKind};

/// The body of a method.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    /// The maximum number of values on the operand stack of the method.
    pub max_stack: u16,
    /// The maximum number of local variables in the method.
    pub max_locals: u16,
    /// The executable instructions.
    pub instructions: InstructionList,
}

impl MethodBody {
    /// Creates a body from its instructions and frame sizes.
    #[must_use]
    pub fn new(instructions: InstructionList, max_stack: u16, max_locals: u16) -> Self {
        Self {
            max_stack,
            max_locals,
            instructions,
        }
    }

    /// Reserves a fresh local variable slot above every slot in use and returns its index.
    pub fn allocate_local(&mut self, kind: ValueKind) -> u16 {
        let index = self.max_locals;
        self.max_locals += kind.slot_size();
        index
    }

    /// Raises `max_stack` so that `extra` more values fit on top of the deepest stack.
    pub fn grow_stack(&mut self, extra: u16) {
        self.max_stack = self.max_stack.saturating_add(extra);
    }
}
