use crate::jvm::{Method, code::MethodBody};

use super::{ExecutionError, Value};

/// The locals and the operand stack of one method activation.
///
/// A `long` or `double` takes two local slots, the upper one holding [`Value::Top`], but a
/// single operand stack entry.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Frame {
    max_stack: u16,
    local_variables: Vec<Value>,
    operand_stack: Vec<Value>,
}

impl Frame {
    /// Creates the frame of a call to `method` with the given receiver and arguments.
    pub fn new(method: &Method, body: &MethodBody, args: &[Value]) -> Result<Self, ExecutionError> {
        let size = body.max_locals.max(method.argument_slots());
        let mut frame = Self {
            max_stack: body.max_stack,
            local_variables: vec![Value::Top; usize::from(size)],
            operand_stack: Vec::with_capacity(usize::from(body.max_stack)),
        };
        let mut index = 0;
        for arg in args {
            frame.set_local(index, *arg)?;
            index += if arg.is_wide() { 2 } else { 1 };
        }
        Ok(frame)
    }

    pub fn push(&mut self, value: Value) -> Result<(), ExecutionError> {
        if self.operand_stack.len() >= usize::from(self.max_stack) {
            return Err(ExecutionError::StackOverflow);
        }
        self.operand_stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, ExecutionError> {
        self.operand_stack
            .pop()
            .ok_or(ExecutionError::StackUnderflow)
    }

    /// Pops `count` values and returns them in the order they were pushed.
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, ExecutionError> {
        let start = self
            .operand_stack
            .len()
            .checked_sub(count)
            .ok_or(ExecutionError::StackUnderflow)?;
        Ok(self.operand_stack.split_off(start))
    }

    pub fn pop_int(&mut self) -> Result<i32, ExecutionError> {
        match self.pop()? {
            Value::Int(it) => Ok(it),
            found => Err(ExecutionError::TypeMismatch {
                expected: "int",
                found,
            }),
        }
    }

    pub fn peek(&self) -> Result<Value, ExecutionError> {
        self.operand_stack
            .last()
            .copied()
            .ok_or(ExecutionError::StackUnderflow)
    }

    pub fn get_local(&self, index: u16) -> Result<Value, ExecutionError> {
        self.local_variables
            .get(usize::from(index))
            .copied()
            .ok_or(ExecutionError::LocalOutOfRange(index))
    }

    pub fn set_local(&mut self, index: u16, value: Value) -> Result<(), ExecutionError> {
        let slots = if value.is_wide() { 2 } else { 1 };
        let end = usize::from(index) + slots;
        if end > self.local_variables.len() {
            return Err(ExecutionError::LocalOutOfRange(index));
        }
        self.local_variables[usize::from(index)] = value;
        if value.is_wide() {
            self.local_variables[usize::from(index) + 1] = Value::Top;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::{code::InstructionList, method::MethodAccessFlags, references::ClassRef};

    fn frame(max_stack: u16, max_locals: u16) -> Frame {
        let method = Method {
            access_flags: MethodAccessFlags::STATIC,
            name: "m".to_owned(),
            descriptor: "(JI)V".parse().unwrap(),
            owner: ClassRef::new("org/example/Target"),
            body: None,
            annotations: Vec::new(),
        };
        let body = MethodBody::new(InstructionList::new(), max_stack, max_locals);
        Frame::new(&method, &body, &[Value::Long(7), Value::Int(3)]).unwrap()
    }

    #[test]
    fn wide_arguments_take_two_slots() {
        let frame = frame(1, 3);
        assert_eq!(frame.get_local(0), Ok(Value::Long(7)));
        assert_eq!(frame.get_local(1), Ok(Value::Top));
        assert_eq!(frame.get_local(2), Ok(Value::Int(3)));
        assert_eq!(frame.get_local(3), Err(ExecutionError::LocalOutOfRange(3)));
    }

    #[test]
    fn stack_limits_are_enforced() {
        let mut frame = frame(1, 3);
        frame.push(Value::Int(1)).unwrap();
        assert_eq!(frame.push(Value::Int(2)), Err(ExecutionError::StackOverflow));
        assert_eq!(frame.pop_int(), Ok(1));
        assert_eq!(frame.pop(), Err(ExecutionError::StackUnderflow));
    }
}
