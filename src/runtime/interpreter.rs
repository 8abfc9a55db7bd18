use std::collections::HashMap;

use crate::{
    jvm::{
        Class, Method,
        code::{
            ConstantValue, InsnId, Instruction, InvokeKind, Label, MathOp, MethodBody, ValueKind,
        },
        references::{ClassRef, FieldRef, MethodRef},
    },
    mixin::callback::CALLBACK_INFO_RETURNABLE,
    types::{
        field_type::{FieldType, PrimitiveType},
        method_descriptor::{MethodDescriptor, ReturnType},
    },
};

use super::{
    CallbackState, ExecutionError, HeapObject, ObjectId, Value,
    frame::Frame,
    heap::Heap,
    intrinsics::is_native_class,
};

/// The maximum number of nested calls.
pub const MAX_CALL_DEPTH: usize = 256;

/// An interpreter holding loaded classes, a heap and static fields.
#[derive(Debug, Clone, Default)]
pub struct Vm {
    classes: HashMap<String, Class>,
    pub(super) heap: Heap,
    statics: HashMap<(String, String), Value>,
    depth: usize,
}

fn default_value(field_type: &FieldType) -> Value {
    match field_type {
        FieldType::Base(PrimitiveType::Long) => Value::Long(0),
        FieldType::Base(PrimitiveType::Float) => Value::Float(0.0),
        FieldType::Base(PrimitiveType::Double) => Value::Double(0.0),
        FieldType::Base(_) => Value::Int(0),
        FieldType::Object(_) | FieldType::Array(_) => Value::Null,
    }
}

const fn kind_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Int => "int",
        ValueKind::Long => "long",
        ValueKind::Float => "float",
        ValueKind::Double => "double",
        ValueKind::Reference => "reference",
    }
}

fn kind_matches(kind: ValueKind, value: Value) -> bool {
    matches!(
        (kind, value),
        (ValueKind::Int, Value::Int(_))
            | (ValueKind::Long, Value::Long(_))
            | (ValueKind::Float, Value::Float(_))
            | (ValueKind::Double, Value::Double(_))
            | (ValueKind::Reference, Value::Null | Value::Ref(_))
    )
}

fn expect_kind(kind: ValueKind, value: Value) -> Result<Value, ExecutionError> {
    if kind_matches(kind, value) {
        Ok(value)
    } else {
        Err(ExecutionError::TypeMismatch {
            expected: kind_name(kind),
            found: value,
        })
    }
}

fn math(kind: ValueKind, op: MathOp, lhs: Value, rhs: Value) -> Result<Value, ExecutionError> {
    let mismatch = |found| ExecutionError::TypeMismatch {
        expected: kind_name(kind),
        found,
    };
    let value = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) if kind == ValueKind::Int => Value::Int(match op {
            MathOp::Add => a.wrapping_add(b),
            MathOp::Sub => a.wrapping_sub(b),
            MathOp::Mul => a.wrapping_mul(b),
            MathOp::Div => a.checked_div(b).ok_or(ExecutionError::DivisionByZero)?,
            MathOp::Rem => a.checked_rem(b).ok_or(ExecutionError::DivisionByZero)?,
            MathOp::Neg => b.wrapping_neg(),
        }),
        (Value::Long(a), Value::Long(b)) if kind == ValueKind::Long => Value::Long(match op {
            MathOp::Add => a.wrapping_add(b),
            MathOp::Sub => a.wrapping_sub(b),
            MathOp::Mul => a.wrapping_mul(b),
            MathOp::Div => a.checked_div(b).ok_or(ExecutionError::DivisionByZero)?,
            MathOp::Rem => a.checked_rem(b).ok_or(ExecutionError::DivisionByZero)?,
            MathOp::Neg => b.wrapping_neg(),
        }),
        (Value::Float(a), Value::Float(b)) if kind == ValueKind::Float => Value::Float(match op {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div => a / b,
            MathOp::Rem => a % b,
            MathOp::Neg => -b,
        }),
        (Value::Double(a), Value::Double(b)) if kind == ValueKind::Double => {
            Value::Double(match op {
                MathOp::Add => a + b,
                MathOp::Sub => a - b,
                MathOp::Mul => a * b,
                MathOp::Div => a / b,
                MathOp::Rem => a % b,
                MathOp::Neg => -b,
            })
        }
        (Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_), other) => {
            return Err(mismatch(other));
        }
        (other, _) => return Err(mismatch(other)),
    };
    Ok(value)
}

enum Flow {
    Next,
    Jump(Label),
    Return(Option<Value>),
}

impl Vm {
    /// Creates an interpreter without classes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a class, replacing any loaded class of the same name.
    pub fn load(&mut self, class: Class) {
        self.classes.insert(class.binary_name.clone(), class);
    }

    /// Returns a loaded class.
    #[must_use]
    pub fn class(&self, binary_name: &str) -> Option<&Class> {
        self.classes.get(binary_name)
    }

    /// Returns a heap object.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&HeapObject> {
        self.heap.get(id)
    }

    /// Allocates a `java/lang/String`.
    pub fn new_string(&mut self, value: impl Into<String>) -> Value {
        Value::Ref(self.heap.allocate(HeapObject::String(value.into())))
    }

    /// Returns the contents of a string reference.
    #[must_use]
    pub fn string(&self, value: Value) -> Option<&str> {
        match self.heap.get(value.as_object()?)? {
            HeapObject::String(it) => Some(it),
            _ => None,
        }
    }

    /// Returns the state of a callback carrier.
    #[must_use]
    pub fn callback(&self, value: Value) -> Option<&CallbackState> {
        match self.heap.get(value.as_object()?)? {
            HeapObject::Callback(it) => Some(it),
            _ => None,
        }
    }

    /// Allocates an instance of a class without running a constructor.
    /// Every field declared along the loaded superclass chain starts at its default value.
    pub fn new_instance(&mut self, binary_name: &str) -> Value {
        let object = if is_native_class(binary_name) {
            HeapObject::Callback(CallbackState {
                returnable: binary_name == CALLBACK_INFO_RETURNABLE,
                ..CallbackState::default()
            })
        } else {
            let mut fields = HashMap::new();
            let mut current = self.classes.get(binary_name);
            while let Some(class) = current {
                for field in class.fields.iter().filter(|it| !it.is_static()) {
                    fields
                        .entry(field.name.clone())
                        .or_insert_with(|| default_value(&field.field_type));
                }
                current = class
                    .super_class
                    .as_ref()
                    .and_then(|it| self.classes.get(&it.binary_name));
            }
            HeapObject::Instance {
                class: binary_name.to_owned(),
                fields,
            }
        };
        Value::Ref(self.heap.allocate(object))
    }

    /// Reads an instance field.
    /// # Errors
    /// - [`ExecutionError::NullPointer`] if `object` is not a reference.
    /// - [`ExecutionError::NoSuchField`] if the object has no such field.
    pub fn field(&self, object: Value, name: &str) -> Result<Value, ExecutionError> {
        let id = object
            .as_object()
            .ok_or_else(|| ExecutionError::NullPointer(format!("getfield {name}")))?;
        match self.heap.get(id) {
            Some(HeapObject::Instance { fields, .. }) => fields
                .get(name)
                .copied()
                .ok_or_else(|| ExecutionError::NoSuchField(name.to_owned())),
            _ => Err(ExecutionError::NoSuchField(name.to_owned())),
        }
    }

    /// Reads a static field, [`None`] if it was never written.
    #[must_use]
    pub fn static_field(&self, owner: &str, name: &str) -> Option<Value> {
        self.statics
            .get(&(owner.to_owned(), name.to_owned()))
            .copied()
    }

    /// Invokes a loaded method. `args` starts with the receiver for instance methods.
    /// Returns the return value, or [`None`] for `void` methods.
    /// # Errors
    /// See [`ExecutionError`].
    pub fn invoke(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutionError> {
        let descriptor: MethodDescriptor = descriptor.parse()?;
        let method = MethodRef {
            owner: ClassRef::new(owner),
            name: name.to_owned(),
            descriptor,
        };
        self.call(&method, args, None)
    }

    fn find_method(&self, owner: &str, method: &MethodRef) -> Option<&Method> {
        let mut current = self.classes.get(owner);
        while let Some(class) = current {
            if let Some(found) = class.get_method(&method.name, &method.descriptor) {
                return Some(found);
            }
            current = class
                .super_class
                .as_ref()
                .and_then(|it| self.classes.get(&it.binary_name));
        }
        None
    }

    fn runtime_class(
        &self,
        receiver: Option<&Value>,
        method: &MethodRef,
    ) -> Result<String, ExecutionError> {
        match receiver {
            Some(Value::Ref(id)) => self
                .heap
                .get(*id)
                .map(|it| it.class_name().to_owned())
                .ok_or_else(|| ExecutionError::NullPointer(method.to_string())),
            _ => Err(ExecutionError::NullPointer(method.to_string())),
        }
    }

    /// Calls `method`. With `dispatch`, the implementation is looked up from the runtime
    /// class of the receiver.
    fn call(
        &mut self,
        method: &MethodRef,
        args: &[Value],
        dispatch: Option<InvokeKind>,
    ) -> Result<Option<Value>, ExecutionError> {
        if let Some(outcome) = self.intrinsic(method, args) {
            return outcome;
        }
        let owner = match dispatch {
            Some(InvokeKind::Virtual | InvokeKind::Interface) => {
                self.runtime_class(args.first(), method)?
            }
            _ => method.owner.binary_name.clone(),
        };
        let resolved = self
            .find_method(&owner, method)
            .ok_or_else(|| ExecutionError::NoSuchMethod(method.to_string()))?
            .clone();
        let body = resolved
            .body
            .as_ref()
            .ok_or_else(|| ExecutionError::AbstractMethod(resolved.make_ref().to_string()))?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ExecutionError::CallDepthExceeded);
        }
        self.depth += 1;
        log::trace!("Entering {}", resolved.make_ref());
        let result = self.execute(&resolved, body, args);
        self.depth -= 1;
        result
    }

    fn execute(
        &mut self,
        method: &Method,
        body: &MethodBody,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutionError> {
        let code = &body.instructions;
        let labels: HashMap<Label, InsnId> = code
            .iter()
            .filter_map(|(id, insn)| insn.defined_label().map(|label| (label, id)))
            .collect();
        let mut frame = Frame::new(method, body, args)?;
        let mut cursor = code.first();
        while let Some(id) = cursor {
            let Some(insn) = code.get(id) else {
                break;
            };
            match self.step(insn, &mut frame)? {
                Flow::Next => cursor = code.next_of(id),
                Flow::Jump(label) => {
                    cursor = Some(
                        *labels
                            .get(&label)
                            .ok_or(ExecutionError::UndefinedLabel(label))?,
                    );
                }
                Flow::Return(value) => return Ok(value),
            }
        }
        Err(ExecutionError::FellOffEnd(method.make_ref().to_string()))
    }

    fn pop_object(
        frame: &mut Frame,
        context: &dyn std::fmt::Display,
    ) -> Result<ObjectId, ExecutionError> {
        match frame.pop()? {
            Value::Ref(id) => Ok(id),
            Value::Null => Err(ExecutionError::NullPointer(context.to_string())),
            found => Err(ExecutionError::TypeMismatch {
                expected: "reference",
                found,
            }),
        }
    }

    fn static_key(field: &FieldRef) -> (String, String) {
        (field.owner.binary_name.clone(), field.name.clone())
    }

    fn step(&mut self, insn: &Instruction, frame: &mut Frame) -> Result<Flow, ExecutionError> {
        match insn {
            Instruction::Label(_)
            | Instruction::LineNumber(_)
            | Instruction::Frame
            | Instruction::Nop => {}
            Instruction::Ldc(constant) => {
                let value = match constant {
                    ConstantValue::Integer(it) => Value::Int(*it),
                    ConstantValue::Long(it) => Value::Long(*it),
                    ConstantValue::Float(it) => Value::Float(*it),
                    ConstantValue::Double(it) => Value::Double(*it),
                    ConstantValue::String(it) => self.new_string(it.clone()),
                    ConstantValue::Null => Value::Null,
                };
                frame.push(value)?;
            }
            Instruction::Load(kind, index) => {
                let value = expect_kind(*kind, frame.get_local(*index)?)?;
                frame.push(value)?;
            }
            Instruction::Store(kind, index) => {
                let value = expect_kind(*kind, frame.pop()?)?;
                frame.set_local(*index, value)?;
            }
            Instruction::IInc(index, delta) => {
                let value = expect_kind(ValueKind::Int, frame.get_local(*index)?)?;
                if let Value::Int(it) = value {
                    frame.set_local(*index, Value::Int(it.wrapping_add(i32::from(*delta))))?;
                }
            }
            Instruction::Math(kind, op) => {
                let rhs = frame.pop()?;
                let lhs = if *op == MathOp::Neg { rhs } else { frame.pop()? };
                frame.push(math(*kind, *op, lhs, rhs)?)?;
            }
            Instruction::Pop => {
                frame.pop()?;
            }
            Instruction::Pop2 => {
                if !frame.pop()?.is_wide() {
                    frame.pop()?;
                }
            }
            Instruction::Dup => {
                let value = frame.peek()?;
                frame.push(value)?;
            }
            Instruction::Swap => {
                let top = frame.pop()?;
                let below = frame.pop()?;
                frame.push(top)?;
                frame.push(below)?;
            }
            Instruction::Goto(label) => return Ok(Flow::Jump(*label)),
            Instruction::If(condition, label) => {
                if condition.holds(frame.pop_int()?, 0) {
                    return Ok(Flow::Jump(*label));
                }
            }
            Instruction::IfICmp(condition, label) => {
                let rhs = frame.pop_int()?;
                let lhs = frame.pop_int()?;
                if condition.holds(lhs, rhs) {
                    return Ok(Flow::Jump(*label));
                }
            }
            Instruction::IfNull(label) => {
                if frame.pop()? == Value::Null {
                    return Ok(Flow::Jump(*label));
                }
            }
            Instruction::IfNonNull(label) => {
                if frame.pop()? != Value::Null {
                    return Ok(Flow::Jump(*label));
                }
            }
            Instruction::LookupSwitch { default, branches } => {
                let key = frame.pop_int()?;
                let target = branches
                    .iter()
                    .find(|(it, _)| *it == key)
                    .map_or(*default, |(_, label)| *label);
                return Ok(Flow::Jump(target));
            }
            Instruction::New(class) => {
                let value = self.new_instance(&class.binary_name);
                frame.push(value)?;
            }
            Instruction::CheckCast(_) => {
                let value = frame.peek()?;
                expect_kind(ValueKind::Reference, value)?;
            }
            Instruction::GetField(field) => {
                let id = Self::pop_object(frame, insn)?;
                let value = match self.heap.get(id) {
                    Some(HeapObject::Instance { fields, .. }) => fields
                        .get(&field.name)
                        .copied()
                        .unwrap_or_else(|| default_value(&field.field_type)),
                    _ => return Err(ExecutionError::NoSuchField(field.to_string())),
                };
                frame.push(value)?;
            }
            Instruction::PutField(field) => {
                let value = frame.pop()?;
                let id = Self::pop_object(frame, insn)?;
                match self.heap.get_mut(id) {
                    Some(HeapObject::Instance { fields, .. }) => {
                        fields.insert(field.name.clone(), value);
                    }
                    _ => return Err(ExecutionError::NoSuchField(field.to_string())),
                }
            }
            Instruction::GetStatic(field) => {
                let value = self
                    .statics
                    .get(&Self::static_key(field))
                    .copied()
                    .unwrap_or_else(|| default_value(&field.field_type));
                frame.push(value)?;
            }
            Instruction::PutStatic(field) => {
                let value = frame.pop()?;
                self.statics.insert(Self::static_key(field), value);
            }
            Instruction::Invoke(kind, method) => {
                let count =
                    method.descriptor.parameters_types.len() + usize::from(kind.has_receiver());
                let args = frame.pop_n(count)?;
                if kind.has_receiver() && args.first() == Some(&Value::Null) {
                    return Err(ExecutionError::NullPointer(insn.to_string()));
                }
                let dispatch = matches!(kind, InvokeKind::Virtual | InvokeKind::Interface)
                    .then_some(*kind);
                let result = self.call(method, &args, dispatch)?;
                match (&method.descriptor.return_type, result) {
                    (ReturnType::Void, _) => {}
                    (ReturnType::Some(_), Some(value)) => frame.push(value)?,
                    (ReturnType::Some(_), None) => {
                        return Err(ExecutionError::TypeMismatch {
                            expected: "a return value",
                            found: Value::Top,
                        });
                    }
                }
            }
            Instruction::Return(kind) => {
                let value = kind
                    .map(|kind| frame.pop().and_then(|it| expect_kind(kind, it)))
                    .transpose()?;
                return Ok(Flow::Return(value));
            }
            Instruction::AThrow => {
                let id = Self::pop_object(frame, insn)?;
                let class = self
                    .heap
                    .get(id)
                    .map(|it| it.class_name().to_owned())
                    .unwrap_or_default();
                return Err(ExecutionError::Thrown(class));
            }
        }
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::{
        class::ClassAccessFlags,
        code::{Condition, InstructionList},
        method::MethodAccessFlags,
    };

    fn class_with(
        name: &str,
        descriptor: &str,
        code: InstructionList,
        max_stack: u16,
        max_locals: u16,
    ) -> Class {
        let mut class = Class::new("org/example/Calc", ClassAccessFlags::PUBLIC);
        class
            .add_method(Method {
                access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                name: name.to_owned(),
                descriptor: descriptor.parse().unwrap(),
                owner: ClassRef::new("org/example/Calc"),
                body: Some(MethodBody::new(code, max_stack, max_locals)),
                annotations: Vec::new(),
            })
            .unwrap();
        class
    }

    #[test]
    fn loops_and_arithmetic() {
        // sum of 1..=n
        let code = InstructionList::from([
            Instruction::Ldc(ConstantValue::Integer(0)),
            Instruction::Store(ValueKind::Int, 1),
            Instruction::Label(Label::from(0)),
            Instruction::Load(ValueKind::Int, 0),
            Instruction::If(Condition::Le, Label::from(1)),
            Instruction::Load(ValueKind::Int, 1),
            Instruction::Load(ValueKind::Int, 0),
            Instruction::Math(ValueKind::Int, MathOp::Add),
            Instruction::Store(ValueKind::Int, 1),
            Instruction::IInc(0, -1),
            Instruction::Goto(Label::from(0)),
            Instruction::Label(Label::from(1)),
            Instruction::Load(ValueKind::Int, 1),
            Instruction::Return(Some(ValueKind::Int)),
        ]);
        let mut vm = Vm::new();
        vm.load(class_with("sum", "(I)I", code, 2, 2));
        assert_eq!(
            vm.invoke("org/example/Calc", "sum", "(I)I", &[Value::Int(4)]),
            Ok(Some(Value::Int(10)))
        );
    }

    #[test]
    fn division_by_zero() {
        let code = InstructionList::from([
            Instruction::Load(ValueKind::Int, 0),
            Instruction::Ldc(ConstantValue::Integer(0)),
            Instruction::Math(ValueKind::Int, MathOp::Div),
            Instruction::Return(Some(ValueKind::Int)),
        ]);
        let mut vm = Vm::new();
        vm.load(class_with("div", "(I)I", code, 2, 1));
        assert_eq!(
            vm.invoke("org/example/Calc", "div", "(I)I", &[Value::Int(4)]),
            Err(ExecutionError::DivisionByZero)
        );
    }

    #[test]
    fn missing_methods_and_fall_through() {
        let mut vm = Vm::new();
        vm.load(class_with("empty", "()V", InstructionList::new(), 0, 0));
        assert!(matches!(
            vm.invoke("org/example/Calc", "empty", "()V", &[]),
            Err(ExecutionError::FellOffEnd(_))
        ));
        assert!(matches!(
            vm.invoke("org/example/Calc", "absent", "()V", &[]),
            Err(ExecutionError::NoSuchMethod(_))
        ));
    }

    #[test]
    fn boxing_round_trips() {
        let code = InstructionList::from([
            Instruction::Load(ValueKind::Long, 0),
            Instruction::Invoke(
                InvokeKind::Static,
                MethodRef {
                    owner: ClassRef::new("java/lang/Long"),
                    name: "valueOf".to_owned(),
                    descriptor: "(J)Ljava/lang/Long;".parse().unwrap(),
                },
            ),
            Instruction::Invoke(
                InvokeKind::Virtual,
                MethodRef {
                    owner: ClassRef::new("java/lang/Long"),
                    name: "longValue".to_owned(),
                    descriptor: "()J".parse().unwrap(),
                },
            ),
            Instruction::Return(Some(ValueKind::Long)),
        ]);
        let mut vm = Vm::new();
        vm.load(class_with("roundTrip", "(J)J", code, 1, 2));
        assert_eq!(
            vm.invoke("org/example/Calc", "roundTrip", "(J)J", &[Value::Long(-5)]),
            Ok(Some(Value::Long(-5)))
        );
    }
}
