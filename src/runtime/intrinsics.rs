//! Library methods implemented natively by the interpreter.
use crate::{
    jvm::{Method, references::MethodRef},
    mixin::callback::{CALLBACK_INFO, CALLBACK_INFO_RETURNABLE},
    types::field_type::PrimitiveType,
};

use super::{CallbackState, CancellationError, ExecutionError, HeapObject, Value, Vm};

const PRIMITIVES: [PrimitiveType; 8] = [
    PrimitiveType::Boolean,
    PrimitiveType::Char,
    PrimitiveType::Float,
    PrimitiveType::Double,
    PrimitiveType::Byte,
    PrimitiveType::Short,
    PrimitiveType::Int,
    PrimitiveType::Long,
];

type Outcome = Result<Option<Value>, ExecutionError>;

/// Checks if instances of the class are created natively.
pub(super) fn is_native_class(binary_name: &str) -> bool {
    binary_name == CALLBACK_INFO || binary_name == CALLBACK_INFO_RETURNABLE
}

impl Vm {
    /// Runs `method` natively if it is a library method the interpreter implements.
    /// `args` starts with the receiver for instance methods.
    pub(super) fn intrinsic(&mut self, method: &MethodRef, args: &[Value]) -> Option<Outcome> {
        let owner = method.owner.binary_name.as_str();
        if owner == CALLBACK_INFO || owner == CALLBACK_INFO_RETURNABLE {
            return Some(self.callback_method(method, args));
        }
        if owner == "java/lang/Object" && method.name == Method::CONSTRUCTOR_NAME {
            return Some(Ok(None));
        }
        let primitive = PRIMITIVES.into_iter().find(|it| it.wrapper_class() == owner)?;
        if method.name == "valueOf" {
            let value = *args.first()?;
            let boxed = self.heap.allocate(HeapObject::Boxed(primitive, value));
            return Some(Ok(Some(Value::Ref(boxed))));
        }
        if method.name == format!("{primitive}Value") {
            return Some(self.unbox(args.first().copied(), primitive).map(Some));
        }
        None
    }

    fn unbox(
        &self,
        value: Option<Value>,
        primitive: PrimitiveType,
    ) -> Result<Value, ExecutionError> {
        match value {
            Some(Value::Ref(id)) => match self.heap.get(id) {
                Some(HeapObject::Boxed(found, value)) if *found == primitive => Ok(*value),
                _ => Err(ExecutionError::TypeMismatch {
                    expected: "a boxed primitive",
                    found: Value::Ref(id),
                }),
            },
            Some(Value::Null) | None => Err(ExecutionError::NullPointer(format!(
                "{}Value",
                primitive
            ))),
            Some(found) => Err(ExecutionError::TypeMismatch {
                expected: "a reference",
                found,
            }),
        }
    }

    fn callback_state(
        &mut self,
        receiver: Option<&Value>,
    ) -> Result<&mut CallbackState, ExecutionError> {
        let id = match receiver {
            Some(Value::Ref(id)) => *id,
            _ => return Err(ExecutionError::NullPointer("a callback method".to_owned())),
        };
        match self.heap.get_mut(id) {
            Some(HeapObject::Callback(state)) => Ok(state),
            _ => Err(ExecutionError::TypeMismatch {
                expected: "a callback carrier",
                found: Value::Ref(id),
            }),
        }
    }

    fn callback_method(&mut self, method: &MethodRef, args: &[Value]) -> Outcome {
        let receiver = args.first();
        match method.name.as_str() {
            Method::CONSTRUCTOR_NAME => {
                let name = args
                    .get(1)
                    .and_then(|it| self.string(*it))
                    .map(str::to_owned)
                    .unwrap_or_default();
                let cancellable = args.get(2).and_then(Value::as_int).is_some_and(|it| it != 0);
                let return_value = args.get(3).copied();
                let state = self.callback_state(receiver)?;
                state.name = name;
                state.cancellable = cancellable;
                state.return_value = return_value;
                Ok(None)
            }
            "isCancelled" => {
                let state = self.callback_state(receiver)?;
                Ok(Some(Value::Int(i32::from(state.cancelled))))
            }
            "isCancellable" => {
                let state = self.callback_state(receiver)?;
                Ok(Some(Value::Int(i32::from(state.cancellable))))
            }
            "getId" => {
                let name = self.callback_state(receiver)?.name.clone();
                Ok(Some(self.new_string(name)))
            }
            "cancel" => {
                let state = self.callback_state(receiver)?;
                if !state.cancellable {
                    return Err(CancellationError::NotCancellable {
                        name: state.name.clone(),
                    }
                    .into());
                }
                state.cancelled = true;
                Ok(None)
            }
            "setReturnValue" => {
                let value = args.get(1).copied().unwrap_or(Value::Null);
                let state = self.callback_state(receiver)?;
                if !state.cancellable {
                    return Err(CancellationError::NotCancellable {
                        name: state.name.clone(),
                    }
                    .into());
                }
                state.cancelled = true;
                state.return_value = Some(value);
                Ok(None)
            }
            "getReturnValue" => {
                let state = self.callback_state(receiver)?;
                state
                    .return_value
                    .map(Some)
                    .ok_or_else(|| {
                        CancellationError::MissingReturnValue {
                            name: state.name.clone(),
                        }
                        .into()
                    })
            }
            name => {
                let primitive = name
                    .strip_prefix("getReturnValue")
                    .and_then(|it| it.chars().next())
                    .and_then(|it| PrimitiveType::try_from(it).ok())
                    .ok_or_else(|| ExecutionError::NoSuchMethod(method.to_string()))?;
                self.typed_return_value(receiver, primitive).map(Some)
            }
        }
    }

    fn typed_return_value(
        &mut self,
        receiver: Option<&Value>,
        expected: PrimitiveType,
    ) -> Result<Value, ExecutionError> {
        let state = self.callback_state(receiver)?;
        let name = state.name.clone();
        let value = state
            .return_value
            .ok_or_else(|| CancellationError::MissingReturnValue { name: name.clone() })?;
        let mismatch = |found: String| CancellationError::ReturnTypeMismatch {
            name: name.clone(),
            expected,
            found,
        };
        match value {
            Value::Ref(id) => match self.heap.get(id) {
                Some(HeapObject::Boxed(found, value)) if *found == expected => Ok(*value),
                Some(object) => Err(mismatch(object.class_name().to_owned()).into()),
                None => Err(mismatch(value.to_string()).into()),
            },
            Value::Null => Err(mismatch("null".to_owned()).into()),
            other => Err(mismatch(other.to_string()).into()),
        }
    }
}
