use std::collections::HashMap;

use crate::{
    mixin::callback::{CALLBACK_INFO, CALLBACK_INFO_RETURNABLE},
    types::field_type::PrimitiveType,
};

use super::Value;

/// The identity of a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("@{_0}")]
pub struct ObjectId(u32);

/// The state of a `CallbackInfo` or `CallbackInfoReturnable`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallbackState {
    /// The name of the target method.
    pub name: String,
    /// Whether this is a `CallbackInfoReturnable`.
    pub returnable: bool,
    /// Whether the handler may cancel the target.
    pub cancellable: bool,
    /// Whether the handler cancelled the target.
    pub cancelled: bool,
    /// The return value, boxed if primitive.
    pub return_value: Option<Value>,
}

/// An object on the heap.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    /// An instance of a loaded or unknown class.
    Instance {
        /// The binary name of the class.
        class: String,
        /// The values of the instance fields, by name.
        fields: HashMap<String, Value>,
    },
    /// A `java/lang/String`.
    String(String),
    /// A primitive wrapper such as `java/lang/Integer`.
    Boxed(PrimitiveType, Value),
    /// A callback carrier.
    Callback(CallbackState),
}

impl HeapObject {
    /// Returns the binary name of the class of the object.
    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            Self::Instance { class, .. } => class,
            Self::String(_) => "java/lang/String",
            Self::Boxed(primitive, _) => primitive.wrapper_class(),
            Self::Callback(state) if state.returnable => CALLBACK_INFO_RETURNABLE,
            Self::Callback(_) => CALLBACK_INFO,
        }
    }
}

/// The objects allocated by one [`Vm`](super::Vm). Objects are never freed.
#[derive(Debug, Clone, Default)]
pub(super) struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    pub fn allocate(&mut self, object: HeapObject) -> ObjectId {
        let id = ObjectId(u32::try_from(self.objects.len()).unwrap_or(u32::MAX));
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        self.objects.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        self.objects.get_mut(id.0 as usize)
    }
}
