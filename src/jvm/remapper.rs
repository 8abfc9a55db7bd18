use std::collections::HashMap;

use crate::types::{
    field_type::FieldType,
    method_descriptor::{MethodDescriptor, ReturnType},
};

use super::{
    code::Instruction,
    references::{ClassRef, FieldRef, MethodRef},
};

/// A table of class and member renames.
///
/// Member renames are keyed by the names used before remapping, so a member of a renamed class
/// is registered under the class's original name.
#[derive(Debug, Clone, Default)]
pub struct Remapper {
    classes: HashMap<String, String>,
    methods: HashMap<(String, String, String), String>,
    fields: HashMap<(String, String), String>,
}

impl Remapper {
    /// Creates an empty table that maps every name to itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class rename.
    pub fn rename_class(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.classes.insert(from.into(), to.into());
        self
    }

    /// Registers a method rename. `descriptor` is the descriptor before remapping.
    pub fn rename_method(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        to: impl Into<String>,
    ) -> &mut Self {
        self.methods
            .insert((owner.into(), name.into(), descriptor.into()), to.into());
        self
    }

    /// Registers a field rename.
    pub fn rename_field(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        to: impl Into<String>,
    ) -> &mut Self {
        self.fields.insert((owner.into(), name.into()), to.into());
        self
    }

    /// Maps a binary class name.
    #[must_use]
    pub fn map_class(&self, binary_name: &str) -> String {
        self.classes
            .get(binary_name)
            .cloned()
            .unwrap_or_else(|| binary_name.to_owned())
    }

    /// Maps a class reference.
    #[must_use]
    pub fn map_class_ref(&self, class: &ClassRef) -> ClassRef {
        ClassRef::new(self.map_class(&class.binary_name))
    }

    /// Maps every class mentioned in a field type.
    #[must_use]
    pub fn map_field_type(&self, field_type: &FieldType) -> FieldType {
        match field_type {
            FieldType::Base(it) => FieldType::Base(*it),
            FieldType::Object(class) => FieldType::Object(self.map_class_ref(class)),
            FieldType::Array(inner) => self.map_field_type(inner).into_array_type(),
        }
    }

    /// Maps every class mentioned in a method descriptor.
    #[must_use]
    pub fn map_descriptor(&self, descriptor: &MethodDescriptor) -> MethodDescriptor {
        MethodDescriptor {
            parameters_types: descriptor
                .parameters_types
                .iter()
                .map(|it| self.map_field_type(it))
                .collect(),
            return_type: match &descriptor.return_type {
                ReturnType::Some(it) => ReturnType::Some(self.map_field_type(it)),
                ReturnType::Void => ReturnType::Void,
            },
        }
    }

    /// Maps a method reference: its owner, its name and its descriptor.
    #[must_use]
    pub fn map_method_ref(&self, method: &MethodRef) -> MethodRef {
        let key = (
            method.owner.binary_name.clone(),
            method.name.clone(),
            method.descriptor.to_string(),
        );
        MethodRef {
            owner: self.map_class_ref(&method.owner),
            name: self
                .methods
                .get(&key)
                .cloned()
                .unwrap_or_else(|| method.name.clone()),
            descriptor: self.map_descriptor(&method.descriptor),
        }
    }

    /// Maps a field reference: its owner, its name and its type.
    #[must_use]
    pub fn map_field_ref(&self, field: &FieldRef) -> FieldRef {
        let key = (field.owner.binary_name.clone(), field.name.clone());
        FieldRef {
            owner: self.map_class_ref(&field.owner),
            name: self
                .fields
                .get(&key)
                .cloned()
                .unwrap_or_else(|| field.name.clone()),
            field_type: self.map_field_type(&field.field_type),
        }
    }

    /// Maps every symbolic reference of an instruction in place.
    pub fn map_instruction(&self, instruction: &mut Instruction) {
        match instruction {
            Instruction::New(class) | Instruction::CheckCast(class) => {
                *class = self.map_class_ref(class);
            }
            Instruction::GetField(field)
            | Instruction::PutField(field)
            | Instruction::GetStatic(field)
            | Instruction::PutStatic(field) => *field = self.map_field_ref(field),
            Instruction::Invoke(_, method) => *method = self.map_method_ref(method),
            _ => {}
        }
    }
}
