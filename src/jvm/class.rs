//! Module for the APIs for the class in JVM.
use bitflags::bitflags;

use crate::types::method_descriptor::MethodDescriptor;

use super::{
    Annotation, Class, Field, Method,
    code::{CodeError, Label},
    references::ClassRef,
};

impl Class {
    /// Creates a class with no members.
    #[must_use]
    pub fn new(binary_name: impl Into<String>, access_flags: ClassAccessFlags) -> Self {
        Self {
            binary_name: binary_name.into(),
            access_flags,
            super_class: Some(ClassRef::new("java/lang/Object")),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Creates a [`ClassRef`] referring to the class.
    #[must_use]
    pub fn make_ref(&self) -> ClassRef {
        ClassRef::new(self.binary_name.clone())
    }

    /// Gets a method of the class by its name and descriptor.
    #[must_use]
    pub fn get_method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name && &m.descriptor == descriptor)
    }

    /// Gets a method of the class by its name and descriptor, mutably.
    pub fn get_method_mut(
        &mut self,
        name: &str,
        descriptor: &MethodDescriptor,
    ) -> Option<&mut Method> {
        self.methods
            .iter_mut()
            .find(|m| m.name == name && &m.descriptor == descriptor)
    }

    /// Gets a field of the class by its name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Finds an annotation on the class by the binary name of its type.
    #[must_use]
    pub fn annotation(&self, binary_name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|it| it.annotation_type.binary_name == binary_name)
    }

    /// Adds a method to the class and makes the class its owner.
    /// # Errors
    /// Returns the method back if a method with the same name and descriptor already exists.
    pub fn add_method(&mut self, mut method: Method) -> Result<(), Box<Method>> {
        if self.get_method(&method.name, &method.descriptor).is_some() {
            return Err(Box::new(method));
        }
        method.owner = self.make_ref();
        self.methods.push(method);
        Ok(())
    }

    /// Adds a field to the class.
    /// # Errors
    /// Returns the field back if a field with the same name already exists.
    pub fn add_field(&mut self, field: Field) -> Result<(), Box<Field>> {
        if self.get_field(&field.name).is_some() {
            return Err(Box::new(field));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Iterates over every label defined in any method body of the class.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.methods
            .iter()
            .filter_map(|it| it.body.as_ref())
            .flat_map(|it| it.instructions.labels())
    }

    /// Checks the structural invariants of the class.
    /// # Errors
    /// See [`ClassError`].
    pub fn verify(&self) -> Result<(), ClassError> {
        let this = self.make_ref();
        for (index, method) in self.methods.iter().enumerate() {
            if method.owner != this {
                return Err(ClassError::ForeignOwner {
                    method: method.make_ref().to_string(),
                    owner: this,
                });
            }
            let duplicated = self.methods[..index]
                .iter()
                .any(|it| it.name == method.name && it.descriptor == method.descriptor);
            if duplicated {
                return Err(ClassError::DuplicateMethod(method.make_ref().to_string()));
            }
            if let Some(body) = &method.body {
                body.instructions
                    .verify()
                    .map_err(|source| ClassError::MalformedBody {
                        method: method.make_ref().to_string(),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

/// An error indicating that a [`Class`] violates a structural invariant.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ClassError {
    /// A method does not belong to the class that declares it.
    #[error("Method {method} is not owned by {owner}")]
    ForeignOwner {
        /// The offending method.
        method: String,
        /// The class declaring the method.
        owner: ClassRef,
    },
    /// Two methods share a name and a descriptor.
    #[error("Method {0} is declared more than once")]
    DuplicateMethod(String),
    /// A method body is malformed.
    #[error("Malformed body in {method}: {source}")]
    MalformedBody {
        /// The offending method.
        method: String,
        /// The violated invariant.
        source: CodeError,
    },
}

bitflags! {
    /// The access flags of a [`Class`].
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct ClassAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `final`; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by the invokespecial instruction.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared `abstract`; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an enum class.
        const ENUM = 0x4000;
    }
}
