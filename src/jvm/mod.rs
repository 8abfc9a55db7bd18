//! In-memory model of JVM classes, as seen by the mixin engine.
//!
//! Classes are fully materialized: every method owns its instruction list, and references
//! to other members are symbolic ([`references`]).

use self::{
    annotation::ElementValue,
    class::ClassAccessFlags,
    code::MethodBody,
    field::FieldAccessFlags,
    method::MethodAccessFlags,
    references::ClassRef,
};
use crate::types::{field_type::FieldType, method_descriptor::MethodDescriptor};

pub mod annotation;
pub mod class;
pub mod code;
pub mod field;
pub mod method;
pub mod references;
mod remapper;

pub use remapper::Remapper;

/// A JVM class.
#[derive(Debug, Clone)]
pub struct Class {
    /// The binary name of the class (e.g., `org/mokamix/Target`).
    pub binary_name: String,
    /// The access modifiers of the class.
    pub access_flags: ClassAccessFlags,
    /// A reference to the superclass of the class.
    /// The class `java/lang/Object` has no superclass, so this field is `None` for that class.
    pub super_class: Option<ClassRef>,
    /// The interfaces implemented by the class.
    pub interfaces: Vec<ClassRef>,
    /// The fields declared the class.
    pub fields: Vec<Field>,
    /// The methods declared in the class.
    pub methods: Vec<Method>,
    /// The annotations on the class.
    pub annotations: Vec<Annotation>,
}

/// A JVM method.
#[derive(Debug, Clone)]
pub struct Method {
    /// The access flags of the method.
    pub access_flags: MethodAccessFlags,
    /// The name of the method.
    pub name: String,
    /// The descriptor of the method.
    pub descriptor: MethodDescriptor,
    /// The class containing the method.
    pub owner: ClassRef,
    /// The body of the method, [`None`] for `abstract` and `native` methods.
    pub body: Option<MethodBody>,
    /// The annotations on the method.
    pub annotations: Vec<Annotation>,
}

/// A JVM field.
#[derive(Debug, Clone)]
pub struct Field {
    /// The access flags of the field.
    pub access_flags: FieldAccessFlags,
    /// The name of the field.
    pub name: String,
    /// The type of the field.
    pub field_type: FieldType,
    /// The annotations on the field.
    pub annotations: Vec<Annotation>,
}

/// A JVM annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// The type of the annotation.
    pub annotation_type: ClassRef,
    /// The name and value of the elements, in declaration order.
    /// The list may contain the same name more than once; consumers decide whether that is an error.
    pub element_value_pairs: Vec<(String, ElementValue)>,
}
