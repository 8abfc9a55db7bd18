//! Module for the APIs for the annotation in JVM.
use crate::types::{field_type::PrimitiveType, method_descriptor::ReturnType};

use super::{Annotation, code::ConstantValue, references::ClassRef};

/// A value of an annotation field.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// A constant value in primitive type.
    Primitive(PrimitiveType, ConstantValue),
    /// A constant value in String type.
    String(String),
    /// An enum constant.
    EnumConstant {
        /// The name of the enum type.
        enum_type_name: String,
        /// The name of the enum constant.
        const_name: String,
    },
    /// A class literal.
    Class {
        /// The descriptor of the class literal.
        return_descriptor: ReturnType,
    },
    /// Another annotation.
    AnnotationInterface(Annotation),
    /// An array of values.
    Array(Vec<ElementValue>),
}

impl ElementValue {
    /// Creates an `int` element value.
    #[must_use]
    pub const fn int(value: i32) -> Self {
        Self::Primitive(PrimitiveType::Int, ConstantValue::Integer(value))
    }

    /// Creates a `boolean` element value.
    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Primitive(PrimitiveType::Boolean, ConstantValue::Integer(value as i32))
    }

    /// Creates a string element value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates an array of string element values.
    #[must_use]
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(values.into_iter().map(Self::string).collect())
    }

    /// Returns a short name of the shape of the value, used in diagnostics.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Primitive(..) => "primitive",
            Self::String(_) => "string",
            Self::EnumConstant { .. } => "enum constant",
            Self::Class { .. } => "class literal",
            Self::AnnotationInterface(_) => "annotation",
            Self::Array(_) => "array",
        }
    }
}

impl Annotation {
    /// Creates an annotation of the given type with no elements.
    #[must_use]
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            annotation_type: ClassRef::new(binary_name),
            element_value_pairs: Vec::new(),
        }
    }

    /// Adds an element to the annotation.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.element_value_pairs.push((name.into(), value));
        self
    }

    /// Returns the first value of the element with the given name.
    #[must_use]
    pub fn get_element_value(&self, name: &str) -> Option<&ElementValue> {
        self.element_value_pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
