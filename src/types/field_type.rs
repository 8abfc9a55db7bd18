//! Non-generic JVM field types.

use std::{fmt::Display, str::FromStr};

use itertools::Itertools;

use crate::jvm::references::ClassRef;

use super::method_descriptor::InvalidDescriptor;

/// A primitive type in Java.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PrimitiveType {
    /// The `boolean` type.
    Boolean,
    /// The `char` type.
    Char,
    /// The `float` type.
    Float,
    /// The `double` type.
    Double,
    /// The `byte` type.
    Byte,
    /// The `short` type.
    Short,
    /// The `int` type.
    Int,
    /// The `long` type.
    Long,
}

impl PrimitiveType {
    /// Returns the descriptor character of the type.
    #[must_use]
    pub const fn descriptor_char(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Char => 'C',
            Self::Float => 'F',
            Self::Double => 'D',
            Self::Byte => 'B',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
        }
    }

    /// Returns the binary name of the wrapper class of this type, e.g. `java/lang/Integer`.
    #[must_use]
    pub const fn wrapper_class(self) -> &'static str {
        match self {
            Self::Boolean => "java/lang/Boolean",
            Self::Char => "java/lang/Character",
            Self::Float => "java/lang/Float",
            Self::Double => "java/lang/Double",
            Self::Byte => "java/lang/Byte",
            Self::Short => "java/lang/Short",
            Self::Int => "java/lang/Integer",
            Self::Long => "java/lang/Long",
        }
    }

    /// Checks if values of this type occupy two local variable slots.
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }
}

impl TryFrom<char> for PrimitiveType {
    type Error = InvalidDescriptor;

    fn try_from(descriptor: char) -> Result<Self, Self::Error> {
        match descriptor {
            'Z' => Ok(Self::Boolean),
            'C' => Ok(Self::Char),
            'F' => Ok(Self::Float),
            'D' => Ok(Self::Double),
            'B' => Ok(Self::Byte),
            'S' => Ok(Self::Short),
            'I' => Ok(Self::Int),
            'J' => Ok(Self::Long),
            _ => Err(InvalidDescriptor(descriptor.to_string())),
        }
    }
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Float => "float",
            Self::Double => "double",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
        };
        write!(f, "{name}")
    }
}

/// A field type (non-generic) in Java.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum FieldType {
    /// A primitive type.
    Base(PrimitiveType),
    /// A reference type (except arrays).
    Object(ClassRef),
    /// An array type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Creates an array type with the given type as its elements.
    #[must_use]
    pub fn into_array_type(self) -> Self {
        Self::Array(Box::new(self))
    }

    /// Creates an array type with `dim` dimensions.
    #[must_use]
    pub fn array_of(element: Self, dim: u8) -> Self {
        (0..dim).fold(element, |it, _| it.into_array_type())
    }

    /// Creates a reference type of the class with the given binary name.
    #[must_use]
    pub fn object(binary_name: impl Into<String>) -> Self {
        Self::Object(ClassRef::new(binary_name))
    }

    /// Returns the descriptor of the type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Base(it) => it.descriptor_char().to_string(),
            Self::Object(ClassRef { binary_name }) => format!("L{binary_name};"),
            Self::Array(inner) => format!("[{}", inner.descriptor()),
        }
    }

    /// Returns the number of local variable slots a value of this type occupies.
    #[must_use]
    pub const fn slot_size(&self) -> u16 {
        match self {
            Self::Base(it) if it.is_wide() => 2,
            _ => 1,
        }
    }

    /// Returns the type of the elements if this is an array type.
    #[must_use]
    pub fn element_type(&self) -> Option<&FieldType> {
        match self {
            Self::Array(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromStr for FieldType {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let mut chars = descriptor.chars();
        let invalid = || InvalidDescriptor(descriptor.to_owned());
        match chars.next() {
            Some('[') => Self::from_str(chars.as_str())
                .map(Self::into_array_type)
                .map_err(|_| invalid()),
            Some('L') => {
                let binary_name: String = chars.take_while_ref(|it| *it != ';').collect();
                match (chars.next(), chars.next()) {
                    (Some(';'), None) if !binary_name.is_empty() => {
                        Ok(Self::Object(ClassRef::new(binary_name)))
                    }
                    _ => Err(invalid()),
                }
            }
            Some(c) => match chars.next() {
                None => PrimitiveType::try_from(c).map(Self::Base),
                Some(_) => Err(invalid()),
            },
            None => Err(invalid()),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base(it) => it.fmt(f),
            Self::Object(it) => it.fmt(f),
            Self::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}
