//! Module for the APIs for the field in JVM.
use bitflags::bitflags;

use super::{Field, references::ClassRef, references::FieldRef};

impl Field {
    /// Creates a [`FieldRef`] referring to the field declared in `owner`.
    #[must_use]
    pub fn make_ref(&self, owner: ClassRef) -> FieldRef {
        FieldRef {
            owner,
            name: self.name.clone(),
            field_type: self.field_type.clone(),
        }
    }

    /// Checks if the field is `static`.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

bitflags! {
    /// The access flags of a field.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct FieldAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class and other classes belonging to the same nest.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; never directly assigned to after object construction.
        const FINAL = 0x0010;
        /// Declared `volatile`; cannot be cached.
        const VOLATILE = 0x0040;
        /// Declared `transient`; not written or read by a persistent object manager.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an `enum` class.
        const ENUM = 0x4000;
    }
}
