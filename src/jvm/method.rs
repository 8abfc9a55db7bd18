//! Module for the APIs for the method in JVM.
use bitflags::bitflags;

use super::{Annotation, Method, references::MethodRef};

impl Method {
    /// The name of the constructor method.
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";
    /// The name of the class initialization method.
    pub const CLASS_INITIALIZER_NAME: &'static str = "<clinit>";

    /// Creates a [`MethodRef`] referring to the method.
    #[must_use]
    pub fn make_ref(&self) -> MethodRef {
        MethodRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Checks if the method is `static`.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Checks if the method is `private`.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    /// Checks if the method is a constructor or a class initializer.
    #[must_use]
    pub fn is_initializer(&self) -> bool {
        self.name == Self::CONSTRUCTOR_NAME || self.name == Self::CLASS_INITIALIZER_NAME
    }

    /// Returns the number of local variable slots taken by the receiver and the parameters.
    #[must_use]
    pub fn argument_slots(&self) -> u16 {
        let receiver = u16::from(!self.is_static());
        receiver + self.descriptor.parameter_slots()
    }

    /// Finds an annotation on the method by the binary name of its type.
    #[must_use]
    pub fn annotation(&self, binary_name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|it| it.annotation_type.binary_name == binary_name)
    }
}

bitflags! {
    /// The access flags of a method.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct MethodAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class and other classes belonging to the same nest.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; must not be overridden.
        const FINAL = 0x0010;
        /// Declared `synchronized`; invocation is wrapped by a monitor use.
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler.
        const BRIDGE = 0x0040;
        /// Declared with variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared `native`; implemented in a language other than the Java programming language.
        const NATIVE = 0x0100;
        /// Declared `abstract`; no implementation is provided.
        const ABSTRACT = 0x0400;
        /// In a class file whose major version number is at least 46 and at most 60, the method is declared `strictfp`.
        const STRICT = 0x0800;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
    }
}
