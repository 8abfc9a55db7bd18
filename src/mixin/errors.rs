//! Errors and warnings raised while parsing and applying mixins.
use std::fmt::Display;

use crate::{
    jvm::{Field, Method, class::ClassError, code::CodeError},
    types::method_descriptor::InvalidDescriptor,
};

use super::directive::DirectiveKind;

/// The fully qualified identity of a mixin member, `owner.name(descriptor)`.
/// Class level sites have an empty name and print as the owner alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberId {
    /// The binary name of the declaring class.
    pub owner: String,
    /// The name of the member.
    pub name: String,
    /// The descriptor of the member.
    pub descriptor: String,
}

impl MemberId {
    /// Identifies a method declared in `owner`.
    #[must_use]
    pub fn method(owner: &str, method: &Method) -> Self {
        Self {
            owner: owner.to_owned(),
            name: method.name.clone(),
            descriptor: method.descriptor.to_string(),
        }
    }

    /// Identifies a field declared in `owner`.
    #[must_use]
    pub fn field(owner: &str, field: &Field) -> Self {
        Self {
            owner: owner.to_owned(),
            name: field.name.clone(),
            descriptor: format!(":{}", field.field_type.descriptor()),
        }
    }

    /// Identifies a class.
    #[must_use]
    pub fn class(owner: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            name: String::new(),
            descriptor: String::new(),
        }
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.owner)
        } else {
            write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
        }
    }
}

/// An error raised while reading the directives of a mixin class.
/// Any of them rejects the whole mixin class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The class carries no `@Mixin` annotation.
    #[error("{0} is not annotated with @Mixin")]
    MissingMixin(String),
    /// A key occurs more than once in one annotation.
    #[error("Duplicate \"{key}\" field in @{annotation} {site}")]
    DuplicateKey {
        /// The simple name of the annotation.
        annotation: &'static str,
        /// The repeated key.
        key: String,
        /// Where the annotation was found.
        site: MemberId,
    },
    /// A key is not part of the schema of the annotation.
    #[error("Unimplemented key in @{annotation} {site}: {key}")]
    UnknownKey {
        /// The simple name of the annotation.
        annotation: &'static str,
        /// The unrecognized key.
        key: String,
        /// Where the annotation was found.
        site: MemberId,
    },
    /// The value of a key does not have the expected shape.
    #[error("\"{key}\" in @{annotation} {site} should be {expected} but is {found}")]
    WrongShape {
        /// The simple name of the annotation.
        annotation: &'static str,
        /// The key.
        key: &'static str,
        /// Where the annotation was found.
        site: MemberId,
        /// The expected shape.
        expected: &'static str,
        /// The shape found.
        found: &'static str,
    },
    /// A key holds a value of the right shape that is still not acceptable.
    #[error("Invalid value for \"{key}\" in {site}: {value}")]
    InvalidValue {
        /// The key.
        key: &'static str,
        /// Where the annotation was found.
        site: MemberId,
        /// The rejected value.
        value: String,
    },
    /// A directive that needs an injection point has none.
    #[error(
        "The {kind} mixin {site} should define the at-value but does not. The mixin may be compiled for a future version of mixin."
    )]
    MissingAt {
        /// The kind of the directive.
        kind: DirectiveKind,
        /// The handler.
        site: MemberId,
    },
    /// A directive has no target selector.
    #[error("No available selectors: Mixin {0} does not match anything and is not a valid mixin.")]
    NoSelectors(MemberId),
    /// `@At` names an injection point kind that is not supported.
    #[error("Unknown injection point @At(\"{value}\") in {site}")]
    UnknownInjectionPoint {
        /// The value of `@At`.
        value: String,
        /// Where the annotation was found.
        site: MemberId,
    },
    /// A member carries more than one directive annotation.
    #[error("{0} carries more than one mixin annotation")]
    ConflictingDirectives(MemberId),
    /// A descriptor or a selector string is malformed.
    #[error("Invalid descriptor in {site}: {source}")]
    InvalidDescriptor {
        /// Where the descriptor was found.
        site: MemberId,
        /// The malformed descriptor.
        source: InvalidDescriptor,
    },
}

/// Whether a count constraint is fatal or advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CountKind {
    /// Below `require`, fatal.
    #[display("requires")]
    Require,
    /// Below `expect`, reported as a warning.
    #[display("expects")]
    Expect,
}

/// A directive found fewer injection points than it asked for.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{handler} {kind} {threshold} injection points but only found {found}.")]
pub struct CountViolation {
    /// The handler of the directive.
    pub handler: MemberId,
    /// Which constraint was violated.
    pub kind: CountKind,
    /// The minimum number of injection points.
    pub threshold: i32,
    /// The number of injection points found across all target methods.
    pub found: usize,
}

/// A non-fatal diagnostic recorded while applying a mixin.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MixinWarning {
    /// Fewer injection points than `expect`, but not fewer than `require`.
    #[display("Potentially outdated mixin: {_0}")]
    CountViolation(CountViolation),
}

/// An error raised while applying a mixin to a target class.
/// The target class is left untouched when it occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// A directive or a `@Shadow` member resolves to nothing.
    #[error("Illegal mixin: {handler} does not match anything in {target}")]
    Selector {
        /// The handler or member.
        handler: MemberId,
        /// The target class.
        target: String,
    },
    /// The code at an injection point does not have the shape the directive needs.
    #[error("Illegal mixin: {handler} {reason}")]
    StructuralMismatch {
        /// The handler.
        handler: MemberId,
        /// What does not fit.
        reason: String,
    },
    /// The handler and the target disagree on `static` or on access modifiers.
    #[error("Illegal mixin: {handler} {reason}")]
    Compatibility {
        /// The handler.
        handler: MemberId,
        /// What does not fit.
        reason: String,
    },
    /// The handler descriptor does not fit the splice.
    #[error("Illegal mixin: {handler} should have the descriptor {expected}")]
    HandlerSignature {
        /// The handler.
        handler: MemberId,
        /// The descriptor the splice needs.
        expected: String,
    },
    /// Fewer injection points than `require`.
    #[error("Illegal mixin: {0}")]
    CountViolation(CountViolation),
    /// A merged member already exists in the target class.
    #[error("Illegal mixin: {member} is already declared in {target}")]
    DuplicateMember {
        /// The merged member.
        member: MemberId,
        /// The target class.
        target: String,
    },
    /// A splice produced an inconsistent instruction list.
    #[error("Illegal mixin: applying {handler} corrupted the code: {source}")]
    MalformedCode {
        /// The handler.
        handler: MemberId,
        /// The violated invariant.
        source: CodeError,
    },
    /// The transformed class fails verification.
    #[error("Illegal mixin: applying {mixin} produced a malformed class: {source}")]
    MalformedClass {
        /// The mixin class.
        mixin: String,
        /// The violated invariant.
        source: ClassError,
    },
}

impl ApplyError {
    /// Wraps a [`CodeError`] raised while splicing the given handler.
    pub(crate) fn code(handler: &MemberId) -> impl FnOnce(CodeError) -> Self + '_ {
        move |source| Self::MalformedCode {
            handler: handler.clone(),
            source,
        }
    }
}
