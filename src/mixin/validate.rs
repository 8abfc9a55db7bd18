//! Checks run before a directive mutates its target.
use crate::{
    jvm::{Class, Method},
    types::method_descriptor::MethodDescriptor,
};

use super::{
    directive::DirectiveKind,
    errors::{ApplyError, CountKind, CountViolation, MemberId, MixinWarning},
    injection_point::InjectionPoint,
};

/// A static injector handler must also be private.
pub(crate) fn check_injector_access(handler: &Method, id: &MemberId) -> Result<(), ApplyError> {
    if handler.is_static() && !handler.is_private() {
        return Err(ApplyError::Compatibility {
            handler: id.clone(),
            reason: "is static, but isn't private. Consider making the method private, as both access modifiers cannot be present at the same time.".to_owned(),
        });
    }
    Ok(())
}

/// The handler and the target method must agree on `static`.
pub(crate) fn check_static_match(
    handler: &Method,
    target_method: &Method,
    id: &MemberId,
    target: &Class,
) -> Result<(), ApplyError> {
    let reason = match (target_method.is_static(), handler.is_static()) {
        (true, false) => format!(
            "targets {}.{}{}. Target is static, but the mixin is not.",
            target.binary_name, target_method.name, target_method.descriptor
        ),
        (false, true) => format!(
            "targets {}.{}{}, but target is not static, but the callback handler is.",
            target.binary_name, target_method.name, target_method.descriptor
        ),
        _ => return Ok(()),
    };
    Err(ApplyError::Compatibility {
        handler: id.clone(),
        reason,
    })
}

/// Only invocations may be redirected or have their arguments modified.
pub(crate) fn check_call_point(
    point: &InjectionPoint,
    kind: DirectiveKind,
    id: &MemberId,
) -> Result<(), ApplyError> {
    if point.supports_redirect() {
        return Ok(());
    }
    Err(ApplyError::StructuralMismatch {
        handler: id.clone(),
        reason: format!(
            "uses selector @At(\"{}\") which does not support usage within a @{} context.",
            point.kind,
            kind.schema().name
        ),
    })
}

/// Checks the number of injection points against `require` and `expect`.
/// # Errors
/// - [`ApplyError::CountViolation`] if fewer than `require`.
pub(crate) fn check_counts(
    require: i32,
    expect: i32,
    found: usize,
    id: &MemberId,
) -> Result<Option<MixinWarning>, ApplyError> {
    let below = |threshold: i32| usize::try_from(threshold).is_ok_and(|it| found < it);
    let violation = |kind, threshold| CountViolation {
        handler: id.clone(),
        kind,
        threshold,
        found,
    };
    if below(require) {
        return Err(ApplyError::CountViolation(violation(
            CountKind::Require,
            require,
        )));
    }
    if below(expect) {
        let warning = MixinWarning::CountViolation(violation(CountKind::Expect, expect));
        log::warn!("{warning}");
        return Ok(Some(warning));
    }
    Ok(None)
}

/// The handler descriptor, after remapping, must equal `expected`.
pub(crate) fn check_signature(
    actual: &MethodDescriptor,
    expected: &MethodDescriptor,
    id: &MemberId,
) -> Result<(), ApplyError> {
    if actual == expected {
        return Ok(());
    }
    Err(ApplyError::HandlerSignature {
        handler: id.clone(),
        expected: expected.to_string(),
    })
}
