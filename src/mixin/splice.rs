//! Shared building blocks of the code splice engine.
use crate::{
    jvm::{
        Class, Method, Remapper,
        code::{InsnId, Instruction, InstructionList, InvokeKind, MethodBody, ValueKind},
        method::MethodAccessFlags,
        references::MethodRef,
    },
    types::field_type::FieldType,
};

use super::{
    context::HandlerContext,
    directive::DirectiveKind,
    errors::{ApplyError, MemberId},
};

/// What a directive needs to know about the mixin being applied.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ApplyScope<'a> {
    /// The binary name of the mixin class.
    pub mixin: &'a str,
    /// Translates mixin references into target references. Maps the mixin class to the
    /// target class and every renamed `@Shadow` and `@Unique` member.
    pub remapper: &'a Remapper,
}

/// Clones a method body with fresh labels and remapped references.
pub(crate) fn copy_body(
    body: &MethodBody,
    remapper: &Remapper,
    ctx: &mut HandlerContext,
) -> MethodBody {
    let mut instructions = body.instructions.copy_with(ctx.labels_mut());
    instructions
        .iter_mut()
        .for_each(|it| remapper.map_instruction(it));
    MethodBody::new(instructions, body.max_stack, body.max_locals)
}

/// Copies `handler` into `target` under a generated name and returns a reference to the copy.
/// The copy is `private` and synthetic, and keeps the `static` flag of the handler.
pub(crate) fn copy_handler(
    handler: &Method,
    id: &MemberId,
    kind: DirectiveKind,
    target: &mut Class,
    scope: &ApplyScope<'_>,
    ctx: &mut HandlerContext,
) -> Result<MethodRef, ApplyError> {
    let body = handler
        .body
        .as_ref()
        .ok_or_else(|| ApplyError::StructuralMismatch {
            handler: id.clone(),
            reason: "has no code to inject".to_owned(),
        })?;
    let descriptor = scope.remapper.map_descriptor(&handler.descriptor);
    let name = loop {
        let candidate = ctx.next_handler_name(kind, &handler.name);
        if target.get_method(&candidate, &descriptor).is_none() {
            break candidate;
        }
    };
    let access_flags = (handler.access_flags & MethodAccessFlags::STATIC)
        | MethodAccessFlags::PRIVATE
        | MethodAccessFlags::SYNTHETIC;
    let copy = Method {
        access_flags,
        name,
        descriptor,
        owner: target.make_ref(),
        body: Some(copy_body(body, scope.remapper, ctx)),
        annotations: Vec::new(),
    };
    let method_ref = copy.make_ref();
    target
        .add_method(copy)
        .map_err(|_| ApplyError::DuplicateMember {
            member: id.clone(),
            target: target.binary_name.clone(),
        })?;
    log::trace!("Copied {id} into {method_ref}");
    Ok(method_ref)
}

/// Returns the instruction calling a handler copy.
pub(crate) fn call_handler(handler: &MethodRef, is_static: bool) -> Instruction {
    let kind = if is_static {
        InvokeKind::Static
    } else {
        InvokeKind::Virtual
    };
    Instruction::Invoke(kind, handler.clone())
}

/// Moves values of the given types from the top of the stack into fresh locals.
/// Returns the stores, to run in order, and the loads that push the values back.
pub(crate) fn spill(
    body: &mut MethodBody,
    types: &[FieldType],
) -> (Vec<Instruction>, Vec<Instruction>) {
    let slots: Vec<(ValueKind, u16)> = types
        .iter()
        .map(|it| {
            let kind = ValueKind::of(it);
            (kind, body.allocate_local(kind))
        })
        .collect();
    let stores = slots
        .iter()
        .rev()
        .map(|(kind, slot)| Instruction::Store(*kind, *slot))
        .collect();
    let loads = slots
        .iter()
        .map(|(kind, slot)| Instruction::Load(*kind, *slot))
        .collect();
    (stores, loads)
}

/// Returns the first real instruction at or after `anchor` if it is an invocation.
/// # Errors
/// A description of the instruction found instead.
pub(crate) fn invocation_at(
    code: &InstructionList,
    anchor: InsnId,
) -> Result<(InsnId, InvokeKind, MethodRef), String> {
    let Some(id) = code.next_real(anchor) else {
        return Err(format!("expects an invocation at {anchor} but found the end of the method"));
    };
    match code.get(id).and_then(Instruction::as_invoke) {
        Some((kind, method)) => Ok((id, kind, method.clone())),
        None => Err(format!(
            "expects an invocation at {anchor} but found {}",
            code.get(id).map(ToString::to_string).unwrap_or_default()
        )),
    }
}

/// Returns the types of the values an invocation pops, receiver first.
pub(crate) fn operand_types(kind: InvokeKind, method: &MethodRef) -> Vec<FieldType> {
    let receiver = kind
        .has_receiver()
        .then(|| FieldType::Object(method.owner.clone()));
    receiver
        .into_iter()
        .chain(method.descriptor.parameters_types.iter().cloned())
        .collect()
}
