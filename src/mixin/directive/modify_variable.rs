use crate::{
    jvm::{
        Class, Method,
        code::{Instruction, ValueKind},
    },
    mixin::{
        context::HandlerContext,
        errors::{ApplyError, MemberId, ParseError},
        splice::{self, ApplyScope},
        validate,
    },
    types::field_type::FieldType,
};

use super::{
    DirectiveKind, DirectiveReport, InjectorSpec, modify_arg::ModifyArg,
    schema::AnnotationReader,
};

/// `@ModifyVariable`: passes a local variable through the handler at each injection point.
/// The handler has the shape `(T)T`.
#[derive(Debug, Clone)]
pub struct ModifyVariable {
    /// The handler, as declared in the mixin.
    pub handler: Method,
    /// The identity of the handler.
    pub id: MemberId,
    /// Where to modify the variable.
    pub spec: InjectorSpec,
    /// The local variable slot, `-1` infers it from the unique parameter of type `T`.
    pub index: i32,
}

impl ModifyVariable {
    pub(super) fn parse(
        reader: &AnnotationReader<'_>,
        handler: Method,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            spec: InjectorSpec::parse(reader, DirectiveKind::ModifyVariable)?,
            index: reader.int("index")?.unwrap_or(-1),
            id: reader.site().clone(),
            handler,
        })
    }

    fn slot(&self, target_method: &Method, value: &FieldType) -> Result<u16, ApplyError> {
        let mismatch = |reason: String| ApplyError::StructuralMismatch {
            handler: self.id.clone(),
            reason,
        };
        let receiver = (!target_method.is_static())
            .then(|| FieldType::Object(target_method.owner.clone()));
        let mut slot = 0;
        let mut parameters = Vec::new();
        for parameter in receiver
            .iter()
            .chain(&target_method.descriptor.parameters_types)
        {
            parameters.push((slot, parameter));
            slot += parameter.slot_size();
        }

        if let Ok(index) = u16::try_from(self.index) {
            let max_locals = target_method.body.as_ref().map_or(0, |it| it.max_locals);
            if u32::from(index) + u32::from(value.slot_size()) > u32::from(max_locals) {
                return Err(mismatch(format!(
                    "modifies local variable {index} of {}{}, which only has {max_locals} locals",
                    target_method.name, target_method.descriptor
                )));
            }
            let declared = parameters
                .iter()
                .find(|(slot, it)| (*slot..*slot + it.slot_size()).contains(&index));
            return match declared {
                Some((slot, it)) if *slot != index || *it != value => Err(mismatch(format!(
                    "modifies local variable {index} of {}{} as {value}, but it holds a {it}",
                    target_method.name, target_method.descriptor
                ))),
                _ => Ok(index),
            };
        }

        let found: Vec<u16> = parameters
            .iter()
            .skip(usize::from(receiver.is_some()))
            .filter(|(_, it)| *it == value)
            .map(|(slot, _)| *slot)
            .collect();
        match found[..] {
            [slot] => Ok(slot),
            _ => Err(mismatch(format!(
                "cannot infer which local variable of type {value} to modify in {}{}, set the index",
                target_method.name, target_method.descriptor
            ))),
        }
    }

    pub(super) fn apply(
        &self,
        target: &mut Class,
        scope: &ApplyScope<'_>,
        ctx: &mut HandlerContext,
    ) -> Result<DirectiveReport, ApplyError> {
        validate::check_injector_access(&self.handler, &self.id)?;
        let descriptor = scope.remapper.map_descriptor(&self.handler.descriptor);
        let value = ModifyArg::modified_type(&descriptor, &self.id)?;
        let kind = ValueKind::of(value);
        let located = self.spec.locate(&self.handler, &self.id, target, scope)?;
        let mut slots = Vec::with_capacity(located.targets.len());
        for (index, _) in &located.targets {
            slots.push(self.slot(&target.methods[*index], value)?);
        }
        let warning = validate::check_counts(
            self.spec.require,
            self.spec.expect,
            located.count,
            &self.id,
        )?;

        let generated = if located.count == 0 {
            None
        } else {
            let handler = splice::copy_handler(
                &self.handler,
                &self.id,
                DirectiveKind::ModifyVariable,
                target,
                scope,
                ctx,
            )?;
            let is_static = self.handler.is_static();
            for ((index, anchors), slot) in located.targets.iter().zip(slots) {
                let Some(body) = target.methods[*index].body.as_mut() else {
                    continue;
                };
                for anchor in anchors {
                    let receiver =
                        (!is_static).then_some(Instruction::Load(ValueKind::Reference, 0));
                    let code = receiver.into_iter().chain([
                        Instruction::Load(kind, slot),
                        splice::call_handler(&handler, is_static),
                        Instruction::Store(kind, slot),
                    ]);
                    body.instructions
                        .insert_all_before(*anchor, code)
                        .map_err(ApplyError::code(&self.id))?;
                }
                body.grow_stack(1 + kind.slot_size());
            }
            log::debug!(
                "Routed local variables at {} points through {}",
                located.count,
                handler.name
            );
            Some(handler.name)
        };
        Ok(DirectiveReport {
            handler: self.id.clone(),
            kind: DirectiveKind::ModifyVariable,
            matches: located.count,
            generated,
            warnings: warning.into_iter().collect(),
        })
    }
}
