use crate::{
    jvm::{
        Class, Method,
        code::{InsnId, Instruction, ValueKind},
        references::MethodRef,
    },
    mixin::{
        context::HandlerContext,
        errors::{ApplyError, MemberId, ParseError},
        splice::{self, ApplyScope},
        validate,
    },
    types::method_descriptor::MethodDescriptor,
};

use super::{DirectiveKind, DirectiveReport, InjectorSpec, schema::AnnotationReader};

/// `@Redirect`: replaces matched invocations with a call to the handler.
///
/// A static handler takes the operands of the call. An instance handler is called on the
/// target instance, with the operands spilled under the receiver and reloaded.
#[derive(Debug, Clone)]
pub struct Redirect {
    /// The handler, as declared in the mixin.
    pub handler: Method,
    /// The identity of the handler.
    pub id: MemberId,
    /// Where to redirect.
    pub spec: InjectorSpec,
}

impl Redirect {
    pub(super) fn parse(
        reader: &AnnotationReader<'_>,
        handler: Method,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            spec: InjectorSpec::parse(reader, DirectiveKind::Redirect)?,
            id: reader.site().clone(),
            handler,
        })
    }

    pub(super) fn apply(
        &self,
        target: &mut Class,
        scope: &ApplyScope<'_>,
        ctx: &mut HandlerContext,
    ) -> Result<DirectiveReport, ApplyError> {
        validate::check_injector_access(&self.handler, &self.id)?;
        for point in &self.spec.at {
            validate::check_call_point(point, DirectiveKind::Redirect, &self.id)?;
        }
        let located = self.spec.locate(&self.handler, &self.id, target, scope)?;
        let descriptor = scope.remapper.map_descriptor(&self.handler.descriptor);

        let mut calls: Vec<(usize, Vec<InsnId>)> = Vec::with_capacity(located.targets.len());
        let mut count = 0;
        for (index, anchors) in &located.targets {
            let Some(body) = &target.methods[*index].body else {
                continue;
            };
            let mut sites = Vec::with_capacity(anchors.len());
            for anchor in anchors {
                let (id, kind, method) = splice::invocation_at(&body.instructions, *anchor)
                    .map_err(|reason| ApplyError::StructuralMismatch {
                        handler: self.id.clone(),
                        reason,
                    })?;
                if sites.contains(&id) {
                    continue;
                }
                if ctx.config().verify_redirect_signatures {
                    let expected = MethodDescriptor::new(
                        splice::operand_types(kind, &method),
                        method.descriptor.return_type.clone(),
                    );
                    validate::check_signature(&descriptor, &expected, &self.id)?;
                }
                sites.push(id);
            }
            count += sites.len();
            calls.push((*index, sites));
        }
        let warning =
            validate::check_counts(self.spec.require, self.spec.expect, count, &self.id)?;

        let generated = if count == 0 {
            None
        } else {
            let handler = splice::copy_handler(
                &self.handler,
                &self.id,
                DirectiveKind::Redirect,
                target,
                scope,
                ctx,
            )?;
            for (index, sites) in calls {
                self.splice(&mut target.methods[index], &sites, &handler, &descriptor)?;
            }
            Some(handler.name)
        };
        Ok(DirectiveReport {
            handler: self.id.clone(),
            kind: DirectiveKind::Redirect,
            matches: count,
            generated,
            warnings: warning.into_iter().collect(),
        })
    }

    fn splice(
        &self,
        method: &mut Method,
        sites: &[InsnId],
        handler: &MethodRef,
        descriptor: &MethodDescriptor,
    ) -> Result<(), ApplyError> {
        let Some(body) = method.body.as_mut() else {
            return Ok(());
        };
        let is_static = self.handler.is_static();
        for site in sites {
            if !is_static {
                let (stores, loads) = splice::spill(body, &descriptor.parameters_types);
                let prologue = stores
                    .into_iter()
                    .chain(std::iter::once(Instruction::Load(ValueKind::Reference, 0)))
                    .chain(loads);
                body.instructions
                    .insert_all_before(*site, prologue)
                    .map_err(ApplyError::code(&self.id))?;
                body.grow_stack(1);
            }
            let call = body
                .instructions
                .replace(*site, splice::call_handler(handler, is_static))
                .map_err(ApplyError::code(&self.id))?;
            log::debug!(
                "Redirected {call} in {}.{}{} to {}",
                method.owner,
                method.name,
                method.descriptor,
                handler.name
            );
        }
        Ok(())
    }
}
