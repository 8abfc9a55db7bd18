use crate::{
    jvm::{Class, Method},
    mixin::{
        callback::{CallbackSite, carrier_of},
        context::HandlerContext,
        errors::{ApplyError, MemberId, ParseError},
        splice::{self, ApplyScope},
        validate,
    },
    types::{
        field_type::FieldType,
        method_descriptor::{MethodDescriptor, ReturnType},
    },
};

use super::{DirectiveKind, DirectiveReport, InjectorSpec, schema::AnnotationReader};

/// `@Inject`: calls the handler at each injection point with a callback carrier.
#[derive(Debug, Clone)]
pub struct Inject {
    /// The handler, as declared in the mixin.
    pub handler: Method,
    /// The identity of the handler.
    pub id: MemberId,
    /// Where to inject.
    pub spec: InjectorSpec,
    /// Whether the handler may cancel the target method.
    pub cancellable: bool,
}

impl Inject {
    pub(super) fn parse(
        reader: &AnnotationReader<'_>,
        handler: Method,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            spec: InjectorSpec::parse(reader, DirectiveKind::Inject)?,
            cancellable: reader.boolean("cancellable")?.unwrap_or(false),
            id: reader.site().clone(),
            handler,
        })
    }

    /// Checks the handler against `target_method` and tells whether it takes the target
    /// arguments before the carrier.
    fn takes_arguments(
        &self,
        descriptor: &MethodDescriptor,
        target_method: &Method,
    ) -> Result<bool, ApplyError> {
        let carrier = FieldType::object(carrier_of(&target_method.descriptor.return_type));
        let full = MethodDescriptor::new(
            target_method
                .descriptor
                .parameters_types
                .iter()
                .cloned()
                .chain(std::iter::once(carrier.clone()))
                .collect(),
            ReturnType::Void,
        );
        let short = MethodDescriptor::new(vec![carrier], ReturnType::Void);
        if *descriptor == full {
            Ok(true)
        } else if *descriptor == short {
            Ok(false)
        } else {
            validate::check_signature(descriptor, &full, &self.id).map(|()| true)
        }
    }

    pub(super) fn apply(
        &self,
        target: &mut Class,
        scope: &ApplyScope<'_>,
        ctx: &mut HandlerContext,
    ) -> Result<DirectiveReport, ApplyError> {
        validate::check_injector_access(&self.handler, &self.id)?;
        let located = self.spec.locate(&self.handler, &self.id, target, scope)?;
        let descriptor = scope.remapper.map_descriptor(&self.handler.descriptor);
        let mut shapes = Vec::with_capacity(located.targets.len());
        for (index, _) in &located.targets {
            shapes.push(self.takes_arguments(&descriptor, &target.methods[*index])?);
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
                DirectiveKind::Inject,
                target,
                scope,
                ctx,
            )?;
            for ((index, anchors), pass_arguments) in located.targets.iter().zip(shapes) {
                let method = &mut target.methods[*index];
                // The working copy is discarded on error, so the body is not restored then.
                let Some(mut body) = method.body.take() else {
                    continue;
                };
                let site = CallbackSite {
                    target: &*method,
                    handler: &handler,
                    handler_static: self.handler.is_static(),
                    pass_arguments,
                    cancellable: self.cancellable,
                };
                for anchor in anchors {
                    let code = site.emit(&mut body, *anchor, ctx.fresh_label());
                    body.instructions
                        .insert_all_before(*anchor, code)
                        .map_err(ApplyError::code(&self.id))?;
                }
                log::debug!(
                    "Injected {} at {} points of {}.{}{}",
                    handler.name,
                    anchors.len(),
                    method.owner,
                    method.name,
                    method.descriptor
                );
                method.body = Some(body);
            }
            Some(handler.name)
        };
        Ok(DirectiveReport {
            handler: self.id.clone(),
            kind: DirectiveKind::Inject,
            matches: located.count,
            generated,
            warnings: warning.into_iter().collect(),
        })
    }
}
