use crate::{
    jvm::{
        Class, Method,
        code::{InsnId, Instruction, ValueKind},
    },
    mixin::{
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

/// `@ModifyArg`: passes one argument of a matched invocation through the handler.
/// The handler has the shape `(T)T`.
#[derive(Debug, Clone)]
pub struct ModifyArg {
    /// The handler, as declared in the mixin.
    pub handler: Method,
    /// The identity of the handler.
    pub id: MemberId,
    /// Which invocations.
    pub spec: InjectorSpec,
    /// The index of the argument among the call arguments, `-1` infers it from `T`.
    pub index: i32,
}

/// One argument to route through the handler.
#[derive(Debug)]
struct ArgSite {
    call: InsnId,
    index: usize,
    arguments: Vec<FieldType>,
}

impl ModifyArg {
    pub(super) fn parse(
        reader: &AnnotationReader<'_>,
        handler: Method,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            spec: InjectorSpec::parse(reader, DirectiveKind::ModifyArg)?,
            index: reader.int("index")?.unwrap_or(-1),
            id: reader.site().clone(),
            handler,
        })
    }

    /// Returns `T` of a handler shaped `(T)T`.
    pub(super) fn modified_type<'d>(
        descriptor: &'d MethodDescriptor,
        id: &MemberId,
    ) -> Result<&'d FieldType, ApplyError> {
        match (&descriptor.parameters_types[..], &descriptor.return_type) {
            ([param], ReturnType::Some(ret)) if param == ret => Ok(param),
            _ => Err(ApplyError::HandlerSignature {
                handler: id.clone(),
                expected: "(T)T".to_owned(),
            }),
        }
    }

    fn argument_index(
        &self,
        arguments: &[FieldType],
        value: &FieldType,
    ) -> Result<usize, ApplyError> {
        let mismatch = |reason: String| ApplyError::StructuralMismatch {
            handler: self.id.clone(),
            reason,
        };
        if let Ok(index) = usize::try_from(self.index) {
            let argument = arguments.get(index).ok_or_else(|| {
                mismatch(format!(
                    "modifies argument {index} of a call taking {} arguments",
                    arguments.len()
                ))
            })?;
            if argument != value {
                return Err(ApplyError::HandlerSignature {
                    handler: self.id.clone(),
                    expected: MethodDescriptor::new(
                        vec![argument.clone()],
                        ReturnType::Some(argument.clone()),
                    )
                    .to_string(),
                });
            }
            return Ok(index);
        }
        let mut candidates = arguments
            .iter()
            .enumerate()
            .filter(|(_, it)| *it == value)
            .map(|(index, _)| index);
        match (candidates.next(), candidates.next()) {
            (Some(index), None) => Ok(index),
            (None, _) => Err(mismatch(format!("found no argument of type {value}"))),
            (Some(_), Some(_)) => Err(mismatch(format!(
                "cannot infer which argument of type {value} to modify, set the index"
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
        for point in &self.spec.at {
            validate::check_call_point(point, DirectiveKind::ModifyArg, &self.id)?;
        }
        let descriptor = scope.remapper.map_descriptor(&self.handler.descriptor);
        let value = Self::modified_type(&descriptor, &self.id)?;
        let located = self.spec.locate(&self.handler, &self.id, target, scope)?;

        let mut sites: Vec<(usize, Vec<ArgSite>)> = Vec::with_capacity(located.targets.len());
        let mut count = 0;
        for (index, anchors) in &located.targets {
            let Some(body) = &target.methods[*index].body else {
                continue;
            };
            let mut args: Vec<ArgSite> = Vec::with_capacity(anchors.len());
            for anchor in anchors {
                let (call, _, method) = splice::invocation_at(&body.instructions, *anchor)
                    .map_err(|reason| ApplyError::StructuralMismatch {
                        handler: self.id.clone(),
                        reason,
                    })?;
                if args.iter().any(|it| it.call == call) {
                    continue;
                }
                let arguments = method.descriptor.parameters_types;
                args.push(ArgSite {
                    call,
                    index: self.argument_index(&arguments, value)?,
                    arguments,
                });
            }
            count += args.len();
            sites.push((*index, args));
        }
        let warning =
            validate::check_counts(self.spec.require, self.spec.expect, count, &self.id)?;

        let generated = if count == 0 {
            None
        } else {
            let handler = splice::copy_handler(
                &self.handler,
                &self.id,
                DirectiveKind::ModifyArg,
                target,
                scope,
                ctx,
            )?;
            let is_static = self.handler.is_static();
            for (index, args) in sites {
                let Some(body) = target.methods[index].body.as_mut() else {
                    continue;
                };
                for site in args {
                    let spilled_from = if is_static { site.index + 1 } else { site.index };
                    let (stores, loads) = splice::spill(body, &site.arguments[spilled_from..]);
                    let mut code = stores;
                    if !is_static {
                        code.push(Instruction::Load(ValueKind::Reference, 0));
                    }
                    let mut loads = loads.into_iter();
                    if !is_static {
                        code.extend(loads.next());
                    }
                    code.push(splice::call_handler(&handler, is_static));
                    code.extend(loads);
                    body.instructions
                        .insert_all_before(site.call, code)
                        .map_err(ApplyError::code(&self.id))?;
                    body.grow_stack(1);
                }
            }
            log::debug!("Routed {count} arguments through {}", handler.name);
            Some(handler.name)
        };
        Ok(DirectiveReport {
            handler: self.id.clone(),
            kind: DirectiveKind::ModifyArg,
            matches: count,
            generated,
            warnings: warning.into_iter().collect(),
        })
    }
}
