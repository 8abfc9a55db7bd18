use crate::{
    jvm::{Class, Method, Remapper},
    mixin::{
        context::HandlerContext,
        errors::{ApplyError, MemberId, ParseError},
        splice::{self, ApplyScope},
        validate,
    },
};

use super::{DirectiveKind, DirectiveReport, aliases, schema::AnnotationReader};

/// `@Overwrite`: replaces the body of the target method of the same name and descriptor.
#[derive(Debug, Clone)]
pub struct Overwrite {
    /// The handler, as declared in the mixin.
    pub handler: Method,
    /// The identity of the handler.
    pub id: MemberId,
    /// Names tried in order when the handler name matches nothing.
    pub aliases: Vec<String>,
}

impl Overwrite {
    pub(super) fn parse(
        reader: &AnnotationReader<'_>,
        handler: Method,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            aliases: aliases(reader)?,
            id: reader.site().clone(),
            handler,
        })
    }

    /// Returns the index of the overwritten method in `target`.
    #[must_use]
    pub fn resolve(&self, target: &Class, remapper: &Remapper) -> Option<usize> {
        let descriptor = remapper.map_descriptor(&self.handler.descriptor);
        std::iter::once(&self.handler.name)
            .chain(&self.aliases)
            .find_map(|name| {
                target
                    .methods
                    .iter()
                    .position(|it| it.name == *name && it.descriptor == descriptor)
            })
    }

    pub(super) fn apply(
        &self,
        target: &mut Class,
        scope: &ApplyScope<'_>,
        ctx: &mut HandlerContext,
    ) -> Result<DirectiveReport, ApplyError> {
        let index = self
            .resolve(target, scope.remapper)
            .ok_or_else(|| ApplyError::Selector {
                handler: self.id.clone(),
                target: target.binary_name.clone(),
            })?;
        validate::check_static_match(&self.handler, &target.methods[index], &self.id, target)?;
        let body = self
            .handler
            .body
            .as_ref()
            .ok_or_else(|| ApplyError::StructuralMismatch {
                handler: self.id.clone(),
                reason: "has no code to overwrite with".to_owned(),
            })?;
        let body = splice::copy_body(body, scope.remapper, ctx);
        let method = &mut target.methods[index];
        method.body = Some(body);
        log::debug!(
            "Overwrote {}.{}{} with {}",
            method.owner,
            method.name,
            method.descriptor,
            self.id
        );
        Ok(DirectiveReport {
            handler: self.id.clone(),
            kind: DirectiveKind::Overwrite,
            matches: 1,
            generated: None,
            warnings: Vec::new(),
        })
    }
}
