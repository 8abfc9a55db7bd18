//! Directives: the typed form of the annotations on mixin handlers.
use crate::{
    jvm::{
        Annotation, Class, Method,
        annotation::ElementValue,
        references::ClassRef,
    },
    macros::fill_once,
    types::{
        field_type::FieldType,
        method_descriptor::{MethodDescriptor, ReturnType},
    },
};

use super::{
    context::HandlerContext,
    errors::{ApplyError, MemberId, MixinWarning, ParseError},
    injection_point::{AtKind, InjectionPoint, Shift, Slice},
    selector::{MemberPattern, TargetSelector},
    splice::ApplyScope,
    validate,
};

mod inject;
mod modify_arg;
mod modify_variable;
mod overwrite;
mod redirect;
pub mod schema;

pub use inject::Inject;
pub use modify_arg::ModifyArg;
pub use modify_variable::ModifyVariable;
pub use overwrite::Overwrite;
pub use redirect::Redirect;

use schema::{AnnotationReader, Schema};

/// The kinds of directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DirectiveKind {
    /// `@Inject`
    #[display("inject")]
    Inject,
    /// `@Redirect`
    #[display("redirect")]
    Redirect,
    /// `@Overwrite`
    #[display("overwrite")]
    Overwrite,
    /// `@ModifyArg`
    #[display("modifyarg")]
    ModifyArg,
    /// `@ModifyVariable`
    #[display("modifyvariable")]
    ModifyVariable,
}

impl DirectiveKind {
    /// Every directive kind.
    pub const ALL: [Self; 5] = [
        Self::Inject,
        Self::Redirect,
        Self::Overwrite,
        Self::ModifyArg,
        Self::ModifyVariable,
    ];

    /// Returns the schema of the annotation declaring this kind.
    #[must_use]
    pub const fn schema(self) -> &'static Schema {
        match self {
            Self::Inject => &schema::INJECT,
            Self::Redirect => &schema::REDIRECT,
            Self::Overwrite => &schema::OVERWRITE,
            Self::ModifyArg => &schema::MODIFY_ARG,
            Self::ModifyVariable => &schema::MODIFY_VARIABLE,
        }
    }

    /// Checks if the kind splices calls to a handler copy at injection points.
    #[must_use]
    pub const fn is_injector(self) -> bool {
        !matches!(self, Self::Overwrite)
    }
}

/// One parsed directive, owning a copy of its handler method.
#[derive(Debug, Clone)]
pub enum Directive {
    /// Calls the handler at injection points, optionally cancelling the target.
    Inject(Inject),
    /// Replaces a call with a call to the handler.
    Redirect(Redirect),
    /// Replaces the body of the target with the body of the handler.
    Overwrite(Overwrite),
    /// Routes an argument of a call through the handler.
    ModifyArg(ModifyArg),
    /// Routes a local variable through the handler.
    ModifyVariable(ModifyVariable),
}

/// What applying one directive did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveReport {
    /// The handler of the directive.
    pub handler: MemberId,
    /// The kind of the directive.
    pub kind: DirectiveKind,
    /// The number of injection points found across all target methods.
    pub matches: usize,
    /// The name of the handler copy added to the target, if any.
    pub generated: Option<String>,
    /// The advisory violations.
    pub warnings: Vec<MixinWarning>,
}

impl Directive {
    /// Reads the directive declared on `method` of the mixin class `mixin`.
    /// Returns [`None`] if the method carries no directive annotation.
    /// # Errors
    /// See [`ParseError`].
    pub fn parse(mixin: &str, method: &Method) -> Result<Option<Self>, ParseError> {
        let site = MemberId::method(mixin, method);
        let mut found = None;
        for annotation in &method.annotations {
            let kind = DirectiveKind::ALL
                .into_iter()
                .find(|it| it.schema().binary_name == annotation.annotation_type.binary_name);
            if let Some(kind) = kind {
                fill_once!(
                    found,
                    (kind, annotation),
                    ParseError::ConflictingDirectives(site.clone())
                );
            }
        }
        let Some((kind, annotation)) = found else {
            return Ok(None);
        };
        let reader = AnnotationReader::new(kind.schema(), annotation, &site)?;
        let handler = method.clone();
        let directive = match kind {
            DirectiveKind::Inject => Self::Inject(Inject::parse(&reader, handler)?),
            DirectiveKind::Redirect => Self::Redirect(Redirect::parse(&reader, handler)?),
            DirectiveKind::Overwrite => Self::Overwrite(Overwrite::parse(&reader, handler)?),
            DirectiveKind::ModifyArg => Self::ModifyArg(ModifyArg::parse(&reader, handler)?),
            DirectiveKind::ModifyVariable => {
                Self::ModifyVariable(ModifyVariable::parse(&reader, handler)?)
            }
        };
        Ok(Some(directive))
    }

    /// Returns the kind of the directive.
    #[must_use]
    pub const fn kind(&self) -> DirectiveKind {
        match self {
            Self::Inject(_) => DirectiveKind::Inject,
            Self::Redirect(_) => DirectiveKind::Redirect,
            Self::Overwrite(_) => DirectiveKind::Overwrite,
            Self::ModifyArg(_) => DirectiveKind::ModifyArg,
            Self::ModifyVariable(_) => DirectiveKind::ModifyVariable,
        }
    }

    /// Returns the handler method, as declared in the mixin class.
    #[must_use]
    pub const fn handler(&self) -> &Method {
        match self {
            Self::Inject(it) => &it.handler,
            Self::Redirect(it) => &it.handler,
            Self::Overwrite(it) => &it.handler,
            Self::ModifyArg(it) => &it.handler,
            Self::ModifyVariable(it) => &it.handler,
        }
    }

    /// Applies the directive to `target`.
    /// Every check runs before the first mutation; callers still work on a copy of the class
    /// so that a later directive of the same mixin can roll this one back.
    pub(crate) fn apply(
        &self,
        target: &mut Class,
        scope: &ApplyScope<'_>,
        ctx: &mut HandlerContext,
    ) -> Result<DirectiveReport, ApplyError> {
        match self {
            Self::Inject(it) => it.apply(target, scope, ctx),
            Self::Redirect(it) => it.apply(target, scope, ctx),
            Self::Overwrite(it) => it.apply(target, scope, ctx),
            Self::ModifyArg(it) => it.apply(target, scope, ctx),
            Self::ModifyVariable(it) => it.apply(target, scope, ctx),
        }
    }
}

/// The attributes shared by the directives that splice at injection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorSpec {
    /// Selects the target methods.
    pub selectors: Vec<TargetSelector>,
    /// The injection points.
    pub at: Vec<InjectionPoint>,
    /// Bounds the injection points.
    pub slice: Option<Slice>,
    /// The fatal minimum number of injection points, `-1` disables the check.
    pub require: i32,
    /// The advisory minimum number of injection points, `-1` disables the check.
    pub expect: i32,
}

/// The injection points of an injector in the target methods.
#[derive(Debug, Clone)]
pub(crate) struct Located {
    /// Target method indices with at least one anchor, and their anchors in program order.
    pub targets: Vec<(usize, Vec<crate::jvm::code::InsnId>)>,
    /// The total number of anchors.
    pub count: usize,
}

impl InjectorSpec {
    fn parse(reader: &AnnotationReader<'_>, kind: DirectiveKind) -> Result<Self, ParseError> {
        let site = reader.site();
        let mut selectors = Vec::new();
        for desc in reader.annotations("target")?.unwrap_or_default() {
            selectors.push(TargetSelector::Desc(parse_desc(desc, site)?));
        }
        for pattern in reader.strings("method")?.unwrap_or_default() {
            let selector = TargetSelector::parse(pattern, Vec::new()).map_err(|source| {
                ParseError::InvalidDescriptor {
                    site: site.clone(),
                    source,
                }
            })?;
            selectors.push(selector);
        }
        if selectors.is_empty() {
            return Err(ParseError::NoSelectors(site.clone()));
        }
        let at = if kind == DirectiveKind::Inject {
            reader
                .annotations("at")?
                .unwrap_or_default()
                .into_iter()
                .map(|it| parse_at(it, site))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            reader
                .annotation("at")?
                .map(|it| parse_at(it, site))
                .transpose()?
                .into_iter()
                .collect()
        };
        if at.is_empty() {
            return Err(ParseError::MissingAt {
                kind,
                site: site.clone(),
            });
        }
        let slice = reader
            .single_annotation("slice")?
            .map(|it| parse_slice(it, site))
            .transpose()?;
        Ok(Self {
            selectors,
            at,
            slice,
            require: reader.int("require")?.unwrap_or(-1),
            expect: reader.int("expect")?.unwrap_or(-1),
        })
    }

    /// Resolves the target methods and the anchors in each of them.
    /// # Errors
    /// - [`ApplyError::Selector`] if no method is selected.
    /// - [`ApplyError::Compatibility`] if a matched target disagrees with the handler on
    ///   `static`.
    /// - [`ApplyError::StructuralMismatch`] if an injection point cannot be resolved.
    pub(crate) fn locate(
        &self,
        handler: &Method,
        id: &MemberId,
        target: &Class,
        scope: &ApplyScope<'_>,
    ) -> Result<Located, ApplyError> {
        let methods = super::selector::select_all(&self.selectors, target, scope.remapper);
        if methods.is_empty() {
            return Err(ApplyError::Selector {
                handler: id.clone(),
                target: target.binary_name.clone(),
            });
        }
        let mut targets = Vec::with_capacity(methods.len());
        let mut count = 0;
        for index in methods {
            let method = &target.methods[index];
            let Some(body) = &method.body else {
                continue;
            };
            let mut anchors = Vec::new();
            for point in &self.at {
                let resolved = point
                    .resolve(&body.instructions, scope.remapper, self.slice.as_ref())
                    .map_err(|err| ApplyError::StructuralMismatch {
                        handler: id.clone(),
                        reason: err.to_string(),
                    })?;
                for anchor in resolved {
                    if !anchors.contains(&anchor) {
                        anchors.push(anchor);
                    }
                }
            }
            if anchors.is_empty() {
                continue;
            }
            validate::check_static_match(handler, method, id, target)?;
            count += anchors.len();
            targets.push((index, anchors));
        }
        Ok(Located { targets, count })
    }
}

fn class_name(value: &ReturnType) -> Option<String> {
    match value {
        ReturnType::Some(FieldType::Object(ClassRef { binary_name })) => {
            Some(binary_name.clone())
        }
        _ => None,
    }
}

/// Reads `@Desc` into a pattern matching exactly one method.
pub(crate) fn parse_desc(
    annotation: &Annotation,
    site: &MemberId,
) -> Result<MemberPattern, ParseError> {
    let reader = AnnotationReader::new(&schema::DESC, annotation, site)?;
    let name = reader.string("value")?.ok_or_else(|| ParseError::InvalidValue {
        key: "value",
        site: site.clone(),
        value: "missing".to_owned(),
    })?;
    let owner = reader
        .class("owner")?
        .map(|it| {
            class_name(it).ok_or_else(|| ParseError::InvalidValue {
                key: "owner",
                site: site.clone(),
                value: it.descriptor(),
            })
        })
        .transpose()?;
    let args = reader
        .classes("args")?
        .unwrap_or_default()
        .into_iter()
        .cloned()
        .collect();
    let ret = reader.class("ret")?.cloned().unwrap_or(ReturnType::Void);
    Ok(MemberPattern::method(
        owner,
        name,
        MethodDescriptor::new(args, ret),
    ))
}

/// Reads `@At`.
pub(crate) fn parse_at(
    annotation: &Annotation,
    site: &MemberId,
) -> Result<InjectionPoint, ParseError> {
    let reader = AnnotationReader::new(&schema::AT, annotation, site)?;
    let invalid = |key: &'static str, value: String| ParseError::InvalidValue {
        key,
        site: site.clone(),
        value,
    };
    let value = reader
        .string("value")?
        .ok_or_else(|| invalid("value", "missing".to_owned()))?;
    let kind: AtKind = value
        .parse()
        .map_err(|value| ParseError::UnknownInjectionPoint {
            value,
            site: site.clone(),
        })?;
    let target = match (reader.string("target")?, reader.annotation("desc")?) {
        (Some(_), Some(_)) => {
            return Err(invalid("desc", "both target and desc are set".to_owned()));
        }
        (Some(pattern), None) => Some(pattern.parse().map_err(|source| {
            ParseError::InvalidDescriptor {
                site: site.clone(),
                source,
            }
        })?),
        (None, Some(desc)) => Some(parse_desc(desc, site)?),
        (None, None) => None,
    };
    let shift = match reader.enum_constant("shift")? {
        None | Some("BEFORE") => Shift::Before,
        Some("AFTER") => Shift::After,
        Some("BY") => Shift::By(reader.int("by")?.unwrap_or(0)),
        Some(other) => return Err(invalid("shift", other.to_owned())),
    };
    let opcode = reader
        .int("opcode")?
        .filter(|it| *it >= 0)
        .map(|it| u8::try_from(it).map_err(|_| invalid("opcode", it.to_string())))
        .transpose()?;
    Ok(InjectionPoint {
        kind,
        target,
        ordinal: reader.int("ordinal")?.unwrap_or(-1),
        shift,
        opcode,
    })
}

/// Reads `@Slice`.
pub(crate) fn parse_slice(annotation: &Annotation, site: &MemberId) -> Result<Slice, ParseError> {
    let reader = AnnotationReader::new(&schema::SLICE, annotation, site)?;
    Ok(Slice {
        from: reader.annotation("from")?.map(|it| parse_at(it, site)).transpose()?,
        to: reader.annotation("to")?.map(|it| parse_at(it, site)).transpose()?,
    })
}

/// Reads a string array holding aliases.
pub(crate) fn aliases(reader: &AnnotationReader<'_>) -> Result<Vec<String>, ParseError> {
    Ok(reader
        .strings("aliases")?
        .unwrap_or_default()
        .into_iter()
        .map(str::to_owned)
        .collect())
}

/// Builds an `@At` annotation, for tests and for hosts that synthesize mixins.
#[must_use]
pub fn at(value: &str) -> Annotation {
    Annotation::new(schema::AT.binary_name).with("value", ElementValue::string(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::method::MethodAccessFlags;

    fn handler(annotations: Vec<Annotation>) -> Method {
        Method {
            access_flags: MethodAccessFlags::PRIVATE,
            name: "onCall".to_owned(),
            descriptor: "()V".parse().unwrap(),
            owner: ClassRef::new("org/example/MixinClass"),
            body: None,
            annotations,
        }
    }

    fn redirect() -> Annotation {
        Annotation::new(schema::REDIRECT.binary_name)
            .with(
                "at",
                ElementValue::AnnotationInterface(
                    at("INVOKE").with("target", ElementValue::string("helper()V")),
                ),
            )
            .with("method", ElementValue::strings(["run"]))
    }

    fn parse(annotations: Vec<Annotation>) -> Result<Option<Directive>, ParseError> {
        Directive::parse("org/example/MixinClass", &handler(annotations))
    }

    #[test]
    fn plain_methods_have_no_directive() {
        assert!(parse(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn redirect_is_parsed() {
        let Some(Directive::Redirect(redirect)) = parse(vec![redirect()]).unwrap() else {
            panic!("expected a redirect");
        };
        assert_eq!(redirect.spec.require, -1);
        assert_eq!(redirect.spec.expect, -1);
        assert_eq!(redirect.spec.at[0].kind, AtKind::Invoke);
        assert_eq!(redirect.spec.selectors.len(), 1);
    }

    #[test]
    fn two_directives_conflict() {
        let overwrite = Annotation::new(schema::OVERWRITE.binary_name);
        assert!(matches!(
            parse(vec![redirect(), overwrite]),
            Err(ParseError::ConflictingDirectives(_))
        ));
    }

    #[test]
    fn missing_at_is_rejected() {
        let annotation = Annotation::new(schema::REDIRECT.binary_name)
            .with("method", ElementValue::strings(["run"]));
        let err = parse(vec![annotation]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAt {
                kind: DirectiveKind::Redirect,
                ..
            }
        ));
        assert!(err.to_string().contains("future version"));
    }

    #[test]
    fn missing_selectors_are_rejected() {
        let annotation = Annotation::new(schema::REDIRECT.binary_name)
            .with("at", ElementValue::AnnotationInterface(at("INVOKE")));
        let err = parse(vec![annotation]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No available selectors: Mixin org/example/MixinClass.onCall()V does not match anything and is not a valid mixin."
        );
    }

    #[test]
    fn redirect_rejects_slice() {
        let annotation = redirect().with(
            "slice",
            ElementValue::AnnotationInterface(Annotation::new(schema::SLICE.binary_name)),
        );
        assert!(matches!(
            parse(vec![annotation]),
            Err(ParseError::UnknownKey { key, .. }) if key == "slice"
        ));
    }

    #[test]
    fn unknown_injection_point() {
        let annotation = Annotation::new(schema::REDIRECT.binary_name)
            .with("at", ElementValue::AnnotationInterface(at("CONSTANT")))
            .with("method", ElementValue::strings(["run"]));
        assert!(matches!(
            parse(vec![annotation]),
            Err(ParseError::UnknownInjectionPoint { value, .. }) if value == "CONSTANT"
        ));
    }

    #[test]
    fn at_shift_and_desc() {
        let site = MemberId::class("org/example/MixinClass");
        let desc = Annotation::new(schema::DESC.binary_name)
            .with("value", ElementValue::string("helper"))
            .with(
                "owner",
                ElementValue::Class {
                    return_descriptor: "Lorg/example/Target;".parse().unwrap(),
                },
            )
            .with(
                "args",
                ElementValue::Array(vec![ElementValue::Class {
                    return_descriptor: "I".parse().unwrap(),
                }]),
            );
        let annotation = at("INVOKE")
            .with("desc", ElementValue::AnnotationInterface(desc))
            .with(
                "shift",
                ElementValue::EnumConstant {
                    enum_type_name: "Lorg/spongepowered/asm/mixin/injection/At$Shift;".to_owned(),
                    const_name: "BY".to_owned(),
                },
            )
            .with("by", ElementValue::int(-2));
        let point = parse_at(&annotation, &site).unwrap();
        assert_eq!(point.shift, Shift::By(-2));
        let target = point.target.unwrap();
        assert_eq!(target.owner.as_deref(), Some("org/example/Target"));
        assert_eq!(target.descriptor, Some("(I)V".parse().unwrap()));
    }
}
