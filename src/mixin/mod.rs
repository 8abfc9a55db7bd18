//! The mixin engine.
//!
//! A [`MixinClass`] is parsed once from an annotated class. Applying it to a target merges
//! its members, then applies its [`Directive`]s in declaration order. Application is
//! transactional: the target is only replaced once every step has succeeded.

use crate::{
    jvm::{Annotation, Class, Field, Method, Remapper, references::ClassRef},
    macros::fill_once,
    types::field_type::FieldType,
};

pub mod callback;
pub mod context;
pub mod directive;
pub mod errors;
pub mod injection_point;
pub mod selector;
pub(crate) mod splice;
mod transformer;
mod validate;

pub use context::{HandlerContext, TransformerConfig};
pub use directive::{Directive, DirectiveKind, DirectiveReport};
pub use errors::{ApplyError, MemberId, MixinWarning, ParseError};
pub use transformer::{MixinTransformer, TransformReport};

use directive::schema::{self, AnnotationReader};
use splice::ApplyScope;

/// The priority of a mixin that does not declare one.
pub const DEFAULT_PRIORITY: i32 = 1000;

const MIXIN_PACKAGE: &str = "org/spongepowered/asm/mixin/";

/// How a non-directive member of a mixin is merged into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    /// `@Shadow`: the member must already exist in the target, under its name or an alias.
    Shadow {
        /// Names tried in order when the member's own name matches nothing.
        aliases: Vec<String>,
    },
    /// `@Unique`: the member is added, renamed if the target already has one of that name.
    Unique,
    /// The member is added; a collision is fatal.
    Plain,
}

impl MemberRole {
    fn parse(annotations: &[Annotation], site: &MemberId) -> Result<Self, ParseError> {
        let mut role = None;
        for annotation in annotations {
            let name = annotation.annotation_type.binary_name.as_str();
            let parsed = if name == schema::SHADOW.binary_name {
                let reader = AnnotationReader::new(&schema::SHADOW, annotation, site)?;
                Self::Shadow {
                    aliases: directive::aliases(&reader)?,
                }
            } else if name == schema::UNIQUE.binary_name {
                AnnotationReader::new(&schema::UNIQUE, annotation, site)?;
                Self::Unique
            } else {
                continue;
            };
            fill_once!(role, parsed, ParseError::ConflictingDirectives(site.clone()));
        }
        Ok(role.unwrap_or(Self::Plain))
    }
}

/// A parsed mixin class.
#[derive(Debug, Clone)]
pub struct MixinClass {
    class: Class,
    targets: Vec<String>,
    priority: i32,
    fields: Vec<(Field, MemberRole)>,
    methods: Vec<(Method, MemberRole)>,
    directives: Vec<Directive>,
}

/// What applying one mixin to one target did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// The binary name of the mixin class.
    pub mixin: String,
    /// The binary name of the target class.
    pub target: String,
    /// One report per directive, in application order.
    pub directives: Vec<DirectiveReport>,
}

impl ApplyReport {
    /// Iterates over the warnings of every directive.
    pub fn warnings(&self) -> impl Iterator<Item = &MixinWarning> {
        self.directives.iter().flat_map(|it| &it.warnings)
    }
}

fn strip_mixin_annotations(annotations: &[Annotation]) -> Vec<Annotation> {
    annotations
        .iter()
        .filter(|it| !it.annotation_type.binary_name.starts_with(MIXIN_PACKAGE))
        .cloned()
        .collect()
}

impl MixinClass {
    /// Parses the directives and member roles of an annotated class.
    /// Constructors and static initializers of the mixin are not merged.
    /// # Errors
    /// See [`ParseError`].
    pub fn parse(class: Class) -> Result<Self, ParseError> {
        let site = MemberId::class(&class.binary_name);
        let annotation = class
            .annotation(schema::MIXIN.binary_name)
            .ok_or_else(|| ParseError::MissingMixin(class.binary_name.clone()))?;
        let reader = AnnotationReader::new(&schema::MIXIN, annotation, &site)?;
        let mut targets = Vec::new();
        for value in reader.classes("value")?.unwrap_or_default() {
            match value {
                FieldType::Object(ClassRef { binary_name }) => {
                    targets.push(binary_name.clone());
                }
                other => {
                    return Err(ParseError::InvalidValue {
                        key: "value",
                        site: site.clone(),
                        value: other.descriptor(),
                    });
                }
            }
        }
        targets.extend(
            reader
                .strings("targets")?
                .unwrap_or_default()
                .into_iter()
                .map(|it| it.replace('.', "/")),
        );
        if targets.is_empty() {
            return Err(ParseError::NoSelectors(site.clone()));
        }
        let priority = reader.int("priority")?.unwrap_or(DEFAULT_PRIORITY);

        let mut fields = Vec::with_capacity(class.fields.len());
        for field in &class.fields {
            let role = MemberRole::parse(
                &field.annotations,
                &MemberId::field(&class.binary_name, field),
            )?;
            fields.push((field.clone(), role));
        }
        let mut methods = Vec::with_capacity(class.methods.len());
        let mut directives = Vec::new();
        for method in &class.methods {
            if let Some(directive) = Directive::parse(&class.binary_name, method)? {
                directives.push(directive);
                continue;
            }
            let role = MemberRole::parse(
                &method.annotations,
                &MemberId::method(&class.binary_name, method),
            )?;
            if !method.is_initializer() {
                methods.push((method.clone(), role));
            }
        }
        Ok(Self {
            class,
            targets,
            priority,
            fields,
            methods,
            directives,
        })
    }

    /// Returns the binary name of the mixin class.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.class.binary_name
    }

    /// Returns the binary names of the classes the mixin applies to.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Returns the priority. Mixins with lower priorities are applied first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the directives, in declaration order.
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Checks if the mixin applies to the class with the given binary name, once its target
    /// names are translated through `remapper`.
    #[must_use]
    pub fn applies_to(&self, binary_name: &str, remapper: &Remapper) -> bool {
        self.targets
            .iter()
            .any(|it| remapper.map_class(it) == binary_name)
    }

    /// Applies the mixin to `target`.
    /// On error `target` is left exactly as it was.
    /// # Errors
    /// See [`ApplyError`].
    pub fn apply_to(
        &self,
        target: &mut Class,
        remapper: &Remapper,
        ctx: &mut HandlerContext,
    ) -> Result<ApplyReport, ApplyError> {
        let mut working = target.clone();
        let mut remapper = remapper.clone();
        remapper.rename_class(self.name(), working.binary_name.clone());
        self.register_renames(&working, &mut remapper, ctx)?;

        for (field, role) in &self.fields {
            if matches!(role, MemberRole::Shadow { .. }) {
                continue;
            }
            let mapped = remapper.map_field_ref(&field.make_ref(self.class.make_ref()));
            let merged = Field {
                access_flags: field.access_flags,
                name: mapped.name,
                field_type: mapped.field_type,
                annotations: strip_mixin_annotations(&field.annotations),
            };
            working
                .add_field(merged)
                .map_err(|_| ApplyError::DuplicateMember {
                    member: MemberId::field(self.name(), field),
                    target: working.binary_name.clone(),
                })?;
        }
        for (method, role) in &self.methods {
            if matches!(role, MemberRole::Shadow { .. }) {
                continue;
            }
            let Some(body) = &method.body else {
                continue;
            };
            let mapped = remapper.map_method_ref(&method.make_ref());
            let merged = Method {
                access_flags: method.access_flags,
                name: mapped.name,
                descriptor: mapped.descriptor,
                owner: working.make_ref(),
                body: Some(splice::copy_body(body, &remapper, ctx)),
                annotations: strip_mixin_annotations(&method.annotations),
            };
            working
                .add_method(merged)
                .map_err(|_| ApplyError::DuplicateMember {
                    member: MemberId::method(self.name(), method),
                    target: working.binary_name.clone(),
                })?;
        }
        for interface in &self.class.interfaces {
            let interface = remapper.map_class_ref(interface);
            if !working.interfaces.contains(&interface) {
                working.interfaces.push(interface);
            }
        }

        let scope = ApplyScope {
            mixin: self.name(),
            remapper: &remapper,
        };
        let mut directives = Vec::with_capacity(self.directives.len());
        for directive in &self.directives {
            directives.push(directive.apply(&mut working, &scope, ctx)?);
        }
        working
            .verify()
            .map_err(|source| ApplyError::MalformedClass {
                mixin: self.name().to_owned(),
                source,
            })?;
        *target = working;
        log::info!(
            "Applied mixin {} to {} ({} directives)",
            self.name(),
            target.binary_name,
            directives.len()
        );
        Ok(ApplyReport {
            mixin: self.name().to_owned(),
            target: target.binary_name.clone(),
            directives,
        })
    }

    /// Resolves shadows, renames colliding unique members and records overwrite aliases.
    fn register_renames(
        &self,
        target: &Class,
        remapper: &mut Remapper,
        ctx: &mut HandlerContext,
    ) -> Result<(), ApplyError> {
        let mixin = self.name();
        for (field, role) in &self.fields {
            let field_type = remapper.map_field_type(&field.field_type);
            match role {
                MemberRole::Shadow { aliases } => {
                    let names: Vec<String> = std::iter::once(field.name.clone())
                        .chain(aliases.iter().cloned())
                        .collect();
                    let index = selector::select_field(target, &names, &field_type).ok_or_else(
                        || ApplyError::Selector {
                            handler: MemberId::field(mixin, field),
                            target: target.binary_name.clone(),
                        },
                    )?;
                    let found = &target.fields[index].name;
                    if *found != field.name {
                        remapper.rename_field(mixin, field.name.clone(), found.clone());
                    }
                }
                MemberRole::Unique if target.get_field(&field.name).is_some() => {
                    let renamed = loop {
                        let candidate = ctx.next_name("unique", &field.name);
                        if target.get_field(&candidate).is_none() {
                            break candidate;
                        }
                    };
                    remapper.rename_field(mixin, field.name.clone(), renamed);
                }
                MemberRole::Unique | MemberRole::Plain => {}
            }
        }
        for (method, role) in &self.methods {
            let descriptor = remapper.map_descriptor(&method.descriptor);
            match role {
                MemberRole::Shadow { aliases } => {
                    let found = std::iter::once(&method.name)
                        .chain(aliases)
                        .find(|name| target.get_method(name, &descriptor).is_some())
                        .ok_or_else(|| ApplyError::Selector {
                            handler: MemberId::method(mixin, method),
                            target: target.binary_name.clone(),
                        })?;
                    if *found != method.name {
                        remapper.rename_method(
                            mixin,
                            method.name.clone(),
                            method.descriptor.to_string(),
                            found.clone(),
                        );
                    }
                }
                MemberRole::Unique if target.get_method(&method.name, &descriptor).is_some() => {
                    let renamed = loop {
                        let candidate = ctx.next_name("unique", &method.name);
                        if target.get_method(&candidate, &descriptor).is_none() {
                            break candidate;
                        }
                    };
                    remapper.rename_method(
                        mixin,
                        method.name.clone(),
                        method.descriptor.to_string(),
                        renamed,
                    );
                }
                MemberRole::Unique | MemberRole::Plain => {}
            }
        }
        for directive in &self.directives {
            let Directive::Overwrite(overwrite) = directive else {
                continue;
            };
            if let Some(index) = overwrite.resolve(target, remapper) {
                let found = &target.methods[index].name;
                if *found != overwrite.handler.name {
                    remapper.rename_method(
                        mixin,
                        overwrite.handler.name.clone(),
                        overwrite.handler.descriptor.to_string(),
                        found.clone(),
                    );
                }
            }
        }
        Ok(())
    }
}
