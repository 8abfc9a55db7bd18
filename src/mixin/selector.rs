//! Resolution of the members a directive applies to.
use std::str::FromStr;

use itertools::Itertools;

use crate::{
    jvm::{
        Class, Method, Remapper,
        method::MethodAccessFlags,
        references::{ClassRef, FieldRef, MethodRef},
    },
    types::{
        field_type::FieldType,
        method_descriptor::{InvalidDescriptor, MethodDescriptor},
    },
};

/// A textual member pattern: `*`, `name`, `name(desc)ret`, `Lowner;name(desc)ret` or
/// `Lowner;name:type`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberPattern {
    /// The binary name of the owner, if constrained.
    pub owner: Option<String>,
    /// The name of the member, [`None`] matches any name.
    pub name: Option<String>,
    /// The descriptor of a method member, if constrained.
    pub descriptor: Option<MethodDescriptor>,
    /// The type of a field member, if constrained.
    pub field_type: Option<FieldType>,
}

impl FromStr for MemberPattern {
    type Err = InvalidDescriptor;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDescriptor(pattern.to_owned());
        if pattern == "*" {
            return Ok(Self::default());
        }
        let owner_end = pattern.strip_prefix('L').and_then(|tail| {
            let semicolon = tail.find(';')?;
            tail.find('(')
                .is_none_or(|paren| semicolon < paren)
                .then_some(semicolon + 1)
        });
        let (owner, rest) = match owner_end {
            Some(end) => (Some(pattern[1..end].to_owned()), &pattern[end + 1..]),
            None => (None, pattern),
        };
        let (name, descriptor, field_type) = if let Some(paren) = rest.find('(') {
            let descriptor = MethodDescriptor::from_str(&rest[paren..])?;
            (&rest[..paren], Some(descriptor), None)
        } else if let Some((name, field_type)) = rest.split_once(':') {
            (name, None, Some(FieldType::from_str(field_type)?))
        } else {
            (rest, None, None)
        };
        if name.is_empty() && descriptor.is_none() && field_type.is_none() {
            return Err(invalid());
        }
        Ok(Self {
            owner,
            name: Some(name).filter(|it| !it.is_empty() && *it != "*").map(str::to_owned),
            descriptor,
            field_type,
        })
    }
}

impl MemberPattern {
    /// Creates a pattern matching exactly one method.
    #[must_use]
    pub fn method(owner: Option<String>, name: &str, descriptor: MethodDescriptor) -> Self {
        Self {
            owner,
            name: Some(name.to_owned()),
            descriptor: Some(descriptor),
            field_type: None,
        }
    }

    /// Translates the names in the pattern through `remapper`.
    /// Member names are only renamed when the owner is known.
    #[must_use]
    pub fn remapped(&self, remapper: &Remapper) -> Self {
        let name = match (&self.owner, &self.name, &self.descriptor, &self.field_type) {
            (Some(owner), Some(name), Some(descriptor), _) => Some(
                remapper
                    .map_method_ref(&MethodRef {
                        owner: ClassRef::new(owner.clone()),
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    })
                    .name,
            ),
            (Some(owner), Some(name), None, Some(field_type)) => Some(
                remapper
                    .map_field_ref(&FieldRef {
                        owner: ClassRef::new(owner.clone()),
                        name: name.clone(),
                        field_type: field_type.clone(),
                    })
                    .name,
            ),
            _ => self.name.clone(),
        };
        Self {
            owner: self.owner.as_deref().map(|it| remapper.map_class(it)),
            name,
            descriptor: self.descriptor.as_ref().map(|it| remapper.map_descriptor(it)),
            field_type: self.field_type.as_ref().map(|it| remapper.map_field_type(it)),
        }
    }

    /// Checks if an invoked method matches the pattern.
    #[must_use]
    pub fn matches_method(&self, method: &MethodRef) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|it| *it == method.owner.binary_name)
            && self.name.as_ref().is_none_or(|it| *it == method.name)
            && self
                .descriptor
                .as_ref()
                .is_none_or(|it| *it == method.descriptor)
            && self.field_type.is_none()
    }

    /// Checks if an accessed field matches the pattern.
    #[must_use]
    pub fn matches_field(&self, field: &FieldRef) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|it| *it == field.owner.binary_name)
            && self.name.as_ref().is_none_or(|it| *it == field.name)
            && self
                .field_type
                .as_ref()
                .is_none_or(|it| *it == field.field_type)
            && self.descriptor.is_none()
    }
}

/// Selects target methods for a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// Matches exactly the method described by `@Desc`.
    Desc(MemberPattern),
    /// Matches a string pattern, retrying with each alias in place of the name.
    String {
        /// The pattern.
        pattern: MemberPattern,
        /// Names tried in order when the pattern's own name matches nothing.
        aliases: Vec<String>,
    },
}

impl TargetSelector {
    /// Parses a string selector.
    /// # Errors
    /// - [`InvalidDescriptor`] if the pattern or its descriptor is malformed.
    pub fn parse(pattern: &str, aliases: Vec<String>) -> Result<Self, InvalidDescriptor> {
        Ok(Self::String {
            pattern: pattern.parse()?,
            aliases,
        })
    }

    /// Returns the indices of the methods of `target` selected by this selector.
    /// Resolution does not mutate the target and yields the same result every time.
    #[must_use]
    pub fn select_methods(&self, target: &Class, remapper: &Remapper) -> Vec<usize> {
        match self {
            Self::Desc(pattern) => select_with(target, &pattern.remapped(remapper)),
            Self::String { pattern, aliases } => {
                let pattern = pattern.remapped(remapper);
                let primary = select_with(target, &pattern);
                if !primary.is_empty() || pattern.name.is_none() {
                    return primary;
                }
                aliases
                    .iter()
                    .map(|alias| {
                        let aliased = MemberPattern {
                            name: Some(alias.clone()),
                            ..pattern.clone()
                        };
                        select_with(target, &aliased)
                    })
                    .find(|it| !it.is_empty())
                    .unwrap_or_default()
            }
        }
    }
}

fn select_with(target: &Class, pattern: &MemberPattern) -> Vec<usize> {
    if pattern
        .owner
        .as_ref()
        .is_some_and(|it| *it != target.binary_name)
    {
        return Vec::new();
    }
    target
        .methods
        .iter()
        .enumerate()
        .filter(|(_, method)| matches_declared(pattern, method))
        .map(|(index, _)| index)
        .collect()
}

fn matches_declared(pattern: &MemberPattern, method: &Method) -> bool {
    match &pattern.name {
        Some(name) => {
            *name == method.name
                && pattern
                    .descriptor
                    .as_ref()
                    .is_none_or(|it| *it == method.descriptor)
        }
        None => {
            !method.is_initializer()
                && !method.access_flags.contains(MethodAccessFlags::SYNTHETIC)
                && pattern
                    .descriptor
                    .as_ref()
                    .is_none_or(|it| *it == method.descriptor)
        }
    }
}

/// Resolves every selector against `target`, keeping the first occurrence of each method.
#[must_use]
pub fn select_all(selectors: &[TargetSelector], target: &Class, remapper: &Remapper) -> Vec<usize> {
    selectors
        .iter()
        .flat_map(|it| it.select_methods(target, remapper))
        .unique()
        .collect()
}

/// Finds a field of `target` by name, then by each alias. The type must match.
#[must_use]
pub fn select_field(
    target: &Class,
    names: &[String],
    field_type: &FieldType,
) -> Option<usize> {
    names.iter().find_map(|name| {
        target
            .fields
            .iter()
            .position(|it| it.name == *name && it.field_type == *field_type)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::{class::ClassAccessFlags, references::ClassRef};

    fn target() -> Class {
        let mut class = Class::new("org/example/Target", ClassAccessFlags::PUBLIC);
        for (name, desc, flags) in [
            ("run", "()V", MethodAccessFlags::PUBLIC),
            ("run", "(I)V", MethodAccessFlags::PUBLIC),
            ("obfuscated", "()I", MethodAccessFlags::PUBLIC),
            ("<init>", "()V", MethodAccessFlags::PUBLIC),
            ("bridge", "()V", MethodAccessFlags::SYNTHETIC),
        ] {
            class
                .add_method(Method {
                    access_flags: flags,
                    name: name.to_owned(),
                    descriptor: desc.parse().unwrap(),
                    owner: ClassRef::new("org/example/Target"),
                    body: None,
                    annotations: Vec::new(),
                })
                .unwrap();
        }
        class
    }

    fn select(pattern: &str, aliases: &[&str]) -> Vec<usize> {
        let aliases = aliases.iter().map(ToString::to_string).collect();
        TargetSelector::parse(pattern, aliases)
            .unwrap()
            .select_methods(&target(), &Remapper::new())
    }

    #[test]
    fn string_patterns() {
        assert_eq!(select("run", &[]), vec![0, 1]);
        assert_eq!(select("run(I)V", &[]), vec![1]);
        assert_eq!(select("Lorg/example/Target;run()V", &[]), vec![0]);
        assert_eq!(select("Lorg/example/Other;run()V", &[]), Vec::<usize>::new());
        assert_eq!(select("*", &[]), vec![0, 1, 2]);
        assert_eq!(select("missing", &[]), Vec::<usize>::new());
    }

    #[test]
    fn aliases_are_tried_in_order() {
        assert_eq!(select("renamed", &["absent", "obfuscated", "run"]), vec![2]);
        assert_eq!(select("run()V", &["obfuscated"]), vec![0]);
    }

    #[test]
    fn desc_selectors_are_remapped() {
        let mut remapper = Remapper::new();
        remapper
            .rename_class("named/Target", "org/example/Target")
            .rename_method("named/Target", "compute", "()I", "obfuscated");
        let selector = TargetSelector::Desc(MemberPattern::method(
            Some("named/Target".to_owned()),
            "compute",
            "()I".parse().unwrap(),
        ));
        assert_eq!(selector.select_methods(&target(), &remapper), vec![2]);
        assert_eq!(
            selector.select_methods(&target(), &Remapper::new()),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn select_all_deduplicates() {
        let selectors = vec![
            TargetSelector::parse("run", vec![]).unwrap(),
            TargetSelector::parse("run()V", vec![]).unwrap(),
        ];
        assert_eq!(select_all(&selectors, &target(), &Remapper::new()), vec![0, 1]);
    }

    #[test]
    fn pattern_parsing() {
        let pattern: MemberPattern = "Ljava/io/PrintStream;println(Ljava/lang/String;)V"
            .parse()
            .unwrap();
        assert_eq!(pattern.owner.as_deref(), Some("java/io/PrintStream"));
        assert_eq!(pattern.name.as_deref(), Some("println"));
        let field: MemberPattern = "Lorg/example/Target;counter:I".parse().unwrap();
        assert_eq!(field.field_type, Some("I".parse().unwrap()));
        assert!(MemberPattern::from_str("").is_err());
        assert!(MemberPattern::from_str("run(I").is_err());
    }
}
