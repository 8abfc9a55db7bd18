//! The recognized keys of every mixin annotation, and a reader that enforces them.
use crate::{
    jvm::{Annotation, annotation::ElementValue},
    macros::fill_once,
    mixin::errors::{MemberId, ParseError},
    types::{field_type::FieldType, method_descriptor::ReturnType},
};

/// The schema of one annotation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// The simple name, used in diagnostics.
    pub name: &'static str,
    /// The binary name of the annotation type.
    pub binary_name: &'static str,
    /// Every key the annotation may carry.
    pub keys: &'static [&'static str],
}

macro_rules! schema {
    ($id:ident, $name:literal, $binary_name:literal, [$($key:literal),* $(,)?]) => {
        #[doc = concat!("`@", $name, "`")]
        pub const $id: Schema = Schema {
            name: $name,
            binary_name: $binary_name,
            keys: &[$($key),*],
        };
    };
}

schema!(MIXIN, "Mixin", "org/spongepowered/asm/mixin/Mixin", ["value", "targets", "priority"]);
schema!(SHADOW, "Shadow", "org/spongepowered/asm/mixin/Shadow", ["aliases"]);
schema!(UNIQUE, "Unique", "org/spongepowered/asm/mixin/Unique", []);
schema!(OVERWRITE, "Overwrite", "org/spongepowered/asm/mixin/Overwrite", ["aliases"]);
schema!(
    INJECT,
    "Inject",
    "org/spongepowered/asm/mixin/injection/Inject",
    ["at", "target", "method", "slice", "cancellable", "require", "expect"]
);
schema!(
    REDIRECT,
    "Redirect",
    "org/spongepowered/asm/mixin/injection/Redirect",
    ["at", "target", "method", "require", "expect"]
);
schema!(
    MODIFY_ARG,
    "ModifyArg",
    "org/spongepowered/asm/mixin/injection/ModifyArg",
    ["at", "target", "method", "slice", "index", "require", "expect"]
);
schema!(
    MODIFY_VARIABLE,
    "ModifyVariable",
    "org/spongepowered/asm/mixin/injection/ModifyVariable",
    ["at", "target", "method", "slice", "index", "require", "expect"]
);
schema!(
    AT,
    "At",
    "org/spongepowered/asm/mixin/injection/At",
    ["value", "target", "desc", "ordinal", "shift", "by", "opcode"]
);
schema!(
    DESC,
    "Desc",
    "org/spongepowered/asm/mixin/injection/Desc",
    ["value", "owner", "args", "ret"]
);
schema!(SLICE, "Slice", "org/spongepowered/asm/mixin/injection/Slice", ["from", "to"]);

/// Typed access to the elements of an annotation checked against a [`Schema`].
#[derive(Debug)]
pub(crate) struct AnnotationReader<'a> {
    schema: &'static Schema,
    site: &'a MemberId,
    values: Vec<Option<&'a ElementValue>>,
}

impl<'a> AnnotationReader<'a> {
    /// Checks the keys of `annotation`: each must be in the schema and occur once.
    pub fn new(
        schema: &'static Schema,
        annotation: &'a Annotation,
        site: &'a MemberId,
    ) -> Result<Self, ParseError> {
        let mut values = vec![None; schema.keys.len()];
        for (key, value) in &annotation.element_value_pairs {
            let slot = schema
                .keys
                .iter()
                .position(|it| *it == key.as_str())
                .ok_or_else(|| ParseError::UnknownKey {
                    annotation: schema.name,
                    key: key.clone(),
                    site: site.clone(),
                })?;
            fill_once!(
                values[slot],
                value,
                ParseError::DuplicateKey {
                    annotation: schema.name,
                    key: key.clone(),
                    site: site.clone(),
                }
            );
        }
        Ok(Self {
            schema,
            site,
            values,
        })
    }

    pub fn site(&self) -> &'a MemberId {
        self.site
    }

    fn raw(&self, key: &'static str) -> Option<&'a ElementValue> {
        let slot = self.schema.keys.iter().position(|it| *it == key)?;
        self.values[slot]
    }

    fn wrong_shape(
        &self,
        key: &'static str,
        expected: &'static str,
        found: &ElementValue,
    ) -> ParseError {
        ParseError::WrongShape {
            annotation: self.schema.name,
            key,
            site: self.site.clone(),
            expected,
            found: found.shape(),
        }
    }

    fn read<T>(
        &self,
        key: &'static str,
        expected: &'static str,
        extract: impl Fn(&'a ElementValue) -> Option<T>,
    ) -> Result<Option<T>, ParseError> {
        self.raw(key)
            .map(|value| extract(value).ok_or_else(|| self.wrong_shape(key, expected, value)))
            .transpose()
    }

    fn read_array<T>(
        &self,
        key: &'static str,
        expected: &'static str,
        extract: impl Fn(&'a ElementValue) -> Option<T>,
    ) -> Result<Option<Vec<T>>, ParseError> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        let ElementValue::Array(items) = value else {
            return Err(self.wrong_shape(key, expected, value));
        };
        items
            .iter()
            .map(|it| extract(it).ok_or_else(|| self.wrong_shape(key, expected, it)))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub fn int(&self, key: &'static str) -> Result<Option<i32>, ParseError> {
        self.read(key, "an int", |it| match it {
            ElementValue::Primitive(_, crate::jvm::code::ConstantValue::Integer(value)) => {
                Some(*value)
            }
            _ => None,
        })
    }

    pub fn boolean(&self, key: &'static str) -> Result<Option<bool>, ParseError> {
        self.int(key).map(|it| it.map(|value| value != 0))
    }

    pub fn string(&self, key: &'static str) -> Result<Option<&'a str>, ParseError> {
        self.read(key, "a string", |it| match it {
            ElementValue::String(value) => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn strings(&self, key: &'static str) -> Result<Option<Vec<&'a str>>, ParseError> {
        self.read_array(key, "an array of strings", |it| match it {
            ElementValue::String(value) => Some(value.as_str()),
            _ => None,
        })
    }

    /// Reads an enum constant and returns its name.
    pub fn enum_constant(&self, key: &'static str) -> Result<Option<&'a str>, ParseError> {
        self.read(key, "an enum constant", |it| match it {
            ElementValue::EnumConstant { const_name, .. } => Some(const_name.as_str()),
            _ => None,
        })
    }

    pub fn annotation(&self, key: &'static str) -> Result<Option<&'a Annotation>, ParseError> {
        self.read(key, "an annotation", |it| match it {
            ElementValue::AnnotationInterface(value) => Some(value),
            _ => None,
        })
    }

    pub fn annotations(
        &self,
        key: &'static str,
    ) -> Result<Option<Vec<&'a Annotation>>, ParseError> {
        self.read_array(key, "an array of annotations", |it| match it {
            ElementValue::AnnotationInterface(value) => Some(value),
            _ => None,
        })
    }

    /// Reads a single annotation, also accepted as a one element array.
    pub fn single_annotation(
        &self,
        key: &'static str,
    ) -> Result<Option<&'a Annotation>, ParseError> {
        match self.raw(key) {
            Some(ElementValue::Array(_)) => match self.annotations(key)?.as_deref() {
                Some([]) | None => Ok(None),
                Some([single]) => Ok(Some(*single)),
                Some(_) => Err(ParseError::InvalidValue {
                    key,
                    site: self.site.clone(),
                    value: "more than one annotation".to_owned(),
                }),
            },
            _ => self.annotation(key),
        }
    }

    pub fn class(&self, key: &'static str) -> Result<Option<&'a ReturnType>, ParseError> {
        self.read(key, "a class literal", |it| match it {
            ElementValue::Class { return_descriptor } => Some(return_descriptor),
            _ => None,
        })
    }

    pub fn classes(&self, key: &'static str) -> Result<Option<Vec<&'a FieldType>>, ParseError> {
        self.read_array(key, "an array of class literals", |it| match it {
            ElementValue::Class {
                return_descriptor: ReturnType::Some(value),
            } => Some(value),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> MemberId {
        MemberId::class("org/example/MixinClass")
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let at = Annotation::new(AT.binary_name)
            .with("value", ElementValue::string("HEAD"))
            .with("remap", ElementValue::boolean(false));
        let site = site();
        assert!(matches!(
            AnnotationReader::new(&AT, &at, &site),
            Err(ParseError::UnknownKey { key, .. }) if key == "remap"
        ));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let redirect = Annotation::new(REDIRECT.binary_name)
            .with("require", ElementValue::int(1))
            .with("require", ElementValue::int(2));
        let site = site();
        assert!(matches!(
            AnnotationReader::new(&REDIRECT, &redirect, &site),
            Err(ParseError::DuplicateKey { key, .. }) if key == "require"
        ));
    }

    #[test]
    fn shapes_are_checked() {
        let redirect = Annotation::new(REDIRECT.binary_name)
            .with("method", ElementValue::string("helper"))
            .with("require", ElementValue::int(1));
        let site = site();
        let reader = AnnotationReader::new(&REDIRECT, &redirect, &site).unwrap();
        assert_eq!(reader.int("require").unwrap(), Some(1));
        assert_eq!(reader.int("expect").unwrap(), None);
        assert!(matches!(
            reader.strings("method"),
            Err(ParseError::WrongShape {
                key: "method",
                found: "string",
                ..
            })
        ));
    }

    #[test]
    fn redirect_keys_are_exactly_the_documented_set() {
        assert_eq!(REDIRECT.keys, ["at", "target", "method", "require", "expect"]);
    }
}
