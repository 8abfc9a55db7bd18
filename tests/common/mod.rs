#![allow(dead_code)]

use mokamix::{
    jvm::{
        Annotation, Class, Field, Method,
        annotation::ElementValue,
        class::ClassAccessFlags,
        code::{Instruction, InvokeKind, MethodBody},
        field::FieldAccessFlags,
        method::MethodAccessFlags,
        references::{ClassRef, MethodRef},
    },
    mixin::{
        MixinTransformer, TransformerConfig,
        callback::{CALLBACK_INFO, CALLBACK_INFO_RETURNABLE},
        directive::{at, schema},
    },
};

pub const TARGET: &str = "org/mokamix/test/Target";
pub const MIXIN: &str = "org/mokamix/test/TargetMixin";

pub fn method(
    access_flags: MethodAccessFlags,
    name: &str,
    descriptor: &str,
    body: Option<MethodBody>,
) -> Method {
    Method {
        access_flags,
        name: name.to_owned(),
        descriptor: descriptor.parse().unwrap(),
        owner: ClassRef::new(TARGET),
        body,
        annotations: Vec::new(),
    }
}

/// A body with room for every test sequence.
pub fn code<I>(instructions: I) -> Option<MethodBody>
where
    I: IntoIterator<Item = Instruction>,
{
    Some(MethodBody::new(instructions.into_iter().collect(), 8, 8))
}

pub fn field(name: &str, descriptor: &str) -> Field {
    Field {
        access_flags: FieldAccessFlags::PRIVATE,
        name: name.to_owned(),
        field_type: descriptor.parse().unwrap(),
        annotations: Vec::new(),
    }
}

pub fn class_with(binary_name: &str, methods: impl IntoIterator<Item = Method>) -> Class {
    let mut class = Class::new(binary_name, ClassAccessFlags::PUBLIC);
    for method in methods {
        class.add_method(method).unwrap();
    }
    class
}

pub fn target(methods: impl IntoIterator<Item = Method>) -> Class {
    class_with(TARGET, methods)
}

/// A mixin of [`TARGET`] named `name`.
pub fn mixin_named(
    name: &str,
    priority: Option<i32>,
    methods: impl IntoIterator<Item = Method>,
) -> Class {
    let mut annotation = Annotation::new(schema::MIXIN.binary_name)
        .with("targets", ElementValue::strings([TARGET.replace('/', ".")]));
    if let Some(priority) = priority {
        annotation = annotation.with("priority", ElementValue::int(priority));
    }
    let mut class = class_with(name, methods);
    class.annotations.push(annotation);
    class
}

pub fn mixin(methods: impl IntoIterator<Item = Method>) -> Class {
    mixin_named(MIXIN, None, methods)
}

pub fn annotated(mut method: Method, annotation: Annotation) -> Method {
    method.annotations.push(annotation);
    method
}

pub fn array(annotations: impl IntoIterator<Item = Annotation>) -> ElementValue {
    ElementValue::Array(
        annotations
            .into_iter()
            .map(ElementValue::AnnotationInterface)
            .collect(),
    )
}

pub fn at_invoke(target: &str) -> Annotation {
    at("INVOKE").with("target", ElementValue::string(target))
}

pub fn inject(method: &str, points: impl IntoIterator<Item = Annotation>) -> Annotation {
    Annotation::new(schema::INJECT.binary_name)
        .with("method", ElementValue::strings([method]))
        .with("at", array(points))
}

pub fn redirect(method: &str, point: Annotation) -> Annotation {
    Annotation::new(schema::REDIRECT.binary_name)
        .with("method", ElementValue::strings([method]))
        .with("at", ElementValue::AnnotationInterface(point))
}

pub fn invoke(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Instruction {
    Instruction::Invoke(
        kind,
        MethodRef {
            owner: ClassRef::new(owner),
            name: name.to_owned(),
            descriptor: descriptor.parse().unwrap(),
        },
    )
}

/// `invokevirtual` on the carrier passed to a handler of a `void` target.
pub fn on_callback_info(name: &str, descriptor: &str) -> Instruction {
    invoke(InvokeKind::Virtual, CALLBACK_INFO, name, descriptor)
}

/// `invokevirtual` on the carrier passed to a handler of a non-`void` target.
pub fn on_callback_info_returnable(name: &str, descriptor: &str) -> Instruction {
    invoke(InvokeKind::Virtual, CALLBACK_INFO_RETURNABLE, name, descriptor)
}

/// Counts the instructions of a method that satisfy `predicate`.
pub fn count_in(class: &Class, name: &str, predicate: impl Fn(&Instruction) -> bool) -> usize {
    class
        .methods
        .iter()
        .filter(|it| it.name == name)
        .filter_map(|it| it.body.as_ref())
        .flat_map(|it| it.instructions.iter())
        .filter(|(_, insn)| predicate(insn))
        .count()
}

pub fn instruction_count(class: &Class, name: &str) -> usize {
    count_in(class, name, |_| true)
}

pub fn transformer(mixins: impl IntoIterator<Item = Class>) -> MixinTransformer {
    let mut transformer = MixinTransformer::new(TransformerConfig::default());
    for mixin in mixins {
        transformer.add_mixin(mixin).unwrap();
    }
    transformer
}
