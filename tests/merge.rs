mod common;

use common::*;
use mokamix::{
    jvm::{
        Annotation, Class, Field, Method, Remapper,
        annotation::ElementValue,
        code::{ConstantValue, Instruction, InvokeKind, MathOp, ValueKind},
        method::MethodAccessFlags,
        references::{ClassRef, FieldRef},
    },
    mixin::{
        ApplyError, HandlerContext, MixinClass, ParseError, TransformerConfig,
        directive::schema,
    },
};

const TICKABLE: &str = "org/mokamix/test/Tickable";

fn count_ref(owner: &str, name: &str) -> FieldRef {
    FieldRef {
        owner: ClassRef::new(owner),
        name: name.to_owned(),
        field_type: "I".parse().unwrap(),
    }
}

/// `this.count = this.count + 1` on the field `name` of `owner`.
fn increment(owner: &str, name: &str) -> [Instruction; 6] {
    [
        Instruction::Load(ValueKind::Reference, 0),
        Instruction::Load(ValueKind::Reference, 0),
        Instruction::GetField(count_ref(owner, name)),
        Instruction::Ldc(ConstantValue::Integer(1)),
        Instruction::Math(ValueKind::Int, MathOp::Add),
        Instruction::PutField(count_ref(owner, name)),
    ]
}

/// A counter with `int count` and `void tick()`.
fn counter() -> Class {
    let mut class = target([method(
        MethodAccessFlags::PUBLIC,
        "tick",
        "()V",
        code(increment(TARGET, "count").into_iter().chain([Instruction::Return(None)])),
    )]);
    class.add_field(field("count", "I")).unwrap();
    class
}

fn shadow(aliases: &[&str]) -> Annotation {
    let annotation = Annotation::new(schema::SHADOW.binary_name);
    if aliases.is_empty() {
        annotation
    } else {
        annotation.with("aliases", ElementValue::strings(aliases.iter().copied()))
    }
}

fn unique() -> Annotation {
    Annotation::new(schema::UNIQUE.binary_name)
}

fn with_annotation(mut field: Field, annotation: Annotation) -> Field {
    field.annotations.push(annotation);
    field
}

/// `void doubleTick() { tick(); tick(); }` calling the shadowed `tick`.
fn double_tick() -> Method {
    let tick = || invoke(InvokeKind::Virtual, MIXIN, "tick", "()V");
    method(
        MethodAccessFlags::PUBLIC,
        "doubleTick",
        "()V",
        code([
            Instruction::Load(ValueKind::Reference, 0),
            tick(),
            Instruction::Load(ValueKind::Reference, 0),
            tick(),
            Instruction::Return(None),
        ]),
    )
}

fn shadow_tick() -> Method {
    annotated(
        method(MethodAccessFlags::PUBLIC, "tick", "()V", None),
        shadow(&[]),
    )
}

fn apply(mixin: Class, target: &mut Class) -> Result<mokamix::mixin::ApplyReport, ApplyError> {
    let mixin = MixinClass::parse(mixin).unwrap();
    let mut ctx = HandlerContext::new(target, &TransformerConfig::default());
    mixin.apply_to(target, &Remapper::new(), &mut ctx)
}

#[test]
fn plain_methods_are_merged_with_remapped_references() {
    let mut class = counter();
    let mut mixin = mixin([shadow_tick(), double_tick()]);
    mixin.interfaces.push(ClassRef::new(TICKABLE));
    apply(mixin, &mut class).unwrap();

    assert_eq!(class.methods.len(), 2);
    let merged = class
        .get_method("doubleTick", &"()V".parse().unwrap())
        .unwrap();
    assert_eq!(merged.owner, ClassRef::new(TARGET));
    assert!(merged.annotations.is_empty());
    let calls: Vec<_> = merged
        .body
        .iter()
        .flat_map(|it| it.instructions.iter())
        .filter_map(|(_, insn)| insn.as_invoke())
        .map(|(_, it)| it.owner.binary_name.clone())
        .collect();
    assert_eq!(calls, vec![TARGET.to_owned(), TARGET.to_owned()]);
    assert_eq!(class.interfaces, vec![ClassRef::new(TICKABLE)]);
}

#[test]
fn shadow_fields_resolve_through_aliases() {
    let mut class = counter();
    let mut mixin = mixin([method(
        MethodAccessFlags::PUBLIC,
        "bump",
        "()V",
        code(increment(MIXIN, "obfuscated").into_iter().chain([Instruction::Return(None)])),
    )]);
    mixin.add_field(with_annotation(field("obfuscated", "I"), shadow(&["count"]))).unwrap();
    apply(mixin, &mut class).unwrap();

    assert_eq!(class.fields.len(), 1);
    assert_eq!(
        count_in(&class, "bump", |insn| insn
            .as_field_access()
            .is_some_and(|it| *it == count_ref(TARGET, "count"))),
        2
    );
}

#[test]
fn missing_shadow_is_a_selector_error() {
    let mut class = counter();
    let mut mixin = mixin([]);
    mixin.add_field(with_annotation(field("total", "I"), shadow(&[]))).unwrap();
    let result = apply(mixin, &mut class);
    let Err(err @ ApplyError::Selector { .. }) = result else {
        panic!("expected a selector error, got {result:?}");
    };
    assert_eq!(
        err.to_string(),
        format!("Illegal mixin: {MIXIN}.total:I does not match anything in {TARGET}")
    );
}

#[test]
fn unique_members_are_renamed_on_collision() {
    let mut class = counter();
    let mut mixin = mixin([method(
        MethodAccessFlags::PUBLIC,
        "bumpOwn",
        "()V",
        code(increment(MIXIN, "count").into_iter().chain([Instruction::Return(None)])),
    )]);
    mixin.add_field(with_annotation(field("count", "I"), unique())).unwrap();
    apply(mixin, &mut class).unwrap();

    let names: Vec<&str> = class.fields.iter().map(|it| it.name.as_str()).collect();
    assert_eq!(names, vec!["count", "$mokamix$0$unique$count"]);
    assert_eq!(
        count_in(&class, "bumpOwn", |insn| insn
            .as_field_access()
            .is_some_and(|it| it.name == "$mokamix$0$unique$count")),
        2
    );
}

#[test]
fn unique_members_keep_free_names() {
    let mut class = counter();
    let mut mixin = mixin([]);
    mixin.add_field(with_annotation(field("ticks", "J"), unique())).unwrap();
    apply(mixin, &mut class).unwrap();
    assert!(class.get_field("ticks").is_some());
}

#[test]
fn duplicate_members_are_rejected() {
    let mut class = counter();
    let duplicate = method(
        MethodAccessFlags::PUBLIC,
        "tick",
        "()V",
        code([Instruction::Return(None)]),
    );
    let result = apply(mixin([double_tick(), duplicate]), &mut class);
    let Err(ApplyError::DuplicateMember { member, target }) = result else {
        panic!("expected a duplicate member error, got {result:?}");
    };
    assert_eq!(member.to_string(), format!("{MIXIN}.tick()V"));
    assert_eq!(target, TARGET);
    // The whole mixin is rolled back, including the method merged before the failure.
    assert_eq!(class.methods.len(), 1);
}

#[test]
fn classes_without_mixin_annotation_are_rejected() {
    let result = MixinClass::parse(class_with(MIXIN, []));
    assert!(matches!(result, Err(ParseError::MissingMixin(ref it)) if it == MIXIN));
}

#[test]
fn unknown_keys_are_rejected() {
    let mut mixin = mixin([]);
    mixin.annotations[0]
        .element_value_pairs
        .push(("remap".to_owned(), ElementValue::boolean(false)));
    let result = MixinClass::parse(mixin);
    let Err(err @ ParseError::UnknownKey { .. }) = result else {
        panic!("expected an unknown key error, got {result:?}");
    };
    assert_eq!(
        err.to_string(),
        format!("Unimplemented key in @Mixin {MIXIN}: remap")
    );
}

#[test]
fn remapped_names_reach_the_target() {
    // The mixin was written against a development name of the target class.
    let mut class = counter();
    let mut mixin = mixin([double_tick()]);
    mixin.annotations[0] = Annotation::new(schema::MIXIN.binary_name)
        .with("targets", ElementValue::strings(["dev.Counter"]));
    let mut remapper = Remapper::new();
    remapper.rename_class("dev/Counter", TARGET);

    let mixin = MixinClass::parse(mixin).unwrap();
    assert!(mixin.applies_to(TARGET, &remapper));
    assert!(!mixin.applies_to(TARGET, &Remapper::new()));
    let mut ctx = HandlerContext::new(&class, &TransformerConfig::default());
    mixin.apply_to(&mut class, &remapper, &mut ctx).unwrap();
    assert!(class.get_method("doubleTick", &"()V".parse().unwrap()).is_some());
}

#[cfg(feature = "runtime")]
#[test]
fn merged_code_runs_against_target_state() {
    use mokamix::runtime::{Value, Vm};

    let mut class = counter();
    apply(mixin([shadow_tick(), double_tick()]), &mut class).unwrap();
    let mut vm = Vm::new();
    vm.load(class);
    let this = vm.new_instance(TARGET);
    assert_eq!(vm.invoke(TARGET, "doubleTick", "()V", &[this]), Ok(None));
    assert_eq!(vm.field(this, "count"), Ok(Value::Int(2)));
}
