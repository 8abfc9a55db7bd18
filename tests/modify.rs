mod common;

use common::*;
use mokamix::{
    jvm::{
        Annotation, Class, Method, Remapper,
        annotation::ElementValue,
        code::{ConstantValue, Instruction, InvokeKind, MathOp, ValueKind},
        method::MethodAccessFlags,
    },
    mixin::{
        ApplyError, ApplyReport, HandlerContext, MixinClass, TransformerConfig,
        directive::{at, schema},
    },
};

const COMBINE: &str = "Lorg/mokamix/test/Target;combine(II)I";

/// `static int combine(int a, int b) { return a * 10 + b; }`, called as `combine(x, 3)` from
/// an instance and a static method, and `int scale(int x) { return x * 3; }`.
fn calls() -> Class {
    let call_body = |x: u16| {
        code([
            Instruction::Load(ValueKind::Int, x),
            Instruction::Ldc(ConstantValue::Integer(3)),
            invoke(InvokeKind::Static, TARGET, "combine", "(II)I"),
            Instruction::Return(Some(ValueKind::Int)),
        ])
    };
    target([
        method(
            MethodAccessFlags::STATIC,
            "combine",
            "(II)I",
            code([
                Instruction::Load(ValueKind::Int, 0),
                Instruction::Ldc(ConstantValue::Integer(10)),
                Instruction::Math(ValueKind::Int, MathOp::Mul),
                Instruction::Load(ValueKind::Int, 1),
                Instruction::Math(ValueKind::Int, MathOp::Add),
                Instruction::Return(Some(ValueKind::Int)),
            ]),
        ),
        method(MethodAccessFlags::PUBLIC, "call", "(I)I", call_body(1)),
        method(MethodAccessFlags::STATIC, "callStatic", "(I)I", call_body(0)),
        method(
            MethodAccessFlags::PUBLIC,
            "scale",
            "(I)I",
            code([
                Instruction::Load(ValueKind::Int, 1),
                Instruction::Ldc(ConstantValue::Integer(3)),
                Instruction::Math(ValueKind::Int, MathOp::Mul),
                Instruction::Return(Some(ValueKind::Int)),
            ]),
        ),
    ])
}

fn modify_arg(method: &str, point: Annotation, index: Option<i32>) -> Annotation {
    let annotation = Annotation::new(schema::MODIFY_ARG.binary_name)
        .with("method", ElementValue::strings([method]))
        .with("at", ElementValue::AnnotationInterface(point));
    match index {
        Some(index) => annotation.with("index", ElementValue::int(index)),
        None => annotation,
    }
}

fn modify_variable(method: &str, point: Annotation) -> Annotation {
    Annotation::new(schema::MODIFY_VARIABLE.binary_name)
        .with("method", ElementValue::strings([method]))
        .with("at", ElementValue::AnnotationInterface(point))
}

fn modify_slot(method: &str, point: Annotation, index: i32) -> Annotation {
    modify_variable(method, point).with("index", ElementValue::int(index))
}

/// A handler returning its argument plus one.
fn increment(access_flags: MethodAccessFlags, descriptor: &str, annotation: Annotation) -> Method {
    let slot = u16::from(!access_flags.contains(MethodAccessFlags::STATIC));
    annotated(
        method(
            access_flags,
            "increment",
            descriptor,
            code([
                Instruction::Load(ValueKind::Int, slot),
                Instruction::Ldc(ConstantValue::Integer(1)),
                Instruction::Math(ValueKind::Int, MathOp::Add),
                Instruction::Return(Some(ValueKind::Int)),
            ]),
        ),
        annotation,
    )
}

fn apply(mixin: Class, target: &mut Class) -> Result<ApplyReport, ApplyError> {
    let mixin = MixinClass::parse(mixin).unwrap();
    let mut ctx = HandlerContext::new(target, &TransformerConfig::default());
    mixin.apply_to(target, &Remapper::new(), &mut ctx)
}

#[test]
fn modifies_the_chosen_argument() {
    let mut class = calls();
    let before = instruction_count(&class, "call");
    let report = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)I",
            modify_arg("call", at_invoke(COMBINE), Some(1)),
        )]),
        &mut class,
    )
    .unwrap();
    assert_eq!(report.directives[0].matches, 1);
    // istore, aload 0, iload, invokevirtual
    assert_eq!(instruction_count(&class, "call"), before + 4);
    assert!(class.verify().is_ok());
}

#[test]
fn ambiguous_argument_needs_an_index() {
    let mut class = calls();
    let result = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)I",
            modify_arg("call", at_invoke(COMBINE), None),
        )]),
        &mut class,
    );
    assert!(matches!(
        result,
        Err(ApplyError::StructuralMismatch { ref reason, .. }) if reason.contains("set the index")
    ));
}

#[test]
fn modify_arg_needs_an_invocation() {
    let mut class = calls();
    let result = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)I",
            modify_arg("call", at("HEAD"), Some(0)),
        )]),
        &mut class,
    );
    let Err(ApplyError::StructuralMismatch { reason, .. }) = result else {
        panic!("expected a structural error, got {result:?}");
    };
    assert_eq!(
        reason,
        "uses selector @At(\"HEAD\") which does not support usage within a @ModifyArg context."
    );
}

#[test]
fn handler_must_map_a_type_to_itself() {
    let mut class = calls();
    let result = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)J",
            modify_variable("scale", at("HEAD")),
        )]),
        &mut class,
    );
    assert!(matches!(
        result,
        Err(ApplyError::HandlerSignature { ref expected, .. }) if expected == "(T)T"
    ));
}

#[test]
fn modifies_a_parameter_at_head() {
    let mut class = calls();
    let before = instruction_count(&class, "scale");
    let report = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)I",
            modify_variable("scale", at("HEAD")),
        )]),
        &mut class,
    )
    .unwrap();
    assert_eq!(report.directives[0].matches, 1);
    // aload 0, iload 1, invokevirtual, istore 1
    assert_eq!(instruction_count(&class, "scale"), before + 4);
    assert_eq!(
        count_in(&class, "scale", |insn| *insn == Instruction::Store(ValueKind::Int, 1)),
        1
    );
}

#[test]
fn explicit_index_must_name_a_local_of_the_handler_type() {
    let modify = |index: i32| {
        let mut class = calls();
        let result = apply(
            mixin([increment(
                MethodAccessFlags::PRIVATE,
                "(I)I",
                modify_slot("scale", at("HEAD"), index),
            )]),
            &mut class,
        );
        (class, result)
    };

    let (_, result) = modify(8);
    let Err(ApplyError::StructuralMismatch { reason, .. }) = result else {
        panic!("expected a structural error, got {result:?}");
    };
    assert!(reason.contains("only has 8 locals"), "{reason}");

    let (_, result) = modify(0);
    assert!(matches!(
        result,
        Err(ApplyError::StructuralMismatch { ref reason, .. }) if reason.contains("holds")
    ));

    let (class, result) = modify(7);
    assert_eq!(result.unwrap().directives[0].matches, 1);
    assert_eq!(
        count_in(&class, "scale", |insn| *insn == Instruction::Store(ValueKind::Int, 7)),
        1
    );
}

#[test]
fn explicit_index_cannot_split_a_wide_local() {
    let mut class = target([method(
        MethodAccessFlags::PUBLIC,
        "widen",
        "(JI)J",
        code([
            Instruction::Load(ValueKind::Long, 1),
            Instruction::Return(Some(ValueKind::Long)),
        ]),
    )]);
    let result = apply(
        mixin([increment(
            MethodAccessFlags::PRIVATE,
            "(I)I",
            modify_slot("widen", at("HEAD"), 2),
        )]),
        &mut class,
    );
    assert!(matches!(result, Err(ApplyError::StructuralMismatch { .. })));
}

#[cfg(feature = "runtime")]
mod runtime {
    use mokamix::runtime::{Value, Vm};

    use super::*;

    fn vm(class: Class) -> (Vm, Value) {
        let mut vm = Vm::new();
        vm.load(class);
        let this = vm.new_instance(TARGET);
        (vm, this)
    }

    #[test]
    fn instance_handler_rewrites_a_trailing_argument() {
        let mut class = calls();
        apply(
            mixin([increment(
                MethodAccessFlags::PRIVATE,
                "(I)I",
                modify_arg("call", at_invoke(COMBINE), Some(1)),
            )]),
            &mut class,
        )
        .unwrap();
        let (mut vm, this) = vm(class);
        assert_eq!(
            vm.invoke(TARGET, "call", "(I)I", &[this, Value::Int(2)]),
            Ok(Some(Value::Int(24)))
        );
    }

    #[test]
    fn static_handler_rewrites_a_leading_argument() {
        let mut class = calls();
        apply(
            mixin([increment(
                MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
                "(I)I",
                modify_arg("callStatic", at_invoke(COMBINE), Some(0)),
            )]),
            &mut class,
        )
        .unwrap();
        let (mut vm, _) = vm(class);
        assert_eq!(
            vm.invoke(TARGET, "callStatic", "(I)I", &[Value::Int(2)]),
            Ok(Some(Value::Int(33)))
        );
    }

    #[test]
    fn parameter_is_rewritten_before_use() {
        let mut class = calls();
        apply(
            mixin([increment(
                MethodAccessFlags::PRIVATE,
                "(I)I",
                modify_variable("scale", at("HEAD")),
            )]),
            &mut class,
        )
        .unwrap();
        let (mut vm, this) = vm(class);
        assert_eq!(
            vm.invoke(TARGET, "scale", "(I)I", &[this, Value::Int(2)]),
            Ok(Some(Value::Int(9)))
        );
    }
}
