//! Code emitted around inject handlers: the callback carrier and the cancellation guard.
use crate::{
    jvm::{
        Method,
        code::{
            Condition, ConstantValue, InsnId, Instruction, InvokeKind, Label, MethodBody,
            ValueKind,
        },
        references::{ClassRef, MethodRef},
    },
    types::{
        field_type::{FieldType, PrimitiveType},
        method_descriptor::{MethodDescriptor, ReturnType},
    },
};

/// The binary name of the carrier passed to handlers injected into `void` methods.
pub const CALLBACK_INFO: &str = "org/spongepowered/asm/mixin/injection/callback/CallbackInfo";
/// The binary name of the carrier passed to handlers injected into non-`void` methods.
pub const CALLBACK_INFO_RETURNABLE: &str =
    "org/spongepowered/asm/mixin/injection/callback/CallbackInfoReturnable";

/// Returns the carrier class used for a target returning `return_type`.
#[must_use]
pub fn carrier_of(return_type: &ReturnType) -> &'static str {
    match return_type {
        ReturnType::Void => CALLBACK_INFO,
        ReturnType::Some(_) => CALLBACK_INFO_RETURNABLE,
    }
}

/// Returns the name of the typed getter of the return value, and its descriptor.
#[must_use]
pub fn return_value_getter(value_type: &FieldType) -> (String, MethodDescriptor) {
    match value_type {
        FieldType::Base(primitive) => (
            format!("getReturnValue{}", primitive.descriptor_char()),
            MethodDescriptor::new(Vec::new(), ReturnType::Some(value_type.clone())),
        ),
        _ => (
            "getReturnValue".to_owned(),
            MethodDescriptor::new(
                Vec::new(),
                ReturnType::Some(FieldType::object("java/lang/Object")),
            ),
        ),
    }
}

fn carrier_method(carrier: &str, name: &str, descriptor: MethodDescriptor) -> MethodRef {
    MethodRef {
        owner: ClassRef::new(carrier),
        name: name.to_owned(),
        descriptor,
    }
}

fn box_primitive(primitive: PrimitiveType) -> Instruction {
    let wrapper = primitive.wrapper_class();
    Instruction::Invoke(
        InvokeKind::Static,
        MethodRef {
            owner: ClassRef::new(wrapper),
            name: "valueOf".to_owned(),
            descriptor: MethodDescriptor::new(
                vec![FieldType::Base(primitive)],
                ReturnType::Some(FieldType::object(wrapper)),
            ),
        },
    )
}

/// Where and how an inject handler is called.
#[derive(Debug)]
pub(crate) struct CallbackSite<'a> {
    /// The method the code is spliced into.
    pub target: &'a Method,
    /// The handler copy.
    pub handler: &'a MethodRef,
    /// Whether the handler copy is static.
    pub handler_static: bool,
    /// Whether the handler takes the arguments of the target before the carrier.
    pub pass_arguments: bool,
    /// Whether the handler may cancel the target.
    pub cancellable: bool,
}

impl CallbackSite<'_> {
    /// Builds the code spliced before `anchor`.
    ///
    /// At a value return the pending value is moved into a fresh local, handed to the
    /// carrier and pushed back once the handler returns.
    pub fn emit(
        &self,
        body: &mut MethodBody,
        anchor: InsnId,
        resume: Label,
    ) -> Vec<Instruction> {
        let return_type = &self.target.descriptor.return_type;
        let carrier = carrier_of(return_type);
        let mut code = Vec::new();
        let pending = match body.instructions.get(anchor) {
            Some(Instruction::Return(Some(kind))) => {
                let kind = *kind;
                let slot = body.allocate_local(kind);
                code.push(Instruction::Store(kind, slot));
                Some((kind, slot))
            }
            _ => None,
        };

        code.extend([
            Instruction::New(ClassRef::new(carrier)),
            Instruction::Dup,
            Instruction::Ldc(ConstantValue::String(self.target.name.clone())),
            Instruction::Ldc(ConstantValue::Integer(i32::from(self.cancellable))),
        ]);
        let mut parameters = vec![
            FieldType::object("java/lang/String"),
            FieldType::Base(PrimitiveType::Boolean),
        ];
        if let (Some((kind, slot)), ReturnType::Some(value_type)) = (pending, return_type) {
            code.push(Instruction::Load(kind, slot));
            if let FieldType::Base(primitive) = value_type {
                code.push(box_primitive(*primitive));
            }
            parameters.push(FieldType::object("java/lang/Object"));
        }
        code.push(Instruction::Invoke(
            InvokeKind::Special,
            carrier_method(
                carrier,
                Method::CONSTRUCTOR_NAME,
                MethodDescriptor::new(parameters, ReturnType::Void),
            ),
        ));
        let carrier_slot = body.allocate_local(ValueKind::Reference);
        code.push(Instruction::Store(ValueKind::Reference, carrier_slot));

        if !self.handler_static {
            code.push(Instruction::Load(ValueKind::Reference, 0));
        }
        if self.pass_arguments {
            let mut slot = u16::from(!self.target.is_static());
            for parameter in &self.target.descriptor.parameters_types {
                code.push(Instruction::Load(ValueKind::of(parameter), slot));
                slot += parameter.slot_size();
            }
        }
        code.push(Instruction::Load(ValueKind::Reference, carrier_slot));
        code.push(crate::mixin::splice::call_handler(
            self.handler,
            self.handler_static,
        ));

        if self.cancellable {
            code.extend([
                Instruction::Load(ValueKind::Reference, carrier_slot),
                Instruction::Invoke(
                    InvokeKind::Virtual,
                    carrier_method(
                        carrier,
                        "isCancelled",
                        MethodDescriptor::new(
                            Vec::new(),
                            ReturnType::Some(FieldType::Base(PrimitiveType::Boolean)),
                        ),
                    ),
                ),
                Instruction::If(Condition::Eq, resume),
            ]);
            match return_type {
                ReturnType::Void => code.push(Instruction::Return(None)),
                ReturnType::Some(value_type) => {
                    let (getter, descriptor) = return_value_getter(value_type);
                    code.push(Instruction::Load(ValueKind::Reference, carrier_slot));
                    code.push(Instruction::Invoke(
                        InvokeKind::Virtual,
                        carrier_method(carrier, &getter, descriptor),
                    ));
                    match value_type {
                        FieldType::Base(_) => {}
                        FieldType::Object(class) => {
                            code.push(Instruction::CheckCast(class.clone()));
                        }
                        FieldType::Array(_) => code.push(Instruction::CheckCast(ClassRef::new(
                            value_type.descriptor(),
                        ))),
                    }
                    code.push(Instruction::Return(Some(ValueKind::of(value_type))));
                }
            }
            code.push(Instruction::Label(resume));
        }

        if let Some((kind, slot)) = pending {
            code.push(Instruction::Load(kind, slot));
        }
        let arguments = if self.pass_arguments {
            self.target.descriptor.parameter_slots()
        } else {
            0
        };
        body.grow_stack(6 + arguments);
        code
    }
}
