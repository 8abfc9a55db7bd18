//! Resolution of the locations inside a target method where code is spliced.
use std::{collections::BTreeSet, str::FromStr};

use itertools::Itertools;

use crate::jvm::{
    Remapper,
    code::{InsnId, InstructionList},
};

use super::selector::MemberPattern;

/// The strategy used to find candidate instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AtKind {
    /// The start of the method, before any leading label or pseudo instruction.
    /// Shifts count from the first real instruction.
    #[display("HEAD")]
    Head,
    /// Every return instruction.
    #[display("RETURN")]
    Return,
    /// The last return instruction.
    #[display("TAIL")]
    Tail,
    /// Every invocation matching the member constraint.
    #[display("INVOKE")]
    Invoke,
    /// Every field access matching the member constraint.
    #[display("FIELD")]
    Field,
}

impl FromStr for AtKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "HEAD" => Ok(Self::Head),
            "RETURN" => Ok(Self::Return),
            "TAIL" => Ok(Self::Tail),
            "INVOKE" => Ok(Self::Invoke),
            "FIELD" => Ok(Self::Field),
            _ => Err(value.to_owned()),
        }
    }
}

/// Moves the anchor away from the matched instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shift {
    /// Splice before the matched instruction.
    #[default]
    Before,
    /// Splice right after the matched instruction.
    After,
    /// Splice before the real instruction the given distance away.
    By(i32),
}

/// A parsed `@At`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    /// The strategy.
    pub kind: AtKind,
    /// Restricts [`AtKind::Invoke`] and [`AtKind::Field`] to matching members.
    pub target: Option<MemberPattern>,
    /// Keeps only the n-th candidate, `-1` keeps all of them.
    pub ordinal: i32,
    /// Adjusts the anchor of each candidate.
    pub shift: Shift,
    /// Restricts [`AtKind::Field`] to one access opcode.
    pub opcode: Option<u8>,
}

impl InjectionPoint {
    /// Creates an injection point of the given kind with every option unset.
    #[must_use]
    pub const fn new(kind: AtKind) -> Self {
        Self {
            kind,
            target: None,
            ordinal: -1,
            shift: Shift::Before,
            opcode: None,
        }
    }

    /// Checks if a redirect may use this injection point.
    #[must_use]
    pub const fn supports_redirect(&self) -> bool {
        matches!(self.kind, AtKind::Invoke)
    }

    /// Returns the anchors of this injection point in `code`, in program order.
    /// Code spliced at an anchor goes immediately before it.
    /// # Errors
    /// - [`ResolveError::ShiftOutOfBounds`] if a shift walks off the method.
    pub fn resolve(
        &self,
        code: &InstructionList,
        remapper: &Remapper,
        slice: Option<&Slice>,
    ) -> Result<Vec<InsnId>, ResolveError> {
        let candidates = self.candidates(code, remapper, slice)?;
        let selected: Vec<InsnId> = match usize::try_from(self.ordinal) {
            Ok(ordinal) => candidates.into_iter().nth(ordinal).into_iter().collect(),
            Err(_) => candidates,
        };
        let mut anchors = BTreeSet::new();
        selected
            .into_iter()
            .map(|it| self.shifted(code, it))
            .filter_map_ok(|it| anchors.insert(it).then_some(it))
            .collect()
    }

    fn candidates(
        &self,
        code: &InstructionList,
        remapper: &Remapper,
        slice: Option<&Slice>,
    ) -> Result<Vec<InsnId>, ResolveError> {
        let window = match slice {
            Some(slice) => slice.window(code, remapper)?,
            None => code.ids(),
        };
        let target = self.target.as_ref().map(|it| it.remapped(remapper));
        // Leading labels may be jump targets, so HEAD code goes before them.
        let start = window.first().copied();
        let mut real = window
            .into_iter()
            .filter_map(|id| code.get(id).map(|insn| (id, insn)))
            .filter(|(_, insn)| !insn.is_pseudo());
        let candidates = match self.kind {
            AtKind::Head => real
                .next()
                .map(|(id, _)| match (self.shift, start) {
                    (Shift::Before, Some(start)) => start,
                    _ => id,
                })
                .into_iter()
                .collect(),
            AtKind::Return => real
                .filter(|(_, insn)| insn.is_return())
                .map(|(id, _)| id)
                .collect(),
            AtKind::Tail => real
                .filter(|(_, insn)| insn.is_return())
                .map(|(id, _)| id)
                .last()
                .into_iter()
                .collect(),
            AtKind::Invoke => real
                .filter(|(_, insn)| {
                    insn.as_invoke().is_some_and(|(_, method)| {
                        target.as_ref().is_none_or(|it| it.matches_method(method))
                    })
                })
                .map(|(id, _)| id)
                .collect(),
            AtKind::Field => real
                .filter(|(_, insn)| {
                    self.opcode.is_none_or(|it| insn.opcode() == Some(it))
                        && insn.as_field_access().is_some_and(|field| {
                            target.as_ref().is_none_or(|it| it.matches_field(field))
                        })
                })
                .map(|(id, _)| id)
                .collect(),
        };
        Ok(candidates)
    }

    fn shifted(&self, code: &InstructionList, candidate: InsnId) -> Result<InsnId, ResolveError> {
        let out_of_bounds = || ResolveError::ShiftOutOfBounds {
            at: self.kind,
            shift: self.shift,
        };
        match self.shift {
            Shift::Before => Ok(candidate),
            Shift::After => code.next_of(candidate).ok_or_else(out_of_bounds),
            Shift::By(distance) => {
                let mut anchor = candidate;
                for _ in 0..distance.unsigned_abs() {
                    anchor = if distance > 0 {
                        code.next_of(anchor).and_then(|it| code.next_real(it))
                    } else {
                        code.prev_of(anchor).and_then(|it| code.prev_real(it))
                    }
                    .ok_or_else(out_of_bounds)?;
                }
                Ok(anchor)
            }
        }
    }
}

/// Bounds the candidates of an injection point, `@Slice(from = @At, to = @At)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    /// The window starts at the first anchor of this point, or at the start of the method.
    pub from: Option<InjectionPoint>,
    /// The window ends at the last anchor of this point, or at the end of the method.
    pub to: Option<InjectionPoint>,
}

impl Slice {
    /// Returns the ids inside the window, in program order. A bound that matches nothing
    /// yields an empty window.
    fn window(
        &self,
        code: &InstructionList,
        remapper: &Remapper,
    ) -> Result<Vec<InsnId>, ResolveError> {
        let ids = code.ids();
        let position = |id: InsnId| ids.iter().position(|it| *it == id);
        let start = match &self.from {
            Some(point) => match point.resolve(code, remapper, None)?.first() {
                Some(id) => position(*id),
                None => return Ok(Vec::new()),
            },
            None => Some(0),
        };
        let end = match &self.to {
            Some(point) => match point.resolve(code, remapper, None)?.last() {
                Some(id) => position(*id),
                None => return Ok(Vec::new()),
            },
            None => ids.len().checked_sub(1),
        };
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Ok(ids[start..=end].to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}

/// An error raised while resolving an injection point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A shift moves the anchor outside of the method.
    #[error("shifts @At(\"{at}\") by {shift:?}, which leaves the method")]
    ShiftOutOfBounds {
        /// The kind of the injection point.
        at: AtKind,
        /// The shift.
        shift: Shift,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::{
        code::{Instruction, InvokeKind, Label, ValueKind},
        references::{ClassRef, FieldRef, MethodRef},
    };

    fn call(name: &str) -> Instruction {
        Instruction::Invoke(
            InvokeKind::Static,
            MethodRef {
                owner: ClassRef::new("org/example/Target"),
                name: name.to_owned(),
                descriptor: "()V".parse().unwrap(),
            },
        )
    }

    fn code() -> (InstructionList, Vec<InsnId>) {
        let mut list = InstructionList::new();
        let ids = vec![
            list.push(Instruction::Label(Label::from(0))),
            list.push(Instruction::LineNumber(3)),
            list.push(call("helper")),
            list.push(call("other")),
            list.push(Instruction::Frame),
            list.push(call("helper")),
            list.push(Instruction::Load(ValueKind::Int, 0)),
            list.push(Instruction::Return(Some(ValueKind::Int))),
        ];
        (list, ids)
    }

    fn invoke(target: &str) -> InjectionPoint {
        InjectionPoint {
            target: Some(target.parse().unwrap()),
            ..InjectionPoint::new(AtKind::Invoke)
        }
    }

    fn resolve(point: &InjectionPoint, slice: Option<&Slice>) -> Vec<InsnId> {
        let (list, _) = code();
        point.resolve(&list, &Remapper::new(), slice).unwrap()
    }

    #[test]
    fn head_precedes_leading_labels() {
        let (_, ids) = code();
        assert_eq!(resolve(&InjectionPoint::new(AtKind::Head), None), vec![ids[0]]);
        let after = InjectionPoint {
            shift: Shift::After,
            ..InjectionPoint::new(AtKind::Head)
        };
        assert_eq!(resolve(&after, None), vec![ids[3]]);
    }

    #[test]
    fn returns() {
        let (_, ids) = code();
        assert_eq!(resolve(&InjectionPoint::new(AtKind::Return), None), vec![ids[7]]);
        assert_eq!(resolve(&InjectionPoint::new(AtKind::Tail), None), vec![ids[7]]);
    }

    #[test]
    fn invoke_with_ordinal() {
        let (_, ids) = code();
        assert_eq!(resolve(&invoke("helper"), None), vec![ids[2], ids[5]]);
        let second = InjectionPoint {
            ordinal: 1,
            ..invoke("helper")
        };
        assert_eq!(resolve(&second, None), vec![ids[5]]);
        let missing = InjectionPoint {
            ordinal: 2,
            ..invoke("helper")
        };
        assert!(resolve(&missing, None).is_empty());
        assert!(resolve(&invoke("absent"), None).is_empty());
    }

    #[test]
    fn shifts() {
        let (_, ids) = code();
        let after = InjectionPoint {
            shift: Shift::After,
            ..invoke("other")
        };
        assert_eq!(resolve(&after, None), vec![ids[4]]);
        let by = InjectionPoint {
            shift: Shift::By(2),
            ..invoke("other")
        };
        assert_eq!(resolve(&by, None), vec![ids[6]]);
        let back = InjectionPoint {
            shift: Shift::By(-1),
            ..invoke("other")
        };
        assert_eq!(resolve(&back, None), vec![ids[2]]);
        let (list, _) = code();
        let off = InjectionPoint {
            shift: Shift::By(5),
            ..invoke("other")
        };
        assert!(matches!(
            off.resolve(&list, &Remapper::new(), None),
            Err(ResolveError::ShiftOutOfBounds { .. })
        ));
    }

    #[test]
    fn slices_bound_candidates() {
        let (_, ids) = code();
        let slice = Slice {
            from: Some(invoke("other")),
            to: None,
        };
        assert_eq!(resolve(&invoke("helper"), Some(&slice)), vec![ids[5]]);
        let empty = Slice {
            from: Some(invoke("absent")),
            to: None,
        };
        assert!(resolve(&invoke("helper"), Some(&empty)).is_empty());
    }

    #[test]
    fn field_accesses_filtered_by_opcode() {
        let field = |name: &str| FieldRef {
            owner: ClassRef::new("org/example/Target"),
            name: name.to_owned(),
            field_type: "I".parse().unwrap(),
        };
        let mut list = InstructionList::new();
        let ids = vec![
            list.push(Instruction::Load(ValueKind::Reference, 0)),
            list.push(Instruction::GetField(field("count"))),
            list.push(Instruction::Store(ValueKind::Int, 1)),
            list.push(Instruction::Load(ValueKind::Reference, 0)),
            list.push(Instruction::Load(ValueKind::Int, 1)),
            list.push(Instruction::PutField(field("count"))),
            list.push(Instruction::Load(ValueKind::Reference, 0)),
            list.push(Instruction::GetField(field("total"))),
            list.push(Instruction::Return(Some(ValueKind::Int))),
        ];
        let resolve =
            |point: &InjectionPoint| point.resolve(&list, &Remapper::new(), None).unwrap();
        let count = InjectionPoint {
            target: Some("Lorg/example/Target;count:I".parse().unwrap()),
            ..InjectionPoint::new(AtKind::Field)
        };
        assert_eq!(resolve(&count), vec![ids[1], ids[5]]);
        let reads = InjectionPoint {
            opcode: Some(0xb4),
            ..count.clone()
        };
        assert_eq!(resolve(&reads), vec![ids[1]]);
        let writes = InjectionPoint {
            opcode: Some(0xb5),
            ..count
        };
        assert_eq!(resolve(&writes), vec![ids[5]]);
        let any_read = InjectionPoint {
            opcode: Some(0xb4),
            ..InjectionPoint::new(AtKind::Field)
        };
        assert_eq!(resolve(&any_read), vec![ids[1], ids[7]]);
        let method_pattern = InjectionPoint {
            target: Some("count()I".parse().unwrap()),
            ..InjectionPoint::new(AtKind::Field)
        };
        assert!(resolve(&method_pattern).is_empty());
    }
}
