use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use super::{Instruction, Label, LabelAllocator};

/// A stable handle to a node in an [`InstructionList`].
/// Ids stay valid across insertions and removals of other nodes.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(transparent)]
pub struct InsnId(u32);

impl Display for InsnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:05}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Node {
    instruction: Instruction,
    prev: Option<InsnId>,
    next: Option<InsnId>,
}

/// The instructions of a method in program order.
///
/// Nodes live in an arena and are linked in both directions, so splicing code never moves
/// or renumbers the nodes around it.
#[derive(Debug, Clone, Default)]
pub struct InstructionList {
    nodes: Vec<Option<Node>>,
    head: Option<InsnId>,
    tail: Option<InsnId>,
    len: usize,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes, including pseudo instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the list has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: InsnId) -> Result<&Node, CodeError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(CodeError::DanglingInstruction(id))
    }

    fn node_mut(&mut self, id: InsnId) -> Result<&mut Node, CodeError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(CodeError::DanglingInstruction(id))
    }

    fn allocate(&mut self, instruction: Instruction) -> InsnId {
        #[allow(clippy::cast_possible_truncation)]
        let id = InsnId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            instruction,
            prev: None,
            next: None,
        }));
        self.len += 1;
        id
    }

    /// Appends an instruction to the end of the list.
    pub fn push(&mut self, instruction: Instruction) -> InsnId {
        let id = self.allocate(instruction);
        if let Some(tail) = self.tail {
            if let Some(Some(tail_node)) = self.nodes.get_mut(tail.0 as usize) {
                tail_node.next = Some(id);
            }
            if let Some(Some(node)) = self.nodes.get_mut(id.0 as usize) {
                node.prev = Some(tail);
            }
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        id
    }

    /// Inserts an instruction immediately before `anchor`.
    /// # Errors
    /// - [`CodeError::DanglingInstruction`] if `anchor` is not in the list.
    pub fn insert_before(
        &mut self,
        anchor: InsnId,
        instruction: Instruction,
    ) -> Result<InsnId, CodeError> {
        let prev = self.node(anchor)?.prev;
        let id = self.allocate(instruction);
        {
            let node = self.node_mut(id)?;
            node.prev = prev;
            node.next = Some(anchor);
        }
        self.node_mut(anchor)?.prev = Some(id);
        match prev {
            Some(prev) => self.node_mut(prev)?.next = Some(id),
            None => self.head = Some(id),
        }
        Ok(id)
    }

    /// Inserts an instruction immediately after `anchor`.
    /// # Errors
    /// - [`CodeError::DanglingInstruction`] if `anchor` is not in the list.
    pub fn insert_after(
        &mut self,
        anchor: InsnId,
        instruction: Instruction,
    ) -> Result<InsnId, CodeError> {
        match self.node(anchor)?.next {
            Some(next) => self.insert_before(next, instruction),
            None => Ok(self.push(instruction)),
        }
    }

    /// Inserts a sequence of instructions immediately before `anchor`, keeping their order.
    /// # Errors
    /// - [`CodeError::DanglingInstruction`] if `anchor` is not in the list.
    pub fn insert_all_before<I>(
        &mut self,
        anchor: InsnId,
        instructions: I,
    ) -> Result<Vec<InsnId>, CodeError>
    where
        I: IntoIterator<Item = Instruction>,
    {
        instructions
            .into_iter()
            .map(|it| self.insert_before(anchor, it))
            .collect()
    }

    /// Unlinks a node and returns its instruction. The id becomes dangling.
    /// # Errors
    /// - [`CodeError::DanglingInstruction`] if `id` is not in the list.
    pub fn remove(&mut self, id: InsnId) -> Result<Instruction, CodeError> {
        let Node {
            instruction,
            prev,
            next,
        } = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(CodeError::DanglingInstruction(id))?;
        match prev {
            Some(prev) => self.node_mut(prev)?.next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next)?.prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        Ok(instruction)
    }

    /// Replaces the instruction of a node in place and returns the old one.
    /// # Errors
    /// - [`CodeError::DanglingInstruction`] if `id` is not in the list.
    pub fn replace(
        &mut self,
        id: InsnId,
        instruction: Instruction,
    ) -> Result<Instruction, CodeError> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.instruction, instruction))
    }

    /// Returns the instruction of a node.
    #[must_use]
    pub fn get(&self, id: InsnId) -> Option<&Instruction> {
        self.node(id).ok().map(|it| &it.instruction)
    }

    /// Returns the instruction of a node, mutably.
    pub fn get_mut(&mut self, id: InsnId) -> Option<&mut Instruction> {
        self.node_mut(id).ok().map(|it| &mut it.instruction)
    }

    /// Returns the node following `id`.
    #[must_use]
    pub fn next_of(&self, id: InsnId) -> Option<InsnId> {
        self.node(id).ok().and_then(|it| it.next)
    }

    /// Returns the node preceding `id`.
    #[must_use]
    pub fn prev_of(&self, id: InsnId) -> Option<InsnId> {
        self.node(id).ok().and_then(|it| it.prev)
    }

    /// Returns the first node.
    #[must_use]
    pub fn first(&self) -> Option<InsnId> {
        self.head
    }

    /// Returns the last node.
    #[must_use]
    pub fn last(&self) -> Option<InsnId> {
        self.tail
    }

    /// Returns the first real instruction at or after `id`, skipping pseudo instructions.
    #[must_use]
    pub fn next_real(&self, id: InsnId) -> Option<InsnId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !self.get(current)?.is_pseudo() {
                return Some(current);
            }
            cursor = self.next_of(current);
        }
        None
    }

    /// Returns the last real instruction at or before `id`, skipping pseudo instructions.
    #[must_use]
    pub fn prev_real(&self, id: InsnId) -> Option<InsnId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !self.get(current)?.is_pseudo() {
                return Some(current);
            }
            cursor = self.prev_of(current);
        }
        None
    }

    /// Iterates over the nodes in program order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Iterates over the instructions mutably, in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.nodes
            .iter_mut()
            .flatten()
            .map(|it| &mut it.instruction)
    }

    /// Returns the ids of the nodes in program order.
    #[must_use]
    pub fn ids(&self) -> Vec<InsnId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Returns the node defining `label`.
    #[must_use]
    pub fn position_of_label(&self, label: Label) -> Option<InsnId> {
        self.iter()
            .find(|(_, insn)| insn.defined_label() == Some(label))
            .map(|(id, _)| id)
    }

    /// Iterates over every label defined in the list.
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.iter().filter_map(|(_, insn)| insn.defined_label())
    }

    /// Checks that every label is defined once and every jump target is defined.
    /// # Errors
    /// - [`CodeError::DuplicateLabel`] if a label is defined twice.
    /// - [`CodeError::UndefinedLabel`] if a jump targets an undefined label.
    pub fn verify(&self) -> Result<(), CodeError> {
        let mut defined = BTreeSet::new();
        for label in self.labels() {
            if !defined.insert(label) {
                return Err(CodeError::DuplicateLabel(label));
            }
        }
        self.iter()
            .flat_map(|(_, insn)| insn.jump_targets())
            .find(|it| !defined.contains(it))
            .map_or(Ok(()), |it| Err(CodeError::UndefinedLabel(it)))
    }

    /// Clones the list in program order, giving every defined label a fresh identity.
    /// Jumps to labels outside the list are left as they are.
    #[must_use]
    pub fn copy_with(&self, labels: &mut LabelAllocator) -> Self {
        let renames: BTreeMap<Label, Label> =
            self.labels().map(|it| (it, labels.fresh())).collect();
        self.iter()
            .map(|(_, insn)| {
                let mut insn = insn.clone();
                insn.map_labels(|it| renames.get(&it).copied().unwrap_or(it));
                insn
            })
            .collect()
    }
}

impl FromIterator<Instruction> for InstructionList {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        let mut list = Self::new();
        for insn in iter {
            list.push(insn);
        }
        list
    }
}

impl<const N: usize> From<[Instruction; N]> for InstructionList {
    fn from(value: [Instruction; N]) -> Self {
        value.into_iter().collect()
    }
}

impl<'l> IntoIterator for &'l InstructionList {
    type Item = (InsnId, &'l Instruction);
    type IntoIter = Iter<'l>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over an [`InstructionList`] in program order.
#[derive(Debug, Clone)]
pub struct Iter<'l> {
    list: &'l InstructionList,
    cursor: Option<InsnId>,
}

impl<'l> Iterator for Iter<'l> {
    type Item = (InsnId, &'l Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.list.node(id).ok()?;
        self.cursor = node.next;
        Some((id, &node.instruction))
    }
}

/// An error indicating that an instruction list is used inconsistently.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum CodeError {
    /// The id does not refer to a node of the list.
    #[error("Instruction {0} is not in the list")]
    DanglingInstruction(InsnId),
    /// A jump targets a label that is not defined.
    #[error("Label {0} is used but not defined")]
    UndefinedLabel(Label),
    /// A label is defined more than once.
    #[error("Label {0} is defined more than once")]
    DuplicateLabel(Label),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::code::{Condition, ValueKind};

    fn sample() -> (InstructionList, Vec<InsnId>) {
        let mut list = InstructionList::new();
        let ids = vec![
            list.push(Instruction::LineNumber(1)),
            list.push(Instruction::Load(ValueKind::Int, 0)),
            list.push(Instruction::If(Condition::Eq, Label::from(0))),
            list.push(Instruction::Label(Label::from(0))),
            list.push(Instruction::Frame),
            list.push(Instruction::Return(None)),
        ];
        (list, ids)
    }

    #[test]
    fn push_keeps_program_order() {
        let (list, ids) = sample();
        assert_eq!(list.ids(), ids);
        assert_eq!(list.len(), 6);
        assert_eq!(list.first(), Some(ids[0]));
        assert_eq!(list.last(), Some(ids[5]));
        assert_eq!(list.next_of(ids[1]), Some(ids[2]));
        assert_eq!(list.prev_of(ids[1]), Some(ids[0]));
    }

    #[test]
    fn insertions_keep_other_ids_stable() {
        let (mut list, ids) = sample();
        let before = list.insert_before(ids[1], Instruction::Nop).unwrap();
        let after = list.insert_after(ids[5], Instruction::Nop).unwrap();
        let head = list.insert_before(ids[0], Instruction::Nop).unwrap();
        assert_eq!(
            list.ids(),
            vec![head, ids[0], before, ids[1], ids[2], ids[3], ids[4], ids[5], after]
        );
        assert_eq!(list.first(), Some(head));
        assert_eq!(list.last(), Some(after));
        assert_eq!(list.get(ids[5]), Some(&Instruction::Return(None)));
    }

    #[test]
    fn insert_all_before_preserves_order() {
        let (mut list, ids) = sample();
        let inserted = list
            .insert_all_before(ids[5], [Instruction::Nop, Instruction::Pop])
            .unwrap();
        assert_eq!(list.next_of(inserted[0]), Some(inserted[1]));
        assert_eq!(list.next_of(inserted[1]), Some(ids[5]));
    }

    #[test]
    fn remove_relinks_neighbours() {
        let (mut list, ids) = sample();
        assert_eq!(list.remove(ids[0]).unwrap(), Instruction::LineNumber(1));
        assert_eq!(list.remove(ids[5]).unwrap(), Instruction::Return(None));
        assert_eq!(list.first(), Some(ids[1]));
        assert_eq!(list.last(), Some(ids[4]));
        assert_eq!(list.len(), 4);
        assert_eq!(
            list.remove(ids[0]),
            Err(CodeError::DanglingInstruction(ids[0]))
        );
        assert_eq!(
            list.insert_before(ids[5], Instruction::Nop),
            Err(CodeError::DanglingInstruction(ids[5]))
        );
    }

    #[test]
    fn real_instruction_walks() {
        let (list, ids) = sample();
        assert_eq!(list.next_real(ids[0]), Some(ids[1]));
        assert_eq!(list.next_real(ids[3]), Some(ids[5]));
        assert_eq!(list.prev_real(ids[4]), Some(ids[2]));
        assert_eq!(list.prev_real(ids[0]), None);
    }

    #[test]
    fn verify_detects_label_problems() {
        let (mut list, ids) = sample();
        assert_eq!(list.verify(), Ok(()));
        list.push(Instruction::Label(Label::from(0)));
        assert_eq!(list.verify(), Err(CodeError::DuplicateLabel(Label::from(0))));
        list.replace(ids[3], Instruction::Nop).unwrap();
        let last = list.last().unwrap();
        list.remove(last).unwrap();
        assert_eq!(list.verify(), Err(CodeError::UndefinedLabel(Label::from(0))));
    }

    #[test]
    fn copies_get_fresh_labels() {
        let (list, _) = sample();
        let mut alloc = LabelAllocator::starting_after(list.labels());
        let first = list.copy_with(&mut alloc);
        let second = list.copy_with(&mut alloc);
        let first_labels: Vec<_> = first.labels().collect();
        let second_labels: Vec<_> = second.labels().collect();
        assert_eq!(first_labels, vec![Label::from(1)]);
        assert_eq!(second_labels, vec![Label::from(2)]);
        assert!(first.verify().is_ok());
        assert!(second.verify().is_ok());
        assert_eq!(
            second.iter().flat_map(|(_, it)| it.jump_targets()).collect::<Vec<_>>(),
            second_labels
        );
    }

    #[test]
    fn position_of_label() {
        let (list, ids) = sample();
        assert_eq!(list.position_of_label(Label::from(0)), Some(ids[3]));
        assert_eq!(list.position_of_label(Label::from(9)), None);
    }
}
