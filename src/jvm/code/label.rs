use std::fmt::Display;

/// An opaque jump target inside an [`InstructionList`](super::InstructionList).
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    /// Returns the label following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<u32> for Label {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Label> for u32 {
    fn from(value: Label) -> Self {
        value.0
    }
}

/// Hands out fresh [`Label`]s.
///
/// Cloning does not split the source: the clone produces the same sequence of labels as the
/// original.
#[derive(Debug, Clone, Default)]
pub struct LabelAllocator(u32);

impl LabelAllocator {
    /// Creates an allocator whose first label is greater than every label in `used`.
    pub fn starting_after<I>(used: I) -> Self
    where
        I: IntoIterator<Item = Label>,
    {
        let next = used.into_iter().map(|it| it.0 + 1).max().unwrap_or(0);
        Self(next)
    }

    /// Generates a fresh label.
    pub fn fresh(&mut self) -> Label {
        let label = Label(self.0);
        self.0 += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_skips_used_labels() {
        let mut alloc = LabelAllocator::starting_after([Label(3), Label(7), Label(1)]);
        assert_eq!(alloc.fresh(), Label(8));
        assert_eq!(alloc.fresh(), Label(9));
    }

    #[test]
    fn empty_allocator_starts_at_zero() {
        let mut alloc = LabelAllocator::starting_after(std::iter::empty());
        assert_eq!(alloc.fresh(), Label(0));
        assert_eq!(Label(0).next(), Label(1));
    }

    #[test]
    fn display() {
        assert_eq!(Label::from(42).to_string(), "L42");
    }
}
