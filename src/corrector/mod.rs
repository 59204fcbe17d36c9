//! Byte-range edits against an unchanged source buffer.
//!
//! Rules describe corrections through a [`Corrector`]; the runner gathers the
//! resulting edits into an [`EditSet`], which keeps them ordered and
//! non-overlapping and applies them in a single pass.

use serde::Serialize;
use thiserror::Error;

use crate::syntax::{Node, Span};

/// Errors raised while collecting or applying edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("edit {new} overlaps edit {existing}")]
    Overlap { existing: Span, new: Span },

    #[error("byte offset {offset} is out of bounds for source of length {len}")]
    InvalidOffset { offset: usize, len: usize },

    #[error("edit start {start} is greater than end {end}")]
    InvalidRange { start: usize, end: usize },

    #[error("byte offset {offset} is not on a UTF-8 character boundary")]
    InvalidUtf8Boundary { offset: usize },
}

/// Replace `span` of the original buffer with `replacement`.
///
/// An empty replacement deletes; an empty span inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub span: Span,
    pub replacement: String,
}

impl Edit {
    pub fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn remove(span: Span) -> Self {
        Self::replace(span, "")
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(Span::empty(offset), text)
    }

    pub fn is_insertion(&self) -> bool {
        self.span.is_empty()
    }

    /// Insertions conflict only with insertions at the same offset and with
    /// edits that strictly enclose their offset.
    fn conflicts_with(&self, other: &Edit) -> bool {
        match (self.is_insertion(), other.is_insertion()) {
            (true, true) => self.span.start == other.span.start,
            (true, false) => other.span.start < self.span.start && self.span.start < other.span.end,
            (false, true) => other.conflicts_with(self),
            (false, false) => self.span.overlaps(other.span),
        }
    }

    fn validate(&self, source: &str) -> Result<(), EditError> {
        let len = source.len();
        let Span { start, end } = self.span;
        for offset in [start, end] {
            if offset > len {
                return Err(EditError::InvalidOffset { offset, len });
            }
        }
        if start > end {
            return Err(EditError::InvalidRange { start, end });
        }
        for offset in [start, end] {
            if !source.is_char_boundary(offset) {
                return Err(EditError::InvalidUtf8Boundary { offset });
            }
        }
        Ok(())
    }
}

/// Collects the edits of one correction callback.
///
/// Edits are recorded in call order; conflicts are only detected when the
/// runner merges them into an [`EditSet`].
#[derive(Debug, Default)]
pub struct Corrector {
    edits: Vec<Edit>,
}

impl Corrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, span: Span, replacement: impl Into<String>) {
        self.edits.push(Edit::replace(span, replacement));
    }

    pub fn remove(&mut self, span: Span) {
        self.edits.push(Edit::remove(span));
    }

    pub fn insert_before(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(Edit::insert(span.start, text));
    }

    pub fn insert_after(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(Edit::insert(span.end, text));
    }

    /// Exchange the source text of two nodes.
    pub fn swap(&mut self, a: Node<'_>, b: Node<'_>) {
        self.replace(a.span(), b.source());
        self.replace(b.span(), a.source());
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn into_edits(self) -> Vec<Edit> {
        self.edits
    }
}

/// Ordered, pairwise non-overlapping edits for one correction pass.
#[derive(Debug, Default, Clone)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    fn check(&self, edit: &Edit) -> Result<(), EditError> {
        match self.edits.iter().find(|existing| existing.conflicts_with(edit)) {
            Some(existing) => Err(EditError::Overlap {
                existing: existing.span,
                new: edit.span,
            }),
            None => Ok(()),
        }
    }

    fn insert_sorted(&mut self, edit: Edit) {
        let key = (edit.span.start, edit.span.end);
        let at = self
            .edits
            .partition_point(|e| (e.span.start, e.span.end) <= key);
        self.edits.insert(at, edit);
    }

    pub fn add(&mut self, edit: Edit) -> Result<(), EditError> {
        self.check(&edit)?;
        self.insert_sorted(edit);
        Ok(())
    }

    /// Adds every edit or none of them.
    pub fn add_all(&mut self, edits: Vec<Edit>) -> Result<(), EditError> {
        let mut staged = self.clone();
        for edit in edits {
            staged.add(edit)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn validate(&self, source: &str) -> Result<(), EditError> {
        let mut previous: Option<&Edit> = None;
        for edit in &self.edits {
            edit.validate(source)?;
            if let Some(prev) = previous {
                if prev.conflicts_with(edit) {
                    return Err(EditError::Overlap {
                        existing: prev.span,
                        new: edit.span,
                    });
                }
            }
            previous = Some(edit);
        }
        Ok(())
    }

    /// Produces the edited text. `source` itself is left untouched.
    pub fn apply(&self, source: &str) -> Result<String, EditError> {
        self.validate(source)?;
        let inserted: usize = self.edits.iter().map(|e| e.replacement.len()).sum();
        let mut out = String::with_capacity(source.len() + inserted);
        let mut cursor = 0;
        for edit in &self.edits {
            out.push_str(&source[cursor..edit.span.start]);
            out.push_str(&edit.replacement);
            cursor = edit.span.end;
        }
        out.push_str(&source[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end)
    }

    #[test]
    fn test_empty_set_returns_source() {
        let set = EditSet::new();
        assert_eq!(set.apply("hello world").unwrap(), "hello world");
    }

    #[test]
    fn test_replacements_apply_in_order() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(8, 11), "GHI")).unwrap();
        set.add(Edit::replace(span(0, 3), "ABC")).unwrap();
        assert_eq!(set.apply("abc def ghi").unwrap(), "ABC def GHI");
    }

    #[test]
    fn test_delete_and_insert() {
        let mut set = EditSet::new();
        set.add(Edit::remove(span(5, 6))).unwrap();
        set.add(Edit::insert(0, ">")).unwrap();
        assert_eq!(set.apply("hello world").unwrap(), ">helloworld");
    }

    #[test]
    fn test_overlap_rejected() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(2, 6), "XX")).unwrap();
        let err = set.add(Edit::replace(span(4, 8), "YY")).unwrap_err();
        assert_eq!(
            err,
            EditError::Overlap {
                existing: span(2, 6),
                new: span(4, 8)
            }
        );
        assert_eq!(set.apply("abcdefgh").unwrap(), "abXXgh");
    }

    #[test]
    fn test_insertions_at_same_offset_conflict() {
        let mut set = EditSet::new();
        set.add(Edit::insert(3, "a")).unwrap();
        assert!(set.add(Edit::insert(3, "b")).is_err());
    }

    #[test]
    fn test_insertion_at_replacement_start_is_allowed() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(2, 4), "XY")).unwrap();
        set.add(Edit::insert(2, "!")).unwrap();
        assert_eq!(set.apply("abcdef").unwrap(), "ab!XYef");
    }

    #[test]
    fn test_insertion_inside_replacement_conflicts() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(2, 5), "X")).unwrap();
        assert!(set.add(Edit::insert(3, "!")).is_err());
    }

    #[test]
    fn test_add_all_is_atomic() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(0, 2), "A")).unwrap();
        let result = set.add_all(vec![
            Edit::replace(span(4, 5), "B"),
            Edit::replace(span(1, 3), "C"),
        ]);
        assert!(result.is_err());
        assert_eq!(set.len(), 1);
        assert_eq!(set.apply("abcdef").unwrap(), "Acdef");
    }

    #[test]
    fn test_invalid_offset() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(2, 10), "x")).unwrap();
        assert_eq!(
            set.apply("abc").unwrap_err(),
            EditError::InvalidOffset { offset: 10, len: 3 }
        );
    }

    #[test]
    fn test_invalid_range() {
        let edit = Edit::replace(Span { start: 3, end: 1 }, "x");
        assert_eq!(
            edit.validate("abcdef").unwrap_err(),
            EditError::InvalidRange { start: 3, end: 1 }
        );
    }

    #[test]
    fn test_utf8_boundary() {
        let mut set = EditSet::new();
        set.add(Edit::replace(span(1, 2), "x")).unwrap();
        assert_eq!(
            set.apply("é").unwrap_err(),
            EditError::InvalidUtf8Boundary { offset: 1 }
        );
    }

    #[test]
    fn test_corrector_collects_in_call_order() {
        let mut corrector = Corrector::new();
        corrector.replace(span(4, 6), "b");
        corrector.insert_before(span(0, 1), "[");
        corrector.insert_after(span(0, 1), "]");
        corrector.remove(span(7, 8));
        let edits = corrector.into_edits();
        assert_eq!(
            edits,
            vec![
                Edit::replace(span(4, 6), "b"),
                Edit::insert(0, "["),
                Edit::insert(1, "]"),
                Edit::remove(span(7, 8)),
            ]
        );
    }
}
