//! Turns a whole-document rewrite into ordered edit operations
//!
//! Offsets are character offsets into the pre-edit text. Each contiguous run
//! of changes becomes one delete followed by one insert; the insert starts
//! where the deleted range ends, so operations are sorted and never overlap.

use serde::{Deserialize, Serialize};

use super::diff::diff;

/// What an edit operation does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// An atomic edit expressed in original-text character offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOperation {
    pub kind: EditKind,
    pub start: usize,
    pub length: usize,
    pub text: String,
}

impl EditOperation {
    pub fn delete(start: usize, length: usize) -> Self {
        Self { kind: EditKind::Delete, start, length, text: String::new() }
    }

    pub fn insert(start: usize, text: impl Into<String>) -> Self {
        Self { kind: EditKind::Insert, start, length: 0, text: text.into() }
    }

    /// Swap `length` characters at `start` for `text`: a delete, then an
    /// insert where the deleted range ends
    pub fn substitute(start: usize, length: usize, text: impl Into<String>) -> [Self; 2] {
        [Self::delete(start, length), Self::insert(start + length, text)]
    }

    /// End of the affected range in the original text
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Compute the edits that turn `old_text` into `new_text`.
///
/// Equal texts produce no operations.
pub fn synthesize(old_text: &str, new_text: &str) -> Vec<EditOperation> {
    let mut run = Run::default();
    for chunk in diff(old_text, new_text) {
        let len = chunk.text.chars().count();
        match chunk.kind {
            EditKind::Equal => {
                run.flush();
                run.position += len as isize;
            }
            EditKind::Delete => run.deleted += len,
            EditKind::Insert => run.inserted.push_str(&chunk.text),
        }
    }
    run.flush();
    run.ops
}

/// A contiguous run of changes being collected
#[derive(Default)]
struct Run {
    ops: Vec<EditOperation>,
    /// Position in the new text
    position: isize,
    /// Net length change so far; `position - delta` is the original offset
    delta: isize,
    deleted: usize,
    inserted: String,
}

impl Run {
    fn flush(&mut self) {
        if self.deleted > 0 {
            let start = (self.position - self.delta) as usize;
            self.ops.push(EditOperation::delete(start, self.deleted));
            self.delta -= self.deleted as isize;
            self.deleted = 0;
        }
        if !self.inserted.is_empty() {
            let start = (self.position - self.delta) as usize;
            let count = self.inserted.chars().count() as isize;
            self.ops.push(EditOperation::insert(start, std::mem::take(&mut self.inserted)));
            self.position += count;
            self.delta += count;
        }
    }
}

/// Apply sorted, non-overlapping operations to `text`
pub fn apply_edits(text: &str, ops: &[EditOperation]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for op in ops {
        let start = op.start.clamp(cursor, chars.len());
        out.extend(&chars[cursor..start]);
        cursor = start;
        match op.kind {
            EditKind::Equal => {}
            EditKind::Delete => cursor = (start + op.length).min(chars.len()),
            EditKind::Insert => out.push_str(&op.text),
        }
    }
    out.extend(&chars[cursor..]);
    out
}
