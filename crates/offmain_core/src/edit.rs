//! Byte-range replacements over one source text, with a position map back
//! to the original.

use crate::error::EditError;
use std::ops::Range;

#[derive(Clone, Debug)]
struct Edit {
    range: Range<usize>,
    text: String,
}

/// Accumulates non-overlapping replacements against an immutable source.
/// Offsets always refer to the original text, whatever was applied before.
#[derive(Debug)]
pub struct EditBuffer<'s> {
    source: &'s str,
    prefix: String,
    edits: Vec<Edit>,
}

impl<'s> EditBuffer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            prefix: String::new(),
            edits: Vec::new(),
        }
    }

    pub fn overwrite(&mut self, range: Range<usize>, text: impl Into<String>) -> Result<(), EditError> {
        let Range { start, end } = range;
        if start > end || end > self.source.len() {
            return Err(EditError::OutOfBounds {
                start,
                end,
                len: self.source.len(),
            });
        }
        if !self.source.is_char_boundary(start) || !self.source.is_char_boundary(end) {
            return Err(EditError::NotCharBoundary { start, end });
        }
        let overlaps = self
            .edits
            .iter()
            .any(|edit| start < edit.range.end && edit.range.start < end);
        if overlaps {
            return Err(EditError::Overlap { start, end });
        }
        self.edits.push(Edit {
            range: start..end,
            text: text.into(),
        });
        Ok(())
    }

    pub fn remove(&mut self, range: Range<usize>) -> Result<(), EditError> {
        self.overwrite(range, String::new())
    }

    /// Later prepends land in front of earlier ones.
    pub fn prepend(&mut self, text: &str) {
        self.prefix.insert_str(0, text);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.prefix.is_empty()
    }

    pub fn finish(mut self) -> (String, PositionMap) {
        self.edits.sort_by_key(|edit| edit.range.start);

        let mut out = String::with_capacity(self.source.len() + self.prefix.len());
        let mut segments = Vec::with_capacity(self.edits.len() * 2 + 2);
        let mut cursor = 0;

        if !self.prefix.is_empty() {
            out.push_str(&self.prefix);
            segments.push(Segment {
                generated: 0..out.len(),
                original: 0..0,
                verbatim: false,
            });
        }

        for edit in &self.edits {
            if cursor < edit.range.start {
                push_segment(&mut out, &mut segments, &self.source[cursor..edit.range.start], cursor..edit.range.start, true);
            }
            push_segment(&mut out, &mut segments, &edit.text, edit.range.clone(), false);
            cursor = edit.range.end;
        }
        if cursor < self.source.len() {
            push_segment(&mut out, &mut segments, &self.source[cursor..], cursor..self.source.len(), true);
        }

        (out, PositionMap { segments })
    }
}

fn push_segment(out: &mut String, segments: &mut Vec<Segment>, text: &str, original: Range<usize>, verbatim: bool) {
    let start = out.len();
    out.push_str(text);
    segments.push(Segment {
        generated: start..out.len(),
        original,
        verbatim,
    });
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub generated: Range<usize>,
    pub original: Range<usize>,
    /// Copied unchanged, so offsets map one to one.
    pub verbatim: bool,
}

/// Maps offsets in rewritten text back to the original source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionMap {
    segments: Vec<Segment>,
}

impl PositionMap {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Offset in the original text for a generated offset. Offsets inside a
    /// replacement map to the start of the replaced range.
    pub fn original_offset(&self, generated: usize) -> Option<usize> {
        let segment = self
            .segments
            .iter()
            .find(|segment| segment.generated.contains(&generated))?;
        if segment.verbatim {
            Some(segment.original.start + (generated - segment.generated.start))
        } else {
            Some(segment.original.start)
        }
    }
}
