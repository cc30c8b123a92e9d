use thiserror::Error;

/// The fundamental rewrite primitive: a pending byte-span replacement.
///
/// All high-level operations (reference rewriting, template edits) compile
/// down to this single primitive. Intelligence lives in span acquisition,
/// not application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditSpan does nothing until spliced into the source text"]
pub struct EditSpan {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
}

impl EditSpan {
    pub fn new(byte_start: usize, byte_end: usize, new_text: impl Into<String>) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
        }
    }

    /// Validate this span against the source it will be applied to.
    fn validate(&self, source: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > source.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                source_len: source.len(),
            });
        }
        if !source.is_char_boundary(self.byte_start) || !source.is_char_boundary(self.byte_end) {
            return Err(EditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("invalid byte range: [{byte_start}, {byte_end}) in text of length {source_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        source_len: usize,
    },

    #[error("byte range [{byte_start}, {byte_end}) splits a UTF-8 character")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error("overlapping spans: [{first_start}, {first_end}) and [{second_start}, {second_end})")]
    OverlappingSpans {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },
}

/// Apply a set of non-overlapping spans to `source`, returning the new text.
///
/// Spans are sorted descending by `byte_start` and folded bottom-to-top, so
/// offsets of not-yet-applied spans (all at lower positions) stay valid
/// throughout. An overlapping span set is a programmer error in the span
/// producer and fails fast rather than silently corrupting text.
pub fn splice(source: &str, spans: &[EditSpan]) -> Result<String, EditError> {
    if spans.is_empty() {
        return Ok(source.to_string());
    }

    for span in spans {
        span.validate(source)?;
    }

    let mut ordered: Vec<&EditSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

    // Sorted descending: the later-in-text span comes first in `ordered`.
    for window in ordered.windows(2) {
        let (later, earlier) = (window[0], window[1]);
        if earlier.byte_end > later.byte_start {
            return Err(EditError::OverlappingSpans {
                first_start: earlier.byte_start,
                first_end: earlier.byte_end,
                second_start: later.byte_start,
                second_end: later.byte_end,
            });
        }
    }

    let mut text = source.to_string();
    for span in ordered {
        let mut updated = String::with_capacity(
            text.len() + span.new_text.len() - (span.byte_end - span.byte_start),
        );
        updated.push_str(&text[..span.byte_start]);
        updated.push_str(&span.new_text);
        updated.push_str(&text[span.byte_end..]);
        text = updated;
    }

    Ok(text)
}
