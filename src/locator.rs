use crate::error::{LedgerError, Result};
use crate::extractor::parse_lines;
use crate::scan::{HeadingStyle, LineKind, Scanned};
use crate::schema::Field;
use log::debug;
use std::ops::Range;

/// The exact textual region of one record inside the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Byte range of the record in the corpus.
    pub span: Range<usize>,
    /// The text covered by `span`.
    pub block: String,
}

/// Finds the record whose `Test Case ID` equals `record_id` exactly.
///
/// The span starts at the identity line, or at a bare `<n>.` heading separated
/// from it only by blank lines, and ends with the last line belonging to the
/// record's fields. Text after that (blank lines, section headings, the next
/// record) is left outside the span.
pub fn locate(text: &str, record_id: &str) -> Result<Located> {
    let wanted = record_id.trim();
    let scanned = Scanned::new(text);

    // The ID is read the way the extractor reads it, continuation lines included.
    let (id_line, parsed) = scanned
        .kinds
        .iter()
        .enumerate()
        .filter(|(_, kind)| {
            matches!(
                kind,
                LineKind::Label {
                    field: Field::TestCaseId,
                    ..
                }
            )
        })
        .map(|(idx, _)| (idx, parse_lines(&scanned, idx..scanned.len())))
        .find(|(_, parsed)| !wanted.is_empty() && parsed.record.id() == wanted)
        .ok_or_else(|| LedgerError::RecordNotFound {
            record_id: wanted.to_string(),
        })?;

    let first_line = heading_above(&scanned, id_line).unwrap_or(id_line);
    let last_line = parsed.last_line.unwrap_or(id_line);

    let span = scanned.lines[first_line].start..scanned.lines[last_line].end;
    debug!(
        "Located {} at bytes {}..{} (lines {}..={})",
        wanted,
        span.start,
        span.end,
        first_line + 1,
        last_line + 1
    );

    Ok(Located {
        block: text[span.clone()].to_string(),
        span,
    })
}

/// A bare numeric heading directly above `line`, ignoring blank lines.
fn heading_above(scanned: &Scanned<'_>, line: usize) -> Option<usize> {
    let above = (0..line)
        .rev()
        .find(|&idx| scanned.kinds[idx] != LineKind::Blank)?;

    match &scanned.kinds[above] {
        LineKind::Heading(heading) if heading.style == HeadingStyle::Bare => Some(above),
        _ => None,
    }
}

/// Replaces `span` of `text` with `replacement`.
pub fn splice(text: &str, span: &Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..span.start]);
    out.push_str(replacement);
    out.push_str(&text[span.end..]);
    out
}
