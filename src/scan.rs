//! Line-level classification shared by the extractor, the locator and the editor.
//!
//! Generated text is processed one line at a time. Each line is classified once;
//! record boundaries are then decided by looking at the next non-blank line, which
//! stands in for the look-ahead a single regular expression cannot express here.

use crate::schema::{resolve_label, Field};
use once_cell::sync::Lazy;
use regex::Regex;

static LABEL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:([-*•+])[ \t]*)?(?:\*\*|__)?[ \t]*([^:*\n]+?)[ \t]*(?:\*\*|__)?[ \t]*:(.*)$")
        .unwrap()
});

static BARE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:#{1,6}[ \t]*)?(\d+)\.[ \t]*$").unwrap());

static EMPHASIZED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[ \t]*(?:#{1,6}[ \t]*)?(?:(\d+)\.[ \t]*)?(?:\*\*|__)[ \t]*(?:(\d+)\.[ \t]*)?(.+?)[ \t]*(?:\*\*|__)[ \t]*:?[ \t]*$",
    )
    .unwrap()
});

static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*#{1,6}[ \t]+(?:(\d+)\.[ \t]*)?(.+?)[ \t]*$").unwrap()
});

static PLAIN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(\d+)\.[ \t]+(.+?)[ \t]*$").unwrap());

static INLINE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__+|`+").unwrap());

static STEP_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.[ \t]*([^\d\s])").unwrap());

/// One line of a text together with its byte offsets (newline excluded).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeadingStyle {
    /// `2.` alone on a line.
    Bare,
    /// `1. **Login with valid credentials**`
    Emphasized,
    /// `### Login`
    Markdown,
    /// `1. Login with valid credentials`
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Heading {
    pub style: HeadingStyle,
    pub ordinal: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineKind<'a> {
    Blank,
    Label {
        prefix: Option<char>,
        field: Field,
        value: &'a str,
    },
    Heading(Heading),
    Text,
}

pub(crate) fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            lines.push(make_line(text, start, idx));
            start = idx + 1;
        }
    }
    if start < text.len() {
        lines.push(make_line(text, start, text.len()));
    }

    lines
}

fn make_line(text: &str, start: usize, end: usize) -> Line<'_> {
    // A trailing carriage return is not part of the line content.
    let end = if text[start..end].ends_with('\r') {
        end - 1
    } else {
        end
    };
    Line {
        start,
        end,
        text: &text[start..end],
    }
}

pub(crate) fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }

    if let Some(caps) = LABEL_LINE.captures(line) {
        let label = caps.get(2).map_or("", |m| m.as_str());
        if let Some(field) = resolve_label(label) {
            let prefix = caps.get(1).and_then(|m| m.as_str().chars().next());
            let value = caps.get(3).map_or("", |m| m.as_str());
            return LineKind::Label {
                prefix,
                field,
                value,
            };
        }
    }

    if let Some(caps) = BARE_HEADING.captures(line) {
        return LineKind::Heading(Heading {
            style: HeadingStyle::Bare,
            ordinal: caps.get(1).map(|m| m.as_str().to_string()),
            title: None,
        });
    }

    if let Some(caps) = EMPHASIZED_HEADING.captures(line) {
        let title = caps.get(3).map_or("", |m| m.as_str());
        if resolve_label(title).is_none() {
            return LineKind::Heading(Heading {
                style: HeadingStyle::Emphasized,
                ordinal: caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string()),
                title: clean_title(title),
            });
        }
    }

    if let Some(caps) = MARKDOWN_HEADING.captures(line) {
        return LineKind::Heading(Heading {
            style: HeadingStyle::Markdown,
            ordinal: caps.get(1).map(|m| m.as_str().to_string()),
            title: clean_title(caps.get(2).map_or("", |m| m.as_str())),
        });
    }

    if let Some(caps) = PLAIN_HEADING.captures(line) {
        return LineKind::Heading(Heading {
            style: HeadingStyle::Plain,
            ordinal: caps.get(1).map(|m| m.as_str().to_string()),
            title: clean_title(caps.get(2).map_or("", |m| m.as_str())),
        });
    }

    LineKind::Text
}

fn clean_title(raw: &str) -> Option<String> {
    let title = INLINE_MARKUP.replace_all(raw, "");
    let title = title.trim().trim_end_matches(':').trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Which split strategy treats a line as the start of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Boundary {
    /// A numeric or emphasized heading directly followed by a field line.
    pub heading: bool,
    /// A plain `<n>. title` line directly followed by a `Test Case ID` line.
    pub numbered: bool,
}

impl Boundary {
    pub fn any(self) -> bool {
        self.heading || self.numbered
    }
}

/// Computes, for every line, whether it opens a record under either strategy.
///
/// A heading boundary also needs a `Test Case ID` before the next candidate
/// heading, so a bold numbered step followed by a field line stays inside its
/// record.
pub(crate) fn boundaries(kinds: &[LineKind<'_>]) -> Vec<Boundary> {
    let mut marks: Vec<Boundary> = kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| {
            let LineKind::Heading(heading) = kind else {
                return Boundary::default();
            };
            let next_field = next_non_blank(kinds, idx + 1).and_then(|next| match &kinds[next] {
                LineKind::Label { field, .. } => Some(*field),
                _ => None,
            });

            match (heading.style, next_field) {
                (HeadingStyle::Plain, Some(Field::TestCaseId)) => {
                    Boundary {
                        heading: false,
                        numbered: heading.ordinal.is_some(),
                    }
                }
                (HeadingStyle::Plain, _) | (_, None) => Boundary::default(),
                (_, Some(_)) => Boundary {
                    heading: true,
                    numbered: false,
                },
            }
        })
        .collect();

    let candidates: Vec<usize> = (0..marks.len()).filter(|&idx| marks[idx].heading).collect();
    for (n, &start) in candidates.iter().enumerate() {
        let end = candidates.get(n + 1).copied().unwrap_or(kinds.len());
        let has_id = kinds[start + 1..end].iter().any(|kind| {
            matches!(
                kind,
                LineKind::Label {
                    field: Field::TestCaseId,
                    ..
                }
            )
        });
        if !has_id {
            marks[start].heading = false;
        }
    }
    marks
}

/// A text split into lines with each line classified and boundary-marked.
pub(crate) struct Scanned<'a> {
    pub lines: Vec<Line<'a>>,
    pub kinds: Vec<LineKind<'a>>,
    pub marks: Vec<Boundary>,
}

impl<'a> Scanned<'a> {
    pub fn new(text: &'a str) -> Self {
        let lines = split_lines(text);
        let kinds: Vec<LineKind<'a>> = lines.iter().map(|line| classify(line.text)).collect();
        let marks = boundaries(&kinds);
        Self {
            lines,
            kinds,
            marks,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

fn next_non_blank(kinds: &[LineKind<'_>], from: usize) -> Option<usize> {
    (from..kinds.len()).find(|&idx| kinds[idx] != LineKind::Blank)
}

/// Strips emphasis markup and folds line breaks according to the field's rules.
///
/// Multi-line values keep one step per line with `N. ` numbering; every other
/// value is collapsed to a single line. The function is idempotent.
pub(crate) fn clean_value(field: Field, raw: &str) -> String {
    let stripped = INLINE_MARKUP.replace_all(raw, "");
    let lines = stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    if field.is_multi_line() {
        lines
            .map(|line| STEP_NUMBER.replace(line, "$1. $2").into_owned())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        lines.collect::<Vec<_>>().join(" ")
    }
}
