use crate::error::{LedgerError, Result};
use crate::record::{FieldEntry, Record};
use crate::scan::{clean_value, HeadingStyle, LineKind, Scanned};
use crate::schema::Field;
use log::{debug, warn};
use std::ops::Range;

/// How the corpus is cut into record blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Numeric (`2.`), emphasized (`1. **Login**`) or markdown headings that are
    /// immediately followed by a field line.
    Heading,
    /// Plain `<n>. title` lines followed by a `Test Case ID` line.
    NumberedLine,
}

impl SplitStrategy {
    /// Strategies in the order they are attempted.
    pub const PRIORITY: [SplitStrategy; 2] = [SplitStrategy::Heading, SplitStrategy::NumberedLine];
}

/// Extracts every record from the corpus, in source order.
///
/// Returns an empty vector when no strategy recognizes any record.
pub fn extract(text: &str) -> Vec<Record> {
    extract_with_strategy(text)
        .map(|(_, records)| records)
        .unwrap_or_default()
}

/// Like [`extract`], reporting which strategy produced the records.
pub fn extract_with_strategy(text: &str) -> Option<(SplitStrategy, Vec<Record>)> {
    let scanned = Scanned::new(text);
    let found = SplitStrategy::PRIORITY
        .iter()
        .find_map(|strategy| try_strategy(*strategy, &scanned).map(|records| (*strategy, records)));

    match &found {
        Some((strategy, records)) => {
            debug!("Extracted {} records using {:?}", records.len(), strategy)
        }
        None => debug!("No record boundaries recognized in {} bytes", text.len()),
    }
    found
}

/// Like [`extract`], but an empty result is reported as [`LedgerError::ExtractionEmpty`].
pub fn extract_checked(text: &str) -> Result<Vec<Record>> {
    let records = extract(text);
    if records.is_empty() {
        warn!("No test cases were parsed; check the generated output format");
        return Err(LedgerError::ExtractionEmpty {
            raw: text.to_string(),
        });
    }
    Ok(records)
}

/// Parses a single record block such as the one returned by the locator.
///
/// A bare numeric heading at the top of the block is kept as the record's
/// numeric heading.
pub fn parse_block(block: &str) -> Record {
    let scanned = Scanned::new(block);
    parse_lines(&scanned, 0..scanned.len()).record
}

fn try_strategy(strategy: SplitStrategy, scanned: &Scanned<'_>) -> Option<Vec<Record>> {
    let starts: Vec<usize> = scanned
        .marks
        .iter()
        .enumerate()
        .filter(|(_, mark)| match strategy {
            SplitStrategy::Heading => mark.heading,
            SplitStrategy::NumberedLine => mark.numbered,
        })
        .map(|(idx, _)| idx)
        .collect();

    if starts.is_empty() {
        return None;
    }

    let records = starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(scanned.len());
            let mut record = parse_lines(scanned, start + 1..end).record;
            if let LineKind::Heading(heading) = &scanned.kinds[start] {
                record.numeric_heading = heading.ordinal.clone();
                record.heading_title = heading.title.clone();
            }
            if record.id().is_empty() {
                debug!("Record at line {} has no Test Case ID", start + 1);
            }
            record
        })
        .collect();

    Some(records)
}

pub(crate) struct ParsedLines {
    pub record: Record,
    /// Index of the last line whose content belongs to a field.
    pub last_line: Option<usize>,
}

/// Collects field values from a run of lines.
///
/// A value runs from its label to the next label, the next record boundary or a
/// non-numbered heading. A second `Test Case ID` ends the record; any other
/// repeated label is kept as text of the value being collected.
pub(crate) fn parse_lines(scanned: &Scanned<'_>, range: Range<usize>) -> ParsedLines {
    let mut raw: Vec<(Field, Vec<&str>)> = Vec::new();
    let mut prefix = None;
    let mut numeric_heading = None;
    let mut last_line = None;

    for idx in range {
        if !raw.is_empty() && scanned.marks[idx].any() {
            break;
        }

        let text = scanned.lines[idx].text;
        match &scanned.kinds[idx] {
            LineKind::Blank => {}
            LineKind::Label {
                prefix: line_prefix,
                field,
                value,
            } => {
                if raw.iter().any(|(seen, _)| seen == field) {
                    if *field == Field::TestCaseId {
                        debug!("Second Test Case ID at line {} ends the record", idx + 1);
                        break;
                    }
                    if let Some((_, lines)) = raw.last_mut() {
                        lines.push(text);
                        last_line = Some(idx);
                    }
                    continue;
                }
                if raw.is_empty() {
                    prefix = *line_prefix;
                }
                raw.push((*field, vec![value]));
                last_line = Some(idx);
            }
            LineKind::Heading(heading) => {
                if raw.is_empty() {
                    if heading.style == HeadingStyle::Bare {
                        numeric_heading = heading.ordinal.clone();
                    }
                    continue;
                }
                // `2. **Click Login**` inside a step list is a step, not a heading.
                let in_steps = raw.last().is_some_and(|(field, _)| field.is_multi_line());
                let numbered_step = heading.style == HeadingStyle::Emphasized
                    && heading.ordinal.is_some()
                    && in_steps;
                if heading.style != HeadingStyle::Plain && !numbered_step {
                    break;
                }
                if let Some((_, lines)) = raw.last_mut() {
                    lines.push(text);
                    last_line = Some(idx);
                }
            }
            LineKind::Text => {
                if let Some((_, lines)) = raw.last_mut() {
                    lines.push(text);
                    last_line = Some(idx);
                }
            }
        }
    }

    let fields = raw
        .into_iter()
        .map(|(field, lines)| FieldEntry {
            field,
            value: clean_value(field, &lines.join("\n")),
        })
        .collect();

    ParsedLines {
        record: Record {
            fields,
            prefix,
            numeric_heading,
            heading_title: None,
        },
        last_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOLD_CORPUS: &str = "\
## Functional Test Cases

1. **Login with valid credentials**
   * Test Case ID: TC-1
   * Feature Name: Valid login
   * Step-by-step actions: 1. Open the login page
     2. Enter valid credentials
     3. Click **Login**
   * Expected Result: User lands on
     the dashboard
   * Priority: High

2. **Login with invalid password**
   * Test Case ID: TC-2
   * High Level Feature: Authentication
   * Priority: Medium

## Negative Test Cases

3. **Empty form**
   * Test Case ID: TC-3
   * Sources: N/A
   * Possible Values: None
";

    #[test]
    fn test_extract_emphasized_headings() {
        let (strategy, records) = extract_with_strategy(BOLD_CORPUS).unwrap();
        assert_eq!(strategy, SplitStrategy::Heading);
        assert_eq!(records.len(), 3);

        let ids: Vec<&str> = records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["TC-1", "TC-2", "TC-3"]);

        let first = &records[0];
        assert_eq!(first.numeric_heading.as_deref(), Some("1"));
        assert_eq!(first.prefix, Some('*'));
        assert_eq!(
            first.get(Field::StepByStepActions),
            Some("1. Open the login page\n2. Enter valid credentials\n3. Click Login")
        );
        assert_eq!(
            first.get(Field::ExpectedResult),
            Some("User lands on the dashboard")
        );
        assert_eq!(
            first.value_or_default(Field::HighLevelFeature),
            "Login with valid credentials"
        );
    }

    #[test]
    fn test_section_headings_do_not_leak_into_values() {
        let records = extract(BOLD_CORPUS);
        assert_eq!(records[1].get(Field::Priority), Some("Medium"));
        assert_eq!(
            records[1].value_or_default(Field::HighLevelFeature),
            "Authentication"
        );
    }

    #[test]
    fn test_placeholders_are_kept_verbatim() {
        let records = extract(BOLD_CORPUS);
        assert_eq!(records[2].get(Field::Sources), Some("N/A"));
        assert_eq!(records[2].get(Field::PossibleValues), Some("None"));
        assert_eq!(records[2].get(Field::Priority), None);
        assert_eq!(records[2].value_or_default(Field::Priority), "");
    }

    #[test]
    fn test_fields_in_any_order_and_bold_labels() {
        let text = "\
1. **Search**
- **Priority:** Low
- **Test Case ID:** TC-9
- **Testing_Type**: Functional
- Testing Phase : QA
";
        let records = extract(text);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id(), "TC-9");
        assert_eq!(record.prefix, Some('-'));
        assert_eq!(
            record.present_fields(),
            vec![
                Field::Priority,
                Field::TestCaseId,
                Field::TestingType,
                Field::TestingPhase
            ]
        );
        assert_eq!(record.get(Field::TestingType), Some("Functional"));
        assert_eq!(record.get(Field::TestingPhase), Some("QA"));
    }

    #[test]
    fn test_bare_numeric_headings() {
        let text = "1.\n\n* Test Case ID: TC-1\n* Priority: Low\n\n2.\n\n* Test Case ID: TC-2\n* Priority: High\n";
        let (strategy, records) = extract_with_strategy(text).unwrap();
        assert_eq!(strategy, SplitStrategy::Heading);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].numeric_heading.as_deref(), Some("2"));
        assert_eq!(records[1].get(Field::Priority), Some("High"));
    }

    #[test]
    fn test_fallback_numbered_lines() {
        let text = "\
1. Login with valid credentials
- Test Case ID: TC-1
- Step-by-step actions: Open the page
1. Type the password
2. Submit
- Priority: High

2. Login with expired account
- Test Case ID: TC-2
- Priority: Low
";
        let (strategy, records) = extract_with_strategy(text).unwrap();
        assert_eq!(strategy, SplitStrategy::NumberedLine);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].heading_title.as_deref(),
            Some("Login with valid credentials")
        );
        assert_eq!(
            records[0].get(Field::StepByStepActions),
            Some("Open the page\n1. Type the password\n2. Submit")
        );
        assert_eq!(records[1].id(), "TC-2");
    }

    #[test]
    fn test_unrecognized_text_yields_nothing() {
        let text = "Sorry, I cannot help with generating test cases for this site.";
        assert!(extract(text).is_empty());
        assert!(extract_with_strategy(text).is_none());
        assert!(matches!(
            extract_checked(text),
            Err(LedgerError::ExtractionEmpty { raw }) if raw == text
        ));
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_parse_block_keeps_heading_and_prefix() {
        let block = "4.\n\n• Test Case ID: TC-4\n• Test Scenario: Logout\n• Priority: Low";
        let record = parse_block(block);
        assert_eq!(record.numeric_heading.as_deref(), Some("4"));
        assert_eq!(record.prefix, Some('•'));
        assert_eq!(
            record.present_fields(),
            vec![Field::TestCaseId, Field::TestScenario, Field::Priority]
        );
    }

    #[test]
    fn test_bold_numbered_step_stays_in_record() {
        let text = "\
1. **Login**
* Test Case ID: TC-1
* Step-by-step actions:
1. Open the page
2. **Click Login**
* Expected Result: Dashboard
* Priority: High

2. **Logout**
* Test Case ID: TC-2
* Priority: Low
";
        let records = extract(text);
        let ids: Vec<&str> = records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["TC-1", "TC-2"]);
        assert_eq!(
            records[0].get(Field::StepByStepActions),
            Some("1. Open the page\n2. Click Login")
        );
        assert_eq!(records[0].get(Field::ExpectedResult), Some("Dashboard"));
        assert_eq!(records[0].get(Field::Priority), Some("High"));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        assert_eq!(extract(BOLD_CORPUS), extract(BOLD_CORPUS));
    }
}
