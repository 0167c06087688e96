use crate::record::{FieldEntry, Record};

/// Renders a record block.
///
/// The numeric heading (if any) is written as `<n>.` followed by a blank line,
/// then one `<prefix> <Label>: <value>` line per field in the given order.
/// Multi-line values continue on the following lines unchanged. Original
/// indentation and spacing are not reproduced.
pub fn render(numeric_heading: Option<&str>, fields: &[FieldEntry], prefix: Option<char>) -> String {
    let mut rebuilt = String::new();

    if let Some(ordinal) = numeric_heading {
        rebuilt.push_str(ordinal);
        rebuilt.push_str(".\n\n");
    }

    for entry in fields {
        if let Some(symbol) = prefix {
            rebuilt.push(symbol);
            rebuilt.push(' ');
        }
        rebuilt.push_str(entry.field.label());
        rebuilt.push(':');
        if !entry.value.is_empty() {
            rebuilt.push(' ');
            rebuilt.push_str(&entry.value);
        }
        rebuilt.push('\n');
    }

    rebuilt.trim().to_string()
}

pub fn render_record(record: &Record) -> String {
    render(
        record.numeric_heading.as_deref(),
        &record.fields,
        record.prefix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::parse_block;
    use crate::schema::Field;

    fn entry(field: Field, value: &str) -> FieldEntry {
        FieldEntry {
            field,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_render_layout() {
        let fields = vec![
            entry(Field::TestCaseId, "TC-2"),
            entry(Field::PossibleValues, ""),
            entry(Field::Priority, "High"),
        ];
        assert_eq!(
            render(Some("2"), &fields, Some('•')),
            "2.\n\n• Test Case ID: TC-2\n• Possible Values:\n• Priority: High"
        );
        assert_eq!(
            render(None, &fields[..1], None),
            "Test Case ID: TC-2"
        );
    }

    #[test]
    fn test_render_then_parse_reproduces_values() {
        let block = "\
7.

- **Test Case ID:** TC-7
- Test Case Description: Checks that an expired
   session redirects to login
- Step-by-step actions:
   1.Open the app
   2. Wait for expiry
- Priority: Low";
        let parsed = parse_block(block);
        let rendered = render_record(&parsed);
        let reparsed = parse_block(&rendered);

        assert_eq!(reparsed, parsed);
        assert_eq!(
            rendered,
            "7.\n\n- Test Case ID: TC-7\n- Test Case Description: Checks that an expired session redirects to login\n- Step-by-step actions: 1. Open the app\n2. Wait for expiry\n- Priority: Low"
        );
    }
}
