use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The recognized test-case fields, declared in canonical (export) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "Test Case ID")]
    TestCaseId,
    #[serde(rename = "High Level Feature")]
    HighLevelFeature,
    #[serde(rename = "Feature Name")]
    FeatureName,
    #[serde(rename = "Test Scenario")]
    TestScenario,
    #[serde(rename = "Test Case")]
    TestCase,
    #[serde(rename = "Test Case Description")]
    TestCaseDescription,
    #[serde(rename = "Step-by-step actions")]
    StepByStepActions,
    #[serde(rename = "Possible Values")]
    PossibleValues,
    #[serde(rename = "Sources")]
    Sources,
    #[serde(rename = "Expected Result")]
    ExpectedResult,
    #[serde(rename = "Data Correctness Checked")]
    DataCorrectnessChecked,
    #[serde(rename = "Release/Platform Version")]
    ReleasePlatformVersion,
    #[serde(rename = "Automation Possibility")]
    AutomationPossibility,
    #[serde(rename = "Testing Type")]
    TestingType,
    #[serde(rename = "Priority")]
    Priority,
    #[serde(rename = "Testing Phase")]
    TestingPhase,
}

/// Static description of one recognized field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    /// Canonical label, as written by the generator and by the rebuilder.
    pub label: &'static str,
    /// Value used when the field is absent from a record.
    pub default: &'static str,
    /// Only the step sequence keeps its line breaks.
    pub multi_line: bool,
    /// Alternative labels accepted on field lines.
    pub aliases: &'static [&'static str],
    /// Extra phrases that point at this field in a free-text edit instruction.
    pub keywords: &'static [&'static str],
}

pub const FIELD_SCHEMA: [FieldSpec; 16] = [
    FieldSpec {
        field: Field::TestCaseId,
        label: "Test Case ID",
        default: "",
        multi_line: false,
        aliases: &["TC ID", "Test ID"],
        keywords: &["id", "identifier"],
    },
    FieldSpec {
        field: Field::HighLevelFeature,
        label: "High Level Feature",
        default: "",
        multi_line: false,
        aliases: &["High-Level Feature"],
        keywords: &["high level", "module"],
    },
    FieldSpec {
        field: Field::FeatureName,
        label: "Feature Name",
        default: "",
        multi_line: false,
        aliases: &[],
        keywords: &["feature"],
    },
    FieldSpec {
        field: Field::TestScenario,
        label: "Test Scenario",
        default: "",
        multi_line: false,
        aliases: &[],
        keywords: &["scenario"],
    },
    FieldSpec {
        field: Field::TestCase,
        label: "Test Case",
        default: "",
        multi_line: false,
        aliases: &[],
        keywords: &[],
    },
    FieldSpec {
        field: Field::TestCaseDescription,
        label: "Test Case Description",
        default: "",
        multi_line: false,
        aliases: &["Description"],
        keywords: &["description", "describe"],
    },
    FieldSpec {
        field: Field::StepByStepActions,
        label: "Step-by-step actions",
        default: "",
        multi_line: true,
        aliases: &["Steps", "Test Steps"],
        keywords: &["steps", "step", "actions"],
    },
    FieldSpec {
        field: Field::PossibleValues,
        label: "Possible Values",
        default: "",
        multi_line: false,
        aliases: &["Test Data"],
        keywords: &["values", "input data", "test data"],
    },
    FieldSpec {
        field: Field::Sources,
        label: "Sources",
        default: "",
        multi_line: false,
        aliases: &["Source"],
        keywords: &["source", "database"],
    },
    FieldSpec {
        field: Field::ExpectedResult,
        label: "Expected Result",
        default: "",
        multi_line: false,
        aliases: &["Expected Results", "Expected Outcome"],
        keywords: &["expected", "outcome", "result"],
    },
    FieldSpec {
        field: Field::DataCorrectnessChecked,
        label: "Data Correctness Checked",
        default: "",
        multi_line: false,
        aliases: &[],
        keywords: &["data correctness", "correctness"],
    },
    FieldSpec {
        field: Field::ReleasePlatformVersion,
        label: "Release/Platform Version",
        default: "",
        multi_line: false,
        aliases: &["Platform Version", "Release Version"],
        keywords: &["platform", "release", "version"],
    },
    FieldSpec {
        field: Field::AutomationPossibility,
        label: "Automation Possibility",
        default: "",
        multi_line: false,
        aliases: &["Automatable"],
        keywords: &["automation", "automate"],
    },
    FieldSpec {
        field: Field::TestingType,
        label: "Testing Type",
        default: "",
        multi_line: false,
        aliases: &["Test Type"],
        keywords: &["type"],
    },
    FieldSpec {
        field: Field::Priority,
        label: "Priority",
        default: "",
        multi_line: false,
        aliases: &[],
        keywords: &["severity", "importance"],
    },
    FieldSpec {
        field: Field::TestingPhase,
        label: "Testing Phase",
        default: "",
        multi_line: false,
        aliases: &["Test Phase"],
        keywords: &["phase"],
    },
];

/// One anchored, case-insensitive pattern per field covering its label and aliases.
static LABEL_PATTERNS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    FIELD_SCHEMA
        .iter()
        .map(|spec| {
            let alternatives = std::iter::once(spec.label)
                .chain(spec.aliases.iter().copied())
                .map(label_pattern)
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)^(?:{})$", alternatives);
            (spec.field, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Words of a label joined by any run of whitespace, underscores, dashes or slashes.
fn label_pattern(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/')
        .filter(|word| !word.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[\s_\-/]*")
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::TestCaseId,
        Field::HighLevelFeature,
        Field::FeatureName,
        Field::TestScenario,
        Field::TestCase,
        Field::TestCaseDescription,
        Field::StepByStepActions,
        Field::PossibleValues,
        Field::Sources,
        Field::ExpectedResult,
        Field::DataCorrectnessChecked,
        Field::ReleasePlatformVersion,
        Field::AutomationPossibility,
        Field::TestingType,
        Field::Priority,
        Field::TestingPhase,
    ];

    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_SCHEMA[self.index()]
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn default_value(self) -> &'static str {
        self.spec().default
    }

    pub fn is_multi_line(self) -> bool {
        self.spec().multi_line
    }

    /// Position of the field in canonical column order.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a label token to its canonical field.
///
/// The token may carry emphasis markers, backticks, quotes, a bullet, a trailing
/// colon or stray whitespace; matching is case-insensitive and tolerant of
/// spacing between words (`TestCaseID`, `Testing_Type`).
pub fn resolve_label(token: &str) -> Option<Field> {
    let cleaned = clean_label_token(token);
    if cleaned.is_empty() {
        return None;
    }

    LABEL_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&cleaned))
        .map(|(field, _)| *field)
}

fn clean_label_token(token: &str) -> String {
    let first_line = token
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    first_line
        .trim_start_matches(['-', '•', '+'])
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\'' | '[' | ']'))
        .trim()
        .trim_end_matches([':', '.'])
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\''))
        .trim()
        .to_string()
}
