// Prompts for the generation service.

use crate::schema::Field;

/// System role for the planner that writes test cases in the ledger's format.
pub const SYSTEM_PROMPT_PLANNER: &str = r#"
You are an expert QA test planner.
Generate comprehensive test cases for the instruction and site insights you are given:
first the core flows (basic flow, alternative flows, pre-conditions, post-conditions,
validation rules), then Functional, Negative, Boundary, Performance, Security,
Integration, Usability, Regression, Smoke, Sanity, Database, End-to-End and
Exploratory cases where they apply.

## OUTPUT FORMAT (STRICT)
Structure the response with one section per test type (e.g. ## Functional Test Cases).
Under each section, number the test cases and write every field on its own line:

- Test Case ID: TC-<number>
- High Level Feature
- Feature Name
- Test Scenario
- Test Case
- Test Case Description
- Step-by-step actions
- Possible Values (Type 'None' if there is none)
- Sources (Type 'N/A' if there is none)
- Expected Result
- Data Correctness Checked (Type 'N/A' if not applicable)
- Release/Platform Version (Web/Mobile/IOS/Android etc. Type 'N/A' if not applicable)
- Automation Possibility (Yes/No)
- Testing Type
- Priority (High, Medium, Low)
- Testing Phase: QA

## GUIDELINES
1. Use the exact sub-headings listed above.
2. Number Test Case IDs sequentially starting from 1 (TC-1, TC-2, ...).
3. Every field except `Step-by-step actions` MUST be a single line using the bullet (`*`) prefix.
4. `Step-by-step actions` is a paragraph with all steps in sequence, without bullets.
5. Do not include locator recommendations in any field.
6. Output only the test cases, no explanations.
"#;

/// System role used for the two constrained edit calls.
pub const SYSTEM_PROMPT_EDITOR: &str =
    "You are a strict QA editor. You answer with exactly what is asked for and nothing else.";

/// Asks for the single field an edit instruction targets.
pub fn field_detection_prompt(instruction: &str, fields: &[Field]) -> String {
    let field_list = fields
        .iter()
        .map(|field| format!("'{}'", field.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a QA assistant.\n\n\
        Given this edit instruction:\n\"{}\"\n\n\
        And this list of available fields:\n[{}]\n\n\
        Return ONLY the exact field name that should be edited.\n\
        Do not return anything else.",
        instruction, field_list
    )
}

/// Asks for the replacement value of one field.
pub fn value_regeneration_prompt(instruction: &str, field: Field, current_value: &str) -> String {
    let shape = if field.is_multi_line() {
        "Write the steps as a sequence, one step per line."
    } else {
        "Write the value on a single line."
    };

    format!(
        "Instruction:\n\"{}\"\n\n\
        Field Name:\n{}\n\n\
        Original Value:\n{}\n\n\
        Return ONLY the updated value.\n\
        Do NOT include the field name.\n\
        Do NOT include bullets.\n\
        Do NOT include extra text.\n\
        {}",
        instruction,
        field.label(),
        current_value,
        shape
    )
}

/// Builds the planner input for a feedback round that adds new test cases.
pub fn feedback_prompt(feedback: &str, last_id: Option<&str>) -> String {
    let continuation = match last_id {
        Some(id) => format!("The last generated Test Case ID is {}. Continue numbering after it.", id),
        None => "Number the Test Case IDs sequentially starting from TC-1.".to_string(),
    };

    format!(
        "You have already generated a set of test cases. A human user now wants you to ADD MORE \
        test cases based on the following feedback.\n\
        **IMPORTANT: Generate ONLY the NEW test cases requested. Do NOT repeat or modify the \
        previously generated ones.**\n\n\
        Follow exactly the output format and guidelines from your instructions.\n\
        {}\n\n\
        Feedback: '{}'",
        continuation, feedback
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_prompt_lists_fields() {
        let prompt = field_detection_prompt(
            "increase priority to High",
            &[Field::TestCaseId, Field::Priority],
        );
        assert!(prompt.contains("\"increase priority to High\""));
        assert!(prompt.contains("['Test Case ID', 'Priority']"));
    }

    #[test]
    fn test_value_prompt_mentions_shape() {
        let prompt = value_regeneration_prompt("add a logout step", Field::StepByStepActions, "1. Login");
        assert!(prompt.contains("Step-by-step actions"));
        assert!(prompt.contains("one step per line"));
    }

    #[test]
    fn test_feedback_prompt_continues_numbering() {
        let prompt = feedback_prompt("cover password reset", Some("TC-3"));
        assert!(prompt.contains("TC-3"));
        assert!(prompt.contains("'cover password reset'"));
    }
}
