use crate::config::LedgerConfig;
use crate::error::{EditStep, LedgerError, Result};
use crate::event::{send_event, LedgerEvent};
use crate::extractor::parse_block;
use crate::llm::prompts::{field_detection_prompt, value_regeneration_prompt, SYSTEM_PROMPT_EDITOR};
use crate::llm::{clean_response, GenerationService};
use crate::rebuild::render_record;
use crate::record::Record;
use crate::scan::clean_value;
use crate::schema::{resolve_label, Field};
use async_trait::async_trait;
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Picks the field an edit instruction targets.
///
/// Implementations return a raw label token; the editor normalizes it and checks
/// it against the record's fields.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    async fn resolve(&self, instruction: &str, present: &[Field]) -> Result<String>;
}

/// Asks the generation service which field to edit.
pub struct ServiceResolver {
    service: Arc<dyn GenerationService>,
}

impl ServiceResolver {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FieldResolver for ServiceResolver {
    async fn resolve(&self, instruction: &str, present: &[Field]) -> Result<String> {
        let prompt = field_detection_prompt(instruction, present);
        self.service.generate(SYSTEM_PROMPT_EDITOR, &prompt).await
    }
}

/// Deterministic resolver: the present field whose label, alias or keyword
/// occurs in the instruction as whole words. Longer phrases win, so
/// "test case description" beats "test case".
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResolver;

impl KeywordResolver {
    pub fn pick(instruction: &str, present: &[Field]) -> Option<Field> {
        let haystack = format!(" {} ", words(instruction));

        present
            .iter()
            .flat_map(|field| {
                let spec = field.spec();
                std::iter::once(spec.label)
                    .chain(spec.aliases.iter().copied())
                    .chain(spec.keywords.iter().copied())
                    .map(move |phrase| (*field, words(phrase)))
            })
            .filter(|(_, phrase)| !phrase.is_empty() && haystack.contains(&format!(" {} ", phrase)))
            .max_by_key(|(_, phrase)| phrase.len())
            .map(|(field, _)| field)
    }
}

#[async_trait]
impl FieldResolver for KeywordResolver {
    async fn resolve(&self, instruction: &str, present: &[Field]) -> Result<String> {
        Ok(Self::pick(instruction, present)
            .map(|field| field.label().to_string())
            .unwrap_or_default())
    }
}

/// Lowercased alphanumeric words joined by single spaces.
fn words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of editing one record block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEdit {
    pub record_id: String,
    pub field: Field,
    pub previous_value: String,
    pub new_value: String,
    /// The parsed record with the new value applied.
    pub record: Record,
    pub updated_block: String,
}

/// Applies a natural-language edit to exactly one field of a record block.
pub struct FieldEditor {
    service: Arc<dyn GenerationService>,
    resolver: Arc<dyn FieldResolver>,
    timeout: Duration,
}

impl FieldEditor {
    /// Uses `service` for both field detection and value regeneration.
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            resolver: Arc::new(ServiceResolver::new(service.clone())),
            service,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(service: Arc<dyn GenerationService>, config: &LedgerConfig) -> Self {
        Self::new(service).with_timeout(config.generation_timeout())
    }

    /// Replaces the field resolver, e.g. with a [`KeywordResolver`].
    pub fn with_resolver(mut self, resolver: impl FieldResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Upper bound for each generation call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn edit(&self, block: &str, instruction: &str) -> Result<BlockEdit> {
        self.edit_with_progress(block, instruction, None).await
    }

    /// Parses `block`, detects the target field, regenerates its value and renders
    /// the block again. Nothing is returned unless every step succeeded.
    pub async fn edit_with_progress(
        &self,
        block: &str,
        instruction: &str,
        progress: Option<Sender<LedgerEvent>>,
    ) -> Result<BlockEdit> {
        let mut record = parse_block(block);
        if record.fields.is_empty() {
            return Err(LedgerError::ExtractionEmpty {
                raw: block.to_string(),
            });
        }
        let record_id = record.id().to_string();

        send_event(
            &progress,
            LedgerEvent::DetectingField {
                record_id: record_id.clone(),
            },
        );
        let field = self.detect_field(&record, instruction).await?;
        let previous_value = record.get(field).unwrap_or_default().to_string();

        send_event(
            &progress,
            LedgerEvent::UpdatingField {
                record_id: record_id.clone(),
                field: field.label().to_string(),
            },
        );
        let new_value = self
            .regenerate_value(&record_id, instruction, field, &previous_value)
            .await?;

        if record.replace(field, new_value.clone()).is_none() {
            return Err(LedgerError::IntegrityViolation {
                record_id,
                details: format!("field '{}' vanished from the record", field),
            });
        }
        let updated_block = render_record(&record);

        info!(
            "Updated '{}' of {}: '{}' -> '{}'",
            field, record_id, previous_value, new_value
        );
        Ok(BlockEdit {
            record_id,
            field,
            previous_value,
            new_value,
            record,
            updated_block,
        })
    }

    /// Resolves the instruction to one of the record's present fields.
    pub async fn detect_field(&self, record: &Record, instruction: &str) -> Result<Field> {
        let present = record.present_fields();
        let raw = self
            .bounded(
                EditStep::FieldDetection,
                self.resolver.resolve(instruction, &present),
            )
            .await?;
        let token = clean_response(&raw);
        debug!("Field detection for {} returned '{}'", record.id(), token);

        match resolve_label(&token) {
            Some(field) if present.contains(&field) => Ok(field),
            _ => Err(LedgerError::FieldDetectionFailed {
                record_id: record.id().to_string(),
                token,
                available: present.iter().map(|f| f.label().to_string()).collect(),
            }),
        }
    }

    /// Asks for the replacement value and normalizes it the way extraction would.
    pub async fn regenerate_value(
        &self,
        record_id: &str,
        instruction: &str,
        field: Field,
        current: &str,
    ) -> Result<String> {
        let prompt = value_regeneration_prompt(instruction, field, current);
        let raw = self
            .bounded(
                EditStep::ValueRegeneration,
                self.service.generate(SYSTEM_PROMPT_EDITOR, &prompt),
            )
            .await?;

        let value = clean_value(field, &clean_response(&raw));
        if value.is_empty() {
            return Err(LedgerError::generation(
                EditStep::ValueRegeneration,
                format!("empty value returned for '{}' of {}", field, record_id),
            ));
        }
        Ok(value)
    }

    /// Runs one generation call under the timeout, tagging failures with `step`.
    async fn bounded<T>(&self, step: EditStep, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(LedgerError::GenerationService { message, .. })) => {
                Err(LedgerError::generation(step, message))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LedgerError::generation(
                step,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationService for Scripted {
        async fn generate(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LedgerError::generation(EditStep::Generation, "script exhausted")))
        }
    }

    struct Stalled;

    #[async_trait]
    impl GenerationService for Stalled {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("Priority".to_string())
        }
    }

    const BLOCK: &str = "\
7.

* Test Case ID: TC-7
* Test Case Description: Priority change
* Step-by-step actions: 1. Open
2. Save
* Priority: Low";

    #[tokio::test]
    async fn test_edit_replaces_only_target_field() {
        let service = Scripted::new(vec![Ok("**Priority**".to_string()), Ok(" High \n".to_string())]);
        let editor = FieldEditor::new(service.clone());

        let edit = editor.edit(BLOCK, "increase priority to High").await.unwrap();
        assert_eq!(edit.record_id, "TC-7");
        assert_eq!(edit.field, Field::Priority);
        assert_eq!(edit.previous_value, "Low");
        assert_eq!(edit.new_value, "High");
        assert_eq!(
            edit.updated_block,
            "7.\n\n* Test Case ID: TC-7\n* Test Case Description: Priority change\n* Step-by-step actions: 1. Open\n2. Save\n* Priority: High"
        );

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].contains("'Test Case ID', 'Test Case Description', 'Step-by-step actions', 'Priority'"));
        assert!(prompts[1].contains("Original Value:\nLow"));
    }

    #[tokio::test]
    async fn test_field_not_on_record_is_rejected() {
        let service = Scripted::new(vec![Ok("Sources".to_string())]);
        let editor = FieldEditor::new(service.clone());

        match editor.edit(BLOCK, "cite the database").await {
            Err(LedgerError::FieldDetectionFailed {
                record_id,
                token,
                available,
            }) => {
                assert_eq!(record_id, "TC-7");
                assert_eq!(token, "Sources");
                assert_eq!(available.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        // No value regeneration call was made.
        assert_eq!(service.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chatty_detection_is_rejected() {
        let service = Scripted::new(vec![Ok("The field to edit is Priority".to_string())]);
        let result = FieldEditor::new(service).edit(BLOCK, "raise priority").await;
        assert!(matches!(result, Err(LedgerError::FieldDetectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_generation_failures_carry_step() {
        let service = Scripted::new(vec![Ok("Priority".to_string()), Ok("  \n".to_string())]);
        match FieldEditor::new(service).edit(BLOCK, "raise priority").await {
            Err(LedgerError::GenerationService { step, .. }) => {
                assert_eq!(step, EditStep::ValueRegeneration)
            }
            other => panic!("unexpected {:?}", other),
        }

        let service = Scripted::new(vec![Err(LedgerError::generation(
            EditStep::Generation,
            "connection refused",
        ))]);
        match FieldEditor::new(service).edit(BLOCK, "raise priority").await {
            Err(LedgerError::GenerationService { step, message }) => {
                assert_eq!(step, EditStep::FieldDetection);
                assert_eq!(message, "connection refused");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_generation_error() {
        let editor = FieldEditor::new(Arc::new(Stalled)).with_timeout(Duration::from_secs(5));
        let result = editor.edit(BLOCK, "raise priority").await;
        assert!(matches!(
            result,
            Err(LedgerError::GenerationService {
                step: EditStep::FieldDetection,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_multi_line_value_keeps_steps() {
        let service = Scripted::new(vec![
            Ok("Step-by-step actions".to_string()),
            Ok("1.Open\n2.  Save\n3. Log out".to_string()),
        ]);
        let edit = FieldEditor::new(service)
            .edit(BLOCK, "add a logout step")
            .await
            .unwrap();
        assert_eq!(edit.new_value, "1. Open\n2. Save\n3. Log out");
        assert_eq!(parse_block(&edit.updated_block), edit.record);
    }

    #[tokio::test]
    async fn test_keyword_resolver() {
        let present = [
            Field::TestCaseId,
            Field::TestCase,
            Field::TestCaseDescription,
            Field::Priority,
        ];
        assert_eq!(
            KeywordResolver::pick("increase priority to High", &present),
            Some(Field::Priority)
        );
        assert_eq!(
            KeywordResolver::pick("reword the test case description", &present),
            Some(Field::TestCaseDescription)
        );
        assert_eq!(KeywordResolver::pick("make it better", &present), None);
        // Absent fields are never picked.
        assert_eq!(KeywordResolver::pick("add more steps", &present), None);

        let token = KeywordResolver.resolve("set priority", &present).await.unwrap();
        assert_eq!(token, "Priority");

        // Only the value call reaches the service.
        let service = Scripted::new(vec![Ok("High".to_string())]);
        let edit = FieldEditor::new(service.clone())
            .with_resolver(KeywordResolver)
            .edit(BLOCK, "increase priority to High")
            .await
            .unwrap();
        assert_eq!(edit.record.get(Field::Priority), Some("High"));
        assert_eq!(service.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_block_without_fields() {
        let service = Scripted::new(vec![]);
        let result = FieldEditor::new(service).edit("just prose", "anything").await;
        assert!(matches!(result, Err(LedgerError::ExtractionEmpty { .. })));
    }
}
