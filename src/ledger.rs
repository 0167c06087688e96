//! The session ledger: one corpus, serialized mutations, full re-export.

use crate::config::LedgerConfig;
use crate::editor::FieldEditor;
use crate::error::{LedgerError, Result};
use crate::event::{send_event, LedgerEvent};
use crate::export::Exporter;
use crate::extractor::extract;
use crate::locator::{locate, splice};
use crate::record::Record;
use crate::schema::Field;
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::sync::mpsc::Sender;
use tokio::sync::{Mutex, MutexGuard};

/// Outcome of a committed mutation.
#[derive(Debug, Default)]
pub struct CommitReport {
    /// Records parsed from the committed corpus.
    pub records: usize,
    /// Files written by the re-export.
    pub exported: Vec<PathBuf>,
    /// Non-fatal problems (empty extraction, export failure).
    pub warnings: Vec<LedgerError>,
}

/// Outcome of a committed single-field edit.
#[derive(Debug)]
pub struct EditOutcome {
    pub record_id: String,
    pub field: Field,
    pub previous_value: String,
    pub new_value: String,
    pub original_block: String,
    pub updated_block: String,
    pub report: CommitReport,
}

/// Owns the corpus of generated test cases.
///
/// All mutation goes through [`Ledger::acquire`], so at most one read-compute-write
/// cycle is in flight at a time.
pub struct Ledger {
    corpus: Mutex<String>,
    exporter: Option<Exporter>,
    progress: Option<Sender<LedgerEvent>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An empty ledger without export targets.
    pub fn new() -> Self {
        Self {
            corpus: Mutex::new(String::new()),
            exporter: None,
            progress: None,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new().with_exporter(Exporter::from_config(config))
    }

    pub fn with_exporter(mut self, exporter: Exporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Sends progress events for every operation to `progress`.
    ///
    /// Events are dropped while the channel is full.
    pub fn with_progress(mut self, progress: Sender<LedgerEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Waits for exclusive access to the corpus.
    pub async fn acquire(&self) -> LedgerGuard<'_> {
        LedgerGuard {
            corpus: self.corpus.lock().await,
            ledger: self,
        }
    }

    pub async fn snapshot(&self) -> String {
        self.corpus.lock().await.clone()
    }

    pub async fn records(&self) -> Vec<Record> {
        extract(&self.corpus.lock().await)
    }

    pub async fn seed(&self, text: &str) -> Result<CommitReport> {
        self.acquire().await.seed(text).await
    }

    pub async fn append(&self, text: &str) -> Result<CommitReport> {
        self.acquire().await.append(text).await
    }

    pub async fn edit(
        &self,
        editor: &FieldEditor,
        record_id: &str,
        instruction: &str,
    ) -> Result<EditOutcome> {
        self.acquire().await.edit(editor, record_id, instruction).await
    }

    pub async fn export(&self) -> Result<Vec<PathBuf>> {
        self.acquire().await.export().await
    }
}

/// Exclusive handle on a ledger's corpus; released when dropped.
pub struct LedgerGuard<'a> {
    corpus: MutexGuard<'a, String>,
    ledger: &'a Ledger,
}

impl LedgerGuard<'_> {
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn records(&self) -> Vec<Record> {
        extract(&self.corpus)
    }

    /// Starts the session with the first generation round, replacing any corpus.
    pub async fn seed(&mut self, text: &str) -> Result<CommitReport> {
        let progress = self.ledger.progress.clone();
        send_event(&progress, LedgerEvent::Appending { bytes: text.len() });

        *self.corpus = text.to_string();
        let records = extract(&self.corpus);
        info!("Seeded ledger with {} test cases", records.len());
        Ok(self.commit(&records))
    }

    /// Adds a feedback round after the existing corpus, separated by a blank line.
    ///
    /// Rejected without change if the joined text would parse to fewer records
    /// than the corpus and the round parse to on their own.
    pub async fn append(&mut self, text: &str) -> Result<CommitReport> {
        let progress = self.ledger.progress.clone();
        send_event(&progress, LedgerEvent::Appending { bytes: text.len() });

        let existing = extract(&self.corpus);
        let incoming = extract(text);
        let joined = if self.corpus.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n{}", self.corpus.as_str(), text)
        };

        let records = extract(&joined);
        let expected = existing.len() + incoming.len();
        if records.len() < expected {
            let record_ids = unreachable_ids(existing.iter().chain(&incoming), &records);
            warn!(
                "Rejected feedback round: {} of {} test cases would be parsed",
                records.len(),
                expected
            );
            return Err(LedgerError::AppendRejected {
                record_ids,
                details: format!(
                    "the joined text parses to {} test cases, expected {}",
                    records.len(),
                    expected
                ),
            });
        }

        *self.corpus = joined;
        info!(
            "Appended {} new test cases ({} total)",
            records.len() - existing.len(),
            records.len()
        );

        let mut report = self.commit(&records);
        if incoming.is_empty() && !text.trim().is_empty() {
            warn!("Feedback round added no parseable test cases");
            report.warnings.push(LedgerError::ExtractionEmpty {
                raw: text.to_string(),
            });
        }
        Ok(report)
    }

    /// Edits one field of one record and commits the splice.
    ///
    /// The corpus is only replaced once the edited corpus re-parses to the same
    /// records with exactly the target value changed.
    pub async fn edit(
        &mut self,
        editor: &FieldEditor,
        record_id: &str,
        instruction: &str,
    ) -> Result<EditOutcome> {
        let progress = self.ledger.progress.clone();
        let record_id = record_id.trim();
        send_event(
            &progress,
            LedgerEvent::Searching {
                record_id: record_id.to_string(),
            },
        );

        let normalized = normalize(&self.corpus);
        let before = extract(&normalized);
        let located = locate(&normalized, record_id)?;

        let edit = editor
            .edit_with_progress(&located.block, instruction, progress.clone())
            .await?;

        send_event(
            &progress,
            LedgerEvent::Replacing {
                record_id: record_id.to_string(),
            },
        );
        let updated = splice(&normalized, &located.span, &edit.updated_block);
        let after = extract(&updated);
        verify_edit(&before, &after, record_id, edit.field, &edit.new_value)?;

        *self.corpus = updated;
        debug!("Committed edit of {} ({} bytes)", record_id, self.corpus.len());

        let report = self.commit(&after);
        Ok(EditOutcome {
            record_id: edit.record_id,
            field: edit.field,
            previous_value: edit.previous_value,
            new_value: edit.new_value,
            original_block: located.block,
            updated_block: edit.updated_block,
            report,
        })
    }

    /// Writes the current records to every export target.
    ///
    /// Fails with the first target that could not be written.
    pub async fn export(&self) -> Result<Vec<PathBuf>> {
        let exporter = self
            .ledger
            .exporter
            .as_ref()
            .ok_or_else(|| LedgerError::Config("no export target configured".to_string()))?;

        let records = extract(&self.corpus);
        let written = exporter.export(&records);
        if written.workbook_written(exporter) {
            send_event(
                &self.ledger.progress,
                LedgerEvent::Exported {
                    path: exporter.workbook_path.clone(),
                    records: records.len(),
                },
            );
        }
        for failure in &written.failures {
            warn!("Export failed: {}", failure);
        }
        written.into_result()
    }

    /// Re-exports after a mutation. Failures become warnings; the corpus stays.
    fn commit(&self, records: &[Record]) -> CommitReport {
        let progress = &self.ledger.progress;
        send_event(progress, LedgerEvent::Parsing);

        let mut report = CommitReport {
            records: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            let warning = LedgerError::ExtractionEmpty {
                raw: self.corpus.clone(),
            };
            warn!("{}", warning);
            report.warnings.push(warning);
        } else if let Some(exporter) = &self.ledger.exporter {
            let written = exporter.export(records);
            if written.workbook_written(exporter) {
                send_event(
                    progress,
                    LedgerEvent::Exported {
                        path: exporter.workbook_path.clone(),
                        records: records.len(),
                    },
                );
            }
            for failure in &written.failures {
                warn!("Export failed: {}", failure);
            }
            report.exported = written.written;
            report.warnings.extend(written.failures);
        }

        for warning in &report.warnings {
            send_event(
                progress,
                LedgerEvent::Warning {
                    message: warning.to_string(),
                },
            );
        }
        report
    }
}

/// IDs from `wanted` that have no counterpart in `parsed`, one match per record.
fn unreachable_ids<'a>(
    wanted: impl Iterator<Item = &'a Record>,
    parsed: &[Record],
) -> Vec<String> {
    let mut remaining: Vec<&str> = parsed.iter().map(Record::id).collect();
    wanted
        .filter_map(|record| match remaining.iter().position(|id| *id == record.id()) {
            Some(pos) => {
                remaining.swap_remove(pos);
                None
            }
            None => Some(record.id().to_string()),
        })
        .collect()
}

/// LF line endings and no trailing whitespace, as edits expect.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = unified.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

/// Checks that an edit changed exactly one value of one record.
fn verify_edit(
    before: &[Record],
    after: &[Record],
    record_id: &str,
    field: Field,
    new_value: &str,
) -> Result<()> {
    let violation = |details: String| LedgerError::IntegrityViolation {
        record_id: record_id.to_string(),
        details,
    };

    if before.len() != after.len() {
        return Err(violation(format!(
            "record count changed from {} to {}",
            before.len(),
            after.len()
        )));
    }

    let mut target = None;
    for (idx, (old, new)) in before.iter().zip(after).enumerate() {
        if old.id() != new.id() {
            return Err(violation(format!(
                "record {} changed identity from '{}' to '{}'",
                idx + 1,
                old.id(),
                new.id()
            )));
        }
        if target.is_none() && old.id() == record_id {
            target = Some(idx);
            let mut expected = old.fields.clone();
            if let Some(entry) = expected.iter_mut().find(|entry| entry.field == field) {
                entry.value = new_value.to_string();
            }
            if expected != new.fields {
                return Err(violation(format!(
                    "re-parsed record differs beyond '{}'",
                    field
                )));
            }
        } else if old != new {
            return Err(violation(format!("record '{}' was modified", old.id())));
        }
    }

    if target.is_none() {
        return Err(violation("record is no longer parseable".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldEntry;

    fn record(id: &str, priority: &str) -> Record {
        Record {
            fields: vec![
                FieldEntry {
                    field: Field::TestCaseId,
                    value: id.to_string(),
                },
                FieldEntry {
                    field: Field::Priority,
                    value: priority.to_string(),
                },
            ],
            prefix: Some('*'),
            numeric_heading: None,
            heading_title: None,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a\r\nb\rc  \n\n\n"), "a\nb\nc\n");
        assert_eq!(normalize(" \n"), "");
    }

    #[test]
    fn test_verify_accepts_single_value_change() {
        let before = vec![record("TC-1", "Low"), record("TC-2", "Low")];
        let after = vec![record("TC-1", "Low"), record("TC-2", "High")];
        assert!(verify_edit(&before, &after, "TC-2", Field::Priority, "High").is_ok());
    }

    #[test]
    fn test_verify_rejects_collateral_changes() {
        let before = vec![record("TC-1", "Low"), record("TC-2", "Low")];

        let other_changed = vec![record("TC-1", "Medium"), record("TC-2", "High")];
        assert!(matches!(
            verify_edit(&before, &other_changed, "TC-2", Field::Priority, "High"),
            Err(LedgerError::IntegrityViolation { .. })
        ));

        let merged = vec![record("TC-1", "Low")];
        assert!(verify_edit(&before, &merged, "TC-2", Field::Priority, "High").is_err());

        let mut lost_field = record("TC-2", "High");
        lost_field.fields.pop();
        let after = vec![record("TC-1", "Low"), lost_field];
        assert!(verify_edit(&before, &after, "TC-2", Field::Priority, "High").is_err());
    }

    #[tokio::test]
    async fn test_append_joins_with_blank_line() {
        let ledger = Ledger::new();
        ledger.append("1.\n\n* Test Case ID: TC-1").await.unwrap();
        let report = ledger.append("2.\n\n* Test Case ID: TC-2").await.unwrap();

        assert_eq!(report.records, 2);
        assert!(report.warnings.is_empty());
        assert_eq!(
            ledger.snapshot().await,
            "1.\n\n* Test Case ID: TC-1\n\n2.\n\n* Test Case ID: TC-2"
        );
    }

    #[tokio::test]
    async fn test_append_rejects_round_the_corpus_would_hide() {
        let ledger = Ledger::new();
        ledger
            .seed("1. **Login**\n* Test Case ID: TC-1\n* Priority: High\n")
            .await
            .unwrap();
        let before = ledger.snapshot().await;

        let round = "2. Logout\n* Test Case ID: TC-2\n* Priority: Low\n";
        assert_eq!(extract(round).len(), 1);
        match ledger.append(round).await {
            Err(LedgerError::AppendRejected { record_ids, .. }) => {
                assert_eq!(record_ids, vec!["TC-2".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ledger.snapshot().await, before);
        assert_eq!(ledger.records().await.len(), 1);
    }

    #[test]
    fn test_unreachable_ids_counts_duplicates() {
        let wanted = vec![record("TC-1", "Low"), record("TC-1", "Low"), record("TC-2", "Low")];
        let parsed = vec![record("TC-1", "Low")];
        assert_eq!(
            unreachable_ids(wanted.iter(), &parsed),
            vec!["TC-1".to_string(), "TC-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_export_without_target() {
        let ledger = Ledger::new();
        assert!(matches!(
            ledger.export().await,
            Err(LedgerError::Config(_))
        ));
    }
}
