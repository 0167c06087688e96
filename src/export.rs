use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::record::Record;
use crate::schema::Field;
use log::info;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::path::{Path, PathBuf};

pub const MAX_COLUMN_WIDTH: f64 = 70.0;

/// Column width per canonical column: `min(70, (longest line + 2) * 1.2)`.
///
/// The header counts as a cell; line length is measured in characters.
pub fn column_widths(records: &[Record]) -> Vec<f64> {
    Field::ALL
        .iter()
        .map(|field| {
            let longest = records
                .iter()
                .map(|record| record.value_or_default(*field))
                .chain(std::iter::once(field.label()))
                .flat_map(str::lines)
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0);
            ((longest + 2) as f64 * 1.2).min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Encodes the records as an xlsx workbook with one row per record.
pub fn workbook_bytes(records: &[Record]) -> Result<Vec<u8>> {
    let header_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
        .set_align(FormatAlign::Top);
    let cell_format = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, field) in Field::ALL.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, field.label(), &header_format)?;
    }

    for (row, record) in records.iter().enumerate() {
        let row = row as u32 + 1;
        for (col, value) in record.cells().into_iter().enumerate() {
            if value.is_empty() {
                worksheet.write_blank(row, col as u16, &cell_format)?;
            } else {
                worksheet.write_string_with_format(row, col as u16, value, &cell_format)?;
            }
        }
    }

    for (col, width) in column_widths(records).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Encodes the records as CSV with the canonical header row.
pub fn csv_bytes(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(Field::ALL.iter().map(|field| field.label()))?;
    for record in records {
        writer.write_record(record.cells())?;
    }
    writer
        .into_inner()
        .map_err(|e| LedgerError::IoError(e.into_error()))
}

/// Writes the workbook, replacing any existing file.
///
/// The file is encoded in memory first, so an encoding failure never truncates
/// a previous export.
pub fn export_workbook(records: &[Record], path: &Path) -> Result<()> {
    let bytes = workbook_bytes(records)?;
    write_file(path, &bytes)
}

pub fn export_csv(records: &[Record], path: &Path) -> Result<()> {
    let bytes = csv_bytes(records)?;
    write_file(path, &bytes)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|source| LedgerError::ExportIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Export targets of a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exporter {
    pub workbook_path: PathBuf,
    pub csv_path: Option<PathBuf>,
}

impl Exporter {
    pub fn new(workbook_path: impl Into<PathBuf>) -> Self {
        Self {
            workbook_path: workbook_path.into(),
            csv_path: None,
        }
    }

    pub fn with_csv(mut self, csv_path: impl Into<PathBuf>) -> Self {
        self.csv_path = Some(csv_path.into());
        self
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            workbook_path: config.export_path.clone(),
            csv_path: config.csv_path.clone(),
        }
    }

    /// Writes every configured target.
    ///
    /// Each target is attempted on its own, so a CSV failure still reports the
    /// workbook that was written.
    pub fn export(&self, records: &[Record]) -> ExportReport {
        let mut report = ExportReport::default();

        match export_workbook(records, &self.workbook_path) {
            Ok(()) => {
                info!(
                    "Test cases exported successfully to {}",
                    self.workbook_path.display()
                );
                report.written.push(self.workbook_path.clone());
            }
            Err(e) => report.failures.push(e),
        }

        if let Some(csv_path) = &self.csv_path {
            match export_csv(records, csv_path) {
                Ok(()) => report.written.push(csv_path.clone()),
                Err(e) => report.failures.push(e),
            }
        }

        report
    }
}

/// Files written by one export and the targets that failed.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<LedgerError>,
}

impl ExportReport {
    pub fn workbook_written(&self, exporter: &Exporter) -> bool {
        self.written.contains(&exporter.workbook_path)
    }

    /// The written paths, or the first failure.
    pub fn into_result(mut self) -> Result<Vec<PathBuf>> {
        if self.failures.is_empty() {
            Ok(self.written)
        } else {
            Err(self.failures.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldEntry;

    fn record(id: &str, steps: &str) -> Record {
        Record {
            fields: vec![
                FieldEntry {
                    field: Field::TestCaseId,
                    value: id.to_string(),
                },
                FieldEntry {
                    field: Field::StepByStepActions,
                    value: steps.to_string(),
                },
            ],
            prefix: Some('*'),
            numeric_heading: None,
            heading_title: None,
        }
    }

    #[test]
    fn test_column_widths() {
        let records = vec![record("TC-1", "1. Open\n2. Click the very long button label")];
        let widths = column_widths(&records);
        assert_eq!(widths.len(), 16);

        // Header "Test Case ID" (12 chars) is longer than "TC-1".
        assert!((widths[Field::TestCaseId.index()] - 14.0 * 1.2).abs() < 1e-9);

        // Longest step line is 35 characters.
        let steps = widths[Field::StepByStepActions.index()];
        assert!((steps - 37.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_column_width_is_capped() {
        let long = "x".repeat(200);
        let widths = column_widths(&[record("TC-1", &long)]);
        assert_eq!(widths[Field::StepByStepActions.index()], MAX_COLUMN_WIDTH);
    }

    #[test]
    fn test_csv_layout() {
        let bytes = csv_bytes(&[record("TC-1", "1. Open\n2. Close")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("Test Case ID,High Level Feature,Feature Name"));
        assert!(text.contains("TC-1,,,,,,\"1. Open\n2. Close\""));
    }

    #[test]
    fn test_csv_is_deterministic() {
        let records = vec![record("TC-1", "a"), record("TC-2", "b")];
        assert_eq!(csv_bytes(&records).unwrap(), csv_bytes(&records).unwrap());
    }

    #[test]
    fn test_export_to_missing_directory_reports_path() {
        let path = Path::new("/nonexistent-dir/for/ledger/export.xlsx");
        match export_workbook(&[record("TC-1", "a")], path) {
            Err(LedgerError::ExportIo { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_csv_failure_keeps_written_workbook() {
        let dir = tempfile::TempDir::new().unwrap();
        let workbook = dir.path().join("cases.xlsx");
        let exporter = Exporter::new(&workbook).with_csv(dir.path().join("missing/cases.csv"));

        let report = exporter.export(&[record("TC-1", "a")]);
        assert_eq!(report.written, vec![workbook.clone()]);
        assert!(report.workbook_written(&exporter));
        assert!(matches!(
            report.failures.as_slice(),
            [LedgerError::ExportIo { .. }]
        ));
        assert!(workbook.exists());
    }
}
