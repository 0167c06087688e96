use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The step of a mutating operation an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
    FieldDetection,
    ValueRegeneration,
    Generation,
}

impl fmt::Display for EditStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditStep::FieldDetection => "field detection",
            EditStep::ValueRegeneration => "value regeneration",
            EditStep::Generation => "generation",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No test cases could be parsed from the generated text ({} bytes)", raw.len())]
    ExtractionEmpty { raw: String },

    #[error("Test case {record_id} not found")]
    RecordNotFound { record_id: String },

    #[error("Field detection for {record_id} returned '{token}', expected one of: {}", available.join(", "))]
    FieldDetectionFailed {
        record_id: String,
        token: String,
        available: Vec<String>,
    },

    #[error("Generation service failed during {step}: {message}")]
    GenerationService { step: EditStep, message: String },

    #[error("Failed to write export file {}: {source}", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workbook encoding error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Edit of {record_id} rejected: {details}")]
    IntegrityViolation { record_id: String, details: String },

    #[error("Feedback round rejected, test cases would not be parsed from the ledger ({}): {details}", record_ids.join(", "))]
    AppendRejected {
        record_ids: Vec<String>,
        details: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "groq")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LedgerError {
    pub(crate) fn generation(step: EditStep, message: impl Into<String>) -> Self {
        LedgerError::GenerationService {
            step,
            message: message.into(),
        }
    }

    /// True for the failures that are surfaced as warnings rather than aborting.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            LedgerError::ExtractionEmpty { .. }
                | LedgerError::ExportIo { .. }
                | LedgerError::Workbook(_)
                | LedgerError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
