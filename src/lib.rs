//! # Test Case Ledger
//!
//! A ledger for QA test cases produced by a text-generation service. The ledger keeps
//! the raw generated text as its only state and derives structured records from it
//! on demand.
//!
//! ## Core Concepts
//!
//! - **Corpus**: The accumulated generated text. Feedback rounds are appended; edits
//!   replace exactly one record's span.
//! - **Record**: One test case parsed from the corpus, with its fields in source order
//!   plus the bullet and numeric heading needed to write it back.
//! - **Field Schema**: The sixteen recognized fields in canonical (export) order.
//! - **Field Editor**: Turns a free-text instruction into a new value for one field,
//!   using two constrained calls to the generation service.
//! - **Export**: Every mutation re-exports all records to a spreadsheet.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use testcase_ledger::*;
//!
//! let config = LedgerConfig::from_env()?;
//! let service = Arc::new(GroqClient::from_config(&config)?);
//! let ledger = Ledger::from_config(&config);
//!
//! ledger.seed(&generated_text).await?;
//! let editor = FieldEditor::from_config(service, &config);
//! let outcome = ledger.edit(&editor, "TC-7", "increase priority to High").await?;
//! println!("{} -> {}", outcome.previous_value, outcome.new_value);
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod event;
pub mod export;
pub mod extractor;
pub mod ledger;
pub mod llm;
pub mod locator;
pub mod rebuild;
pub mod record;
mod scan;
pub mod schema;

pub use config::LedgerConfig;
pub use editor::{BlockEdit, FieldEditor, FieldResolver, KeywordResolver, ServiceResolver};
pub use error::{EditStep, LedgerError, Result};
pub use event::LedgerEvent;
pub use export::{column_widths, export_csv, export_workbook, ExportReport, Exporter};
pub use extractor::{extract, extract_checked, extract_with_strategy, parse_block, SplitStrategy};
pub use ledger::{CommitReport, EditOutcome, Ledger, LedgerGuard};
pub use llm::{clean_response, GenerationService};
pub use locator::{locate, splice, Located};
pub use rebuild::{render, render_record};
pub use record::{FieldEntry, Record};
pub use schema::{resolve_label, Field, FieldSpec, FIELD_SCHEMA};

#[cfg(feature = "groq")]
pub use llm::GroqClient;
