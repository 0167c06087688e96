use crate::schema::Field;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub field: Field,
    pub value: String,
}

/// One parsed test case.
///
/// Fields are kept in the order they appeared in the source text. The prefix
/// symbol and numeric heading are formatting metadata used to rebuild the block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub fields: Vec<FieldEntry>,
    /// Bullet used in front of field labels (`*`, `-`, `•`), if any.
    pub prefix: Option<char>,
    /// Leading ordinal such as `2` for a `2.` heading.
    pub numeric_heading: Option<String>,
    /// Title text of an emphasized heading (`1. **Login**`).
    pub heading_title: Option<String>,
}

impl Record {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.value.as_str())
    }

    /// The identity key, or an empty string when the record carries none.
    pub fn id(&self) -> &str {
        self.get(Field::TestCaseId).unwrap_or("")
    }

    pub fn has(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn present_fields(&self) -> Vec<Field> {
        self.fields.iter().map(|entry| entry.field).collect()
    }

    /// Value used for export: the stated value, else the schema default.
    ///
    /// A heading title stands in for a missing `High Level Feature`.
    pub fn value_or_default(&self, field: Field) -> &str {
        if let Some(value) = self.get(field) {
            return value;
        }
        match (field, &self.heading_title) {
            (Field::HighLevelFeature, Some(title)) => title,
            _ => field.default_value(),
        }
    }

    /// Replaces the value of a field that is already present.
    ///
    /// Returns the previous value, or `None` if the field is absent (in which case
    /// nothing changes).
    pub fn replace(&mut self, field: Field, value: impl Into<String>) -> Option<String> {
        let entry = self.fields.iter_mut().find(|entry| entry.field == field)?;
        Some(std::mem::replace(&mut entry.value, value.into()))
    }

    /// Cells in canonical column order.
    pub fn cells(&self) -> Vec<&str> {
        Field::ALL
            .iter()
            .map(|field| self.value_or_default(*field))
            .collect()
    }
}
