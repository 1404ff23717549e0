use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DictionaryError, Result};
use crate::standard::STANDARD_FIELDS;

pub const FIELD_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    pub english: String,
    #[serde(rename = "chinese", alias = "native")]
    pub native: String,
}

impl CodeEntry {
    pub fn new(
        code: impl Into<String>,
        english: impl Into<String>,
        native: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            english: english.into(),
            native: native.into(),
        }
    }
}

/// One of the 16 positional fields. `name` is the stable identifier
/// (`flowDirection`), `display_name` the native label shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub position: u8,
    #[serde(rename = "englishName")]
    pub name: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub description: String,
    pub values: Vec<CodeEntry>,
}

impl FieldDefinition {
    /// Exact string match; domains have gaps so the value list is never indexed by code.
    pub fn value(&self, code: &str) -> Option<&CodeEntry> {
        self.values.iter().find(|entry| entry.code == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DictionaryStats {
    pub fields: usize,
    pub values: usize,
    pub largest_domain: usize,
}

/// The immutable 16-field table shared by the codec and the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    fields: Vec<FieldDefinition>,
}

impl Dictionary {
    pub fn new(mut fields: Vec<FieldDefinition>) -> Result<Self> {
        if fields.len() != FIELD_COUNT {
            return Err(DictionaryError::FieldCount(fields.len()));
        }
        fields.sort_by_key(|field| field.position);
        for (idx, field) in fields.iter().enumerate() {
            let expected = idx as u8 + 1;
            if field.position != expected {
                return Err(DictionaryError::Position {
                    expected,
                    found: field.position,
                });
            }
            if field.values.is_empty() {
                return Err(DictionaryError::EmptyDomain(field.position));
            }
            let mut seen = HashSet::new();
            for entry in &field.values {
                if !seen.insert(entry.code.as_str()) {
                    return Err(DictionaryError::DuplicateCode {
                        position: field.position,
                        code: entry.code.clone(),
                    });
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn standard() -> Self {
        let fields = STANDARD_FIELDS
            .iter()
            .enumerate()
            .map(|(idx, spec)| FieldDefinition {
                position: idx as u8 + 1,
                name: spec.name.to_string(),
                display_name: spec.display_name.to_string(),
                description: spec.description.to_string(),
                values: spec
                    .values
                    .iter()
                    .map(|(code, english, native)| CodeEntry::new(*code, *english, *native))
                    .collect(),
            })
            .collect();
        Self { fields }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let fields: Vec<FieldDefinition> = serde_json::from_str(raw)?;
        Self::new(fields)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dictionary = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "loaded dictionary");
        Ok(dictionary)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.fields)?)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, position: u8) -> Option<&FieldDefinition> {
        if position == 0 {
            return None;
        }
        self.fields.get(usize::from(position) - 1)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        let wanted = name.trim();
        self.fields.iter().find(|field| {
            field.name.eq_ignore_ascii_case(wanted) || field.display_name == wanted
        })
    }

    pub fn lookup(&self, position: u8, code: &str) -> Option<&CodeEntry> {
        self.field(position).and_then(|field| field.value(code))
    }

    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            fields: self.fields.len(),
            values: self.fields.iter().map(|field| field.values.len()).sum(),
            largest_domain: self
                .fields
                .iter()
                .map(|field| field.values.len())
                .max()
                .unwrap_or(0),
        }
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::standard()
    }
}
