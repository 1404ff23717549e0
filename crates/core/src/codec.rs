use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::dictionary::{CodeEntry, Dictionary, FieldDefinition, FIELD_COUNT};
use crate::error::CodecIssue;

pub const SEPARATOR: char = '.';
pub const DEFAULT_CODE: &str = "0";

/// Sparse encode input: position (1..=16) to the code chosen for it.
pub type SparseFields = BTreeMap<u8, String>;

/// A fully resolved reading type: one code per position. Every operation
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadingTypeValue {
    codes: [String; FIELD_COUNT],
}

impl ReadingTypeValue {
    pub fn from_sparse(fields: &SparseFields) -> Self {
        let codes = std::array::from_fn(|idx| {
            let position = idx as u8 + 1;
            fields
                .get(&position)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CODE.to_string())
        });
        for position in fields.keys() {
            if !(1..=FIELD_COUNT as u8).contains(position) {
                debug!(position, "ignoring out-of-range position during encode");
            }
        }
        Self { codes }
    }

    pub fn code(&self, position: u8) -> Option<&str> {
        if position == 0 {
            return None;
        }
        self.codes
            .get(usize::from(position) - 1)
            .map(String::as_str)
    }

    pub fn with_code(&self, position: u8, code: impl Into<String>) -> Self {
        let mut next = self.clone();
        if (1..=FIELD_COUNT as u8).contains(&position) {
            next.codes[usize::from(position) - 1] = code.into();
        }
        next
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn to_canonical(&self) -> String {
        self.codes.join(".")
    }
}

impl Default for ReadingTypeValue {
    fn default() -> Self {
        Self::from_sparse(&SparseFields::new())
    }
}

impl fmt::Display for ReadingTypeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

/// Strict structural parse: exactly 16 tokens, no dictionary check.
impl FromStr for ReadingTypeValue {
    type Err = CodecIssue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(SEPARATOR).collect();
        if tokens.len() != FIELD_COUNT {
            return Err(CodecIssue::Malformed {
                found: tokens.len(),
            });
        }
        Ok(Self {
            codes: std::array::from_fn(|idx| tokens[idx].to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedField<'d> {
    pub field: &'d FieldDefinition,
    pub token: String,
    pub value: Option<&'d CodeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport<'d> {
    pub fields: Vec<ParsedField<'d>>,
    pub token_count: usize,
    pub issues: Vec<CodecIssue>,
}

impl<'d> DecodeReport<'d> {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn is_malformed(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, CodecIssue::Malformed { .. }))
    }

    pub fn unknown(&self) -> impl Iterator<Item = &ParsedField<'d>> {
        self.fields.iter().filter(|parsed| parsed.value.is_none())
    }

    /// The decoded snapshot, available whenever all 16 positions were present.
    pub fn value(&self) -> Option<ReadingTypeValue> {
        if self.fields.len() != FIELD_COUNT || self.token_count != FIELD_COUNT {
            return None;
        }
        Some(ReadingTypeValue {
            codes: std::array::from_fn(|idx| self.fields[idx].token.clone()),
        })
    }

    pub fn describe(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|parsed| {
                let label = match parsed.value {
                    Some(entry) => format!("{} / {}", entry.english, entry.native),
                    None => "unknown code".to_string(),
                };
                format!(
                    "{:>2}. {} ({}): {} [{}]",
                    parsed.field.position,
                    parsed.field.name,
                    parsed.field.display_name,
                    parsed.token,
                    label
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Codec<'d> {
    dictionary: &'d Dictionary,
}

impl<'d> Codec<'d> {
    pub fn new(dictionary: &'d Dictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &'d Dictionary {
        self.dictionary
    }

    /// Total: missing positions become `"0"`, supplied tokens are used verbatim.
    pub fn encode(&self, fields: &SparseFields) -> String {
        ReadingTypeValue::from_sparse(fields).to_canonical()
    }

    pub fn encode_value(&self, fields: &SparseFields) -> ReadingTypeValue {
        ReadingTypeValue::from_sparse(fields)
    }

    /// Maps `"13"` or `"phase"` (or the display name) to a position.
    pub fn resolve_key(&self, key: &str) -> Option<u8> {
        let key = key.trim();
        if let Ok(position) = key.parse::<u8>() {
            return self.dictionary.field(position).map(|field| field.position);
        }
        self.dictionary
            .field_by_name(key)
            .map(|field| field.position)
    }

    pub fn decode(&self, input: &str) -> DecodeReport<'d> {
        let tokens: Vec<&str> = input.split(SEPARATOR).collect();
        let mut issues = Vec::new();
        if tokens.len() != FIELD_COUNT {
            debug!(found = tokens.len(), "malformed reading type");
            issues.push(CodecIssue::Malformed {
                found: tokens.len(),
            });
        }
        let fields: Vec<ParsedField<'d>> = self
            .dictionary
            .fields()
            .iter()
            .zip(tokens.iter())
            .map(|(field, token)| {
                let value = field.value(token);
                if value.is_none() {
                    warn!(
                        position = field.position,
                        field = %field.name,
                        code = %token,
                        "unknown reading type code"
                    );
                    issues.push(CodecIssue::UnknownCode {
                        position: field.position,
                        field: field.name.clone(),
                        code: token.to_string(),
                    });
                }
                ParsedField {
                    field,
                    token: token.to_string(),
                    value,
                }
            })
            .collect();
        DecodeReport {
            fields,
            token_count: tokens.len(),
            issues,
        }
    }
}
