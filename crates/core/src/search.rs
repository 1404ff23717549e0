use serde::Serialize;

use crate::dictionary::{CodeEntry, Dictionary, FieldDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Code,
    English,
    Native,
    /// The field's own name, display name or description matched.
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit<'d> {
    pub field: &'d FieldDefinition,
    pub value: &'d CodeEntry,
    pub matched_on: MatchKind,
}

struct IndexedField<'d> {
    field: &'d FieldDefinition,
    haystack: [String; 3],
    values: Vec<IndexedValue<'d>>,
}

struct IndexedValue<'d> {
    entry: &'d CodeEntry,
    code: String,
    english: String,
    native: String,
}

impl IndexedValue<'_> {
    fn matches(&self, needle: &str) -> Option<MatchKind> {
        if self.code.contains(needle) {
            Some(MatchKind::Code)
        } else if self.english.contains(needle) {
            Some(MatchKind::English)
        } else if self.native.contains(needle) {
            Some(MatchKind::Native)
        } else {
            None
        }
    }
}

/// Case-insensitive substring search over the flattened (field, value) space.
/// Lowercased text is computed once at construction.
pub struct SearchIndex<'d> {
    fields: Vec<IndexedField<'d>>,
}

impl<'d> SearchIndex<'d> {
    pub fn new(dictionary: &'d Dictionary) -> Self {
        let fields = dictionary
            .fields()
            .iter()
            .map(|field| IndexedField {
                field,
                haystack: [
                    field.name.to_lowercase(),
                    field.display_name.to_lowercase(),
                    field.description.to_lowercase(),
                ],
                values: field
                    .values
                    .iter()
                    .map(|entry| IndexedValue {
                        entry,
                        code: entry.code.to_lowercase(),
                        english: entry.english.to_lowercase(),
                        native: entry.native.to_lowercase(),
                    })
                    .collect(),
            })
            .collect();
        Self { fields }
    }

    /// Hits are ordered by field position, then value declaration order.
    /// A field-level match reports every value of that field.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'d>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for indexed in &self.fields {
            let field_match = indexed.haystack.iter().any(|text| text.contains(&needle));
            for value in &indexed.values {
                let matched_on = match value.matches(&needle) {
                    Some(kind) => kind,
                    None if field_match => MatchKind::Field,
                    None => continue,
                };
                hits.push(SearchHit {
                    field: indexed.field,
                    value: value.entry,
                    matched_on,
                });
            }
        }
        hits
    }
}
