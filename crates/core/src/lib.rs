mod codec;
mod dictionary;
mod error;
mod search;
mod standard;

pub use codec::{
    Codec, DecodeReport, ParsedField, ReadingTypeValue, SparseFields, DEFAULT_CODE, SEPARATOR,
};
pub use dictionary::{CodeEntry, Dictionary, DictionaryStats, FieldDefinition, FIELD_COUNT};
pub use error::{CodecIssue, DictionaryError, Result};
pub use search::{MatchKind, SearchHit, SearchIndex};
