use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("io error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("dictionary must define exactly 16 fields, found {0}")]
    FieldCount(usize),
    #[error("expected field at position {expected}, found position {found}")]
    Position { expected: u8, found: u8 },
    #[error("field {position} declares code {code:?} more than once")]
    DuplicateCode { position: u8, code: String },
    #[error("field {0} has no values")]
    EmptyDomain(u8),
}

pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Problems found while decoding a reading type string. These are reported
/// alongside the decoded fields, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecIssue {
    #[error("expected 16 dot-separated tokens, found {found}")]
    Malformed { found: usize },
    #[error("code {code:?} is not defined for field {position} ({field})")]
    UnknownCode {
        position: u8,
        field: String,
        code: String,
    },
}
