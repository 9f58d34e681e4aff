//! Error taxonomy (§7).
//!
//! Only `Validation` and `NotFound` are meant to reach a caller; `Transient`
//! and `Corruption` are logged and absorbed by the component that hit them
//! (embedder, LLM, enricher) so a degraded dependency never fails the
//! surrounding store/update operation.

/// Store-wide error type.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bad input shape or an enum value outside its closed set.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown or inactive id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network timeout or transport failure talking to the embedder/LLM.
    /// Never propagated past the component that owns the call — the caller
    /// sees a `None` result instead.
    #[error("transient error: {0}")]
    Transient(String),

    /// Vector dimension mismatch, malformed JSON property, or similar
    /// on-disk inconsistency. The offending step is skipped; the entry
    /// itself remains stored.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Underlying SQLite failure not otherwise classified above.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
