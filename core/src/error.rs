use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("No such {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown {kind} code '{code}' in store")]
    UnknownCode { kind: &'static str, code: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AmlResult<T> = Result<T, AmlError>;
