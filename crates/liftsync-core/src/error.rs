//! Error types for liftsync-core

use thiserror::Error;

/// Result type alias using liftsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local store and the mutation layer.
///
/// Remote failures never surface through this type; they are caught per
/// entity kind by the sync engine and reported in its `SyncResult`.
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error (open, query, or write failure)
    #[error("libSQL error: {0}")]
    Database(#[from] libsql::Error),

    /// A stored value could not be decoded into its model type
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow {
        /// Table the row was read from
        table: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row not found (or pending deletion)
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind name
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            message: message.into(),
        }
    }
}
