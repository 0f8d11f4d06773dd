use thiserror::Error as ThisError;

/// Per-operation errors raised by collection handles after startup.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Duplicate key in collection '{collection}': {message}")]
    DuplicateKey { collection: String, message: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Unsupported filter on '{field}': only scalar equality is supported")]
    UnsupportedFilter { field: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }

    /// Maps a failed write, turning uniqueness violations into [`StoreError::DuplicateKey`].
    pub(crate) fn from_write(collection: &str, err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            StoreError::DuplicateKey {
                collection: collection.to_string(),
                message: err.to_string(),
            }
        } else {
            StoreError::DatabaseError(err)
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}
