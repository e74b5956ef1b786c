use std::fmt;

/// Constraint classes reported by the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    DuplicateKey,
    ForeignKeyViolation,
    Other,
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "duplicate key"),
            Self::ForeignKeyViolation => write!(f, "foreign key violation"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {kind}: {message}")]
    Database { kind: DbErrorKind, message: String },

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// A cached payload failed validation against its declared shape.
    /// Always fatal: it means the cache and the code have drifted.
    #[error("cache payload rejected for shape {shape}: {reason}")]
    Schema { shape: &'static str, reason: String },

    /// A `*_one` operation matched more than one row.
    #[error("{op} matched {count} rows, expected at most one")]
    TooManyRows { op: &'static str, count: usize },

    /// An external dependency is locked out after repeated failures.
    #[error("{dependency} is locked out, retry in {retry_after_secs}s")]
    Locked {
        dependency: String,
        retry_after_secs: u64,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::Database {
            kind: DbErrorKind::DuplicateKey,
            message: message.into(),
        }
    }

    /// True for duplicate-key conflicts, the "already exists" class callers
    /// translate into a user-correctable rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::Database {
                kind: DbErrorKind::DuplicateKey,
                ..
            }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Database {
                kind: DbErrorKind::DuplicateKey | DbErrorKind::ForeignKeyViolation,
                ..
            }
        )
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        use tokio_postgres::error::SqlState;

        let kind = match err.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => DbErrorKind::DuplicateKey,
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                DbErrorKind::ForeignKeyViolation
            }
            _ => DbErrorKind::Other,
        };

        Self::Database {
            kind,
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_conflict() {
        let err = StoreError::duplicate_key("contacts_phone_key");
        assert!(err.is_duplicate());
        assert!(err.is_conflict());
    }

    #[test]
    fn schema_is_not_conflict() {
        let err = StoreError::Schema {
            shape: "contact",
            reason: "missing field `phone`".into(),
        };
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("contact"));
    }
}
