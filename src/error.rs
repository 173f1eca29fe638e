use rusqlite::ErrorCode;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Which storage-level constraint rejected a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("username already taken")]
    DuplicateUsername,

    #[error("job with this source and source id already exists")]
    DuplicateJobSource,

    #[error("setting key already exists")]
    DuplicateSettingKey,

    /// `applications.job_id` points at no job, or a job still has applications.
    #[error("application references a job that does not exist or is still referenced")]
    UnknownJob,

    #[error("{table}.{column} is required")]
    MissingValue { table: String, column: String },

    #[error("constraint failed: {0}")]
    Other(String),
}

/// A list column whose text is not a JSON array.
#[derive(Debug, Error)]
#[error("invalid list encoding in {column}: {source}")]
pub struct ListDecodeError {
    pub column: &'static str,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    #[error(transparent)]
    Decode(#[from] ListDecodeError),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("database not initialized (missing: {}); run 'sidequest init' first", .missing.join(", "))]
    NotInitialized { missing: Vec<&'static str> },

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn constraint(&self) -> Option<&ConstraintViolation> {
        match self {
            StoreError::Constraint(c) => Some(c),
            _ => None,
        }
    }

    /// True for uniqueness violations, which ingestion treats as a skip.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self.constraint(),
            Some(
                ConstraintViolation::DuplicateUsername
                    | ConstraintViolation::DuplicateJobSource
                    | ConstraintViolation::DuplicateSettingKey
            )
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(classify_constraint(message.as_deref().unwrap_or("")))
            }
            // Row mappers box list decoding failures; unwrap them back out.
            rusqlite::Error::FromSqlConversionFailure(idx, ty, inner) => {
                match inner.downcast::<ListDecodeError>() {
                    Ok(decode) => StoreError::Decode(*decode),
                    Err(inner) => {
                        StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(idx, ty, inner))
                    }
                }
            }
            other => StoreError::Sqlite(other),
        }
    }
}

/// Map SQLite's constraint message (e.g. `UNIQUE constraint failed: jobs.source, jobs.source_id`)
/// to the constraint it names.
fn classify_constraint(message: &str) -> ConstraintViolation {
    if message.starts_with("FOREIGN KEY") {
        return ConstraintViolation::UnknownJob;
    }

    if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
        return match columns.trim() {
            "users.username" => ConstraintViolation::DuplicateUsername,
            "jobs.source, jobs.source_id" => ConstraintViolation::DuplicateJobSource,
            "settings.key" => ConstraintViolation::DuplicateSettingKey,
            _ => ConstraintViolation::Other(message.to_string()),
        };
    }

    if let Some(column) = message.strip_prefix("NOT NULL constraint failed: ") {
        if let Some((table, column)) = column.trim().split_once('.') {
            return ConstraintViolation::MissingValue {
                table: table.to_string(),
                column: column.to_string(),
            };
        }
    }

    ConstraintViolation::Other(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unique() {
        assert_eq!(
            classify_constraint("UNIQUE constraint failed: jobs.source, jobs.source_id"),
            ConstraintViolation::DuplicateJobSource
        );
        assert_eq!(
            classify_constraint("UNIQUE constraint failed: users.username"),
            ConstraintViolation::DuplicateUsername
        );
        assert_eq!(
            classify_constraint("UNIQUE constraint failed: settings.key"),
            ConstraintViolation::DuplicateSettingKey
        );
    }

    #[test]
    fn test_classify_not_null_and_fk() {
        assert_eq!(
            classify_constraint("NOT NULL constraint failed: jobs.url"),
            ConstraintViolation::MissingValue {
                table: "jobs".into(),
                column: "url".into()
            }
        );
        assert_eq!(
            classify_constraint("FOREIGN KEY constraint failed"),
            ConstraintViolation::UnknownJob
        );
        assert!(matches!(
            classify_constraint("CHECK constraint failed: x"),
            ConstraintViolation::Other(_)
        ));
    }

    #[test]
    fn test_is_duplicate() {
        let dup = StoreError::Constraint(ConstraintViolation::DuplicateJobSource);
        assert!(dup.is_duplicate());
        let fk = StoreError::Constraint(ConstraintViolation::UnknownJob);
        assert!(!fk.is_duplicate());
        let missing = StoreError::NotFound { entity: "job", id: 3 };
        assert!(!missing.is_duplicate());
    }
}
