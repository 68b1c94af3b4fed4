use thiserror::Error;

pub type Result<T> = std::result::Result<T, MdbError>;

#[derive(Debug, Error)]
pub enum MdbError {
    #[error("SQLite error : {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error : {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error : {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error : {0}")]
    Parse(String),

    #[error("{0}")]
    Generic(String),

    /// Network or parsing yielded nothing for the url
    #[error("No data could be extracted from '{0}'")]
    ExtractionEmpty(String),

    /// A required column was missing when exporting a book for the db
    #[error("'{column}' can't be NULL when exporting for DB")]
    Validation { column: &'static str },

    #[error("More than one book matches {what} : {ids:?}")]
    IdentityAmbiguous { what: String, ids: Vec<i64> },

    #[error("Attempted to write to a database opened read-only")]
    ReadOnlyViolation,

    #[error("'{0}' is not a supported search type")]
    UnsupportedSearchKey(String),

    #[error("Sorting '{0}' is not supported")]
    InvalidSort(String),

    #[error("Operating System is not supported : {0}")]
    UnsupportedOS(String),

    #[error("Could not get env value : {0}")]
    UnavailableEnvVariable(String),

    #[error("Could not create path : {0}")]
    PathCreationFailed(String),
}

impl MdbError {
    /// True for errors raised by SQLite because the connection is read-only
    pub fn is_read_only(&self) -> bool {
        match self {
            MdbError::ReadOnlyViolation => true,
            MdbError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ReadOnly
            }
            _ => false,
        }
    }
}
