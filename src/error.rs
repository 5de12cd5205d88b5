use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl TallyError {
    /// Stable machine-readable kind for the presentation layer;
    /// messages are free text, codes are not.
    pub fn code(&self) -> &'static str {
        match self {
            TallyError::Db(_) => "db",
            TallyError::Io(_) => "io",
            TallyError::InvalidArgument(_) => "invalid_argument",
            TallyError::Consistency(_) => "consistency",
            TallyError::Unsupported(_) => "unsupported",
            TallyError::NotFound(_) => "not_found",
            TallyError::Settings(_) => "settings",
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
