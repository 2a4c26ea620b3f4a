use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudioError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A post-condition of the engine failed. Callers treat this as fatal.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl ClaudioError {
    /// Returns `true` when the error is SQLite lock contention that outlasted
    /// the busy timeout (another hook invocation held the write lock).
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Storage(msg) => is_busy_message(msg),
            _ => false,
        }
    }

    /// Returns `true` for errors that must reach the process exit code.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

impl From<rusqlite::Error> for ClaudioError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Why a hook event payload was rejected. Every variant maps to exit code 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    EmptyInput,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("wrong type for field: {0}")]
    TypeMismatch(&'static str),
}

impl ParseError {
    /// Name of the offending field, when the failure is field-specific.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField(name) | Self::TypeMismatch(name) => Some(*name),
            Self::EmptyInput | Self::MalformedJson(_) => None,
        }
    }
}

fn is_busy_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    [
        "database is locked",
        "database file is locked",
        "database table is locked",
        "busy",
    ]
    .iter()
    .any(|p| msg_lower.contains(p))
}

pub type Result<T> = std::result::Result<T, ClaudioError>;
