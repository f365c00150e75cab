use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearcherError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("No field selected.")]
    NoFieldSelected,
    #[error("Descriptor error: {message}")]
    Descriptor { message: String },
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),
    #[error("Field {0} does not hold fact value rules")]
    NotFactValueField(u64),
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("Row {row} at level {level} has nothing to expand")]
    Inert { level: usize, row: usize },
    #[error("Unknown session: {0}")]
    UnknownSession(u64),
    #[error("Backend {endpoint} answered with status {status}")]
    Backend { endpoint: String, status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Parse error: {message}")]
    Parse { message: String },
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SearcherError>;

// Helper conversions
impl From<rusqlite::Error> for SearcherError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<::config::ConfigError> for SearcherError {
    fn from(e: ::config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl From<reqwest::Error> for SearcherError {
    fn from(e: reqwest::Error) -> Self { Self::Transport(e.to_string()) }
}

impl From<serde_json::Error> for SearcherError {
    fn from(e: serde_json::Error) -> Self { Self::Parse { message: e.to_string() } }
}
