use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonocovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse coverage snapshot '{source_name}': {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("Transfer failed for '{key}': {message}")]
    Transfer { key: String, message: String },

    #[error("No coverage snapshots found: {0}")]
    NoSnapshots(String),

    #[error("{count} package(s) dropped coverage by more than {threshold} percentage points")]
    ThresholdBreach { count: usize, threshold: f64 },
}

impl MonocovError {
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        MonocovError::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn transfer(key: impl Into<String>, message: impl ToString) -> Self {
        MonocovError::Transfer {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonocovError>;
