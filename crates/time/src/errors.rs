//! Error types for peer time tracking

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimeDataError {
    #[error("Median filter capacity must be at least 1")]
    InvalidCapacity,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, TimeDataError>;
