//! `AppError`, the single error type of the crate, and the `Result` alias built on it.
//!
//! Wrapped library errors that are not `Clone` sit behind an `Arc` so the whole enum
//! stays cloneable.

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Transport or status failure from the OpenAQ adapter.
    #[error("API Error: {0}")]
    Api(Arc<reqwest::Error>),

    /// Archive database failure.
    #[error("Database Error: {0}")]
    Db(Arc<sqlx::Error>),

    #[error("JSON Error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// A command that cannot run in the current setup, e.g. archive commands without a database.
    #[error("CLI Error: {0}")]
    Cli(String),

    #[error("Prompt Error: {0}")]
    Dialoguer(Arc<dialoguer::Error>),

    #[error("Progress Style Template Error: {0}")]
    Template(Arc<indicatif::style::TemplateError>),

    /// A ranking kind, limit or history window outside the accepted range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A reading source failed or timed out. Only ever logged; the source then
    /// contributes nothing to the pass.
    #[error("Upstream source '{source_name}' unavailable: {message}")]
    Upstream { source_name: String, message: String },

    /// A configuration value could not be parsed or is out of range.
    #[error("Configuration Error: {0}")]
    Config(String),
}

impl AppError {
    pub fn upstream(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(Arc::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Db(Arc::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonParse(Arc::new(err))
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::Dialoguer(Arc::new(err))
    }
}

impl From<indicatif::style::TemplateError> for AppError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        AppError::Template(Arc::new(err))
    }
}
