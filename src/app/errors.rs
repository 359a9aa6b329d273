use crate::{ingest::CsvImportError, semantic::StoreError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("No highlights found matching the criteria.")]
    NotFound,

    #[error("Search prompt is required")]
    EmptyPrompt,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Import(#[from] CsvImportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unexpected error: {0:#}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::EmptyPrompt
                | AppError::InvalidUpload(_)
                | AppError::InvalidRequest(_)
                | AppError::Import(_)
        )
    }
}
