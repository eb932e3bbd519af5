//! Error types for Folio
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to API clients.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Zero-area or non-finite page box during coordinate conversion
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Pointer or selection event could not be mapped to a page
    #[error("Could not resolve page: {0}")]
    PageResolution(String),

    /// Text selection produced no client rectangles
    #[error("Selection has no geometry")]
    EmptyGeometry,

    #[error("Failed to persist: {0}")]
    Persistence(String),

    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// Response arrived for a document that is no longer open
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid viewer state: {0}")]
    InvalidState(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Geometry and resolution failures are normal "clicked in the wrong place"
    /// conditions and never reach the user.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(
            self,
            AppError::InvalidGeometry(_) | AppError::PageResolution(_) | AppError::EmptyGeometry
        )
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
