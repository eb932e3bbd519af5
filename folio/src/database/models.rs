//! Database models
//!
//! Rust structs representing stored entities and the annotation union.
//! All models use serde (camelCase) for serialization to API clients.

use crate::error::{AppError, Result};
use crate::viewer::geometry::{RelativePoint, RelativeRect};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// PDF document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub category: String,
    /// Unknown until the document has been rendered once
    pub page_count: Option<i64>,
    /// Opaque handle into the blob store (SHA-256 of the file)
    pub file_ref: String,
    pub file_name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub last_opened_at: Option<DateTime<Utc>>,
}

/// Upload request for a new document
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub data: Vec<u8>,
}

/// Insert request for document metadata after the file is stored
#[derive(Debug)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub category: String,
    pub page_count: Option<i64>,
    pub file_ref: String,
    pub file_name: String,
    pub size: i64,
}

/// Variant payload and anchor of an annotation, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationBody {
    /// Sticky note anchored at a single point
    Text {
        text: String,
        position: RelativePoint,
    },
    /// Highlight over one rect per visual line fragment
    Highlight {
        rects: Vec<RelativeRect>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl AnnotationBody {
    pub fn kind(&self) -> &'static str {
        match self {
            AnnotationBody::Text { .. } => "text",
            AnnotationBody::Highlight { .. } => "highlight",
        }
    }
}

/// Client-built annotation that has not been saved yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    pub page: u32,
    #[serde(flatten)]
    pub body: AnnotationBody,
}

/// Saved annotation carrying its server-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub pdf_document_id: String,
    pub page: u32,
    #[serde(flatten)]
    pub body: AnnotationBody,
}

/// Annotation row as stored; the body is kept as tagged JSON
#[derive(Debug, Clone, FromRow)]
pub struct AnnotationRecord {
    pub id: String,
    pub document_id: String,
    pub page: i64,
    pub kind: String,
    pub body_json: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AnnotationRecord> for Annotation {
    type Error = AppError;

    fn try_from(record: AnnotationRecord) -> Result<Self> {
        let body: AnnotationBody = serde_json::from_str(&record.body_json)?;
        let page = u32::try_from(record.page).map_err(|_| {
            AppError::Generic(format!("Annotation {} has page {}", record.id, record.page))
        })?;

        Ok(Annotation {
            id: record.id,
            pdf_document_id: record.document_id,
            page,
            body,
        })
    }
}
