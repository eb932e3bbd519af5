//! Annotation geometry & viewer state engine
//!
//! - `geometry`: pixel <-> page-relative percentage conversion
//! - `surface`: the viewer surface abstraction and a stacked page layout
//! - `selection`: text selection -> normalized highlight rects
//! - `store`: client-side cache of the open document's annotations
//! - `controller`: document lifecycle, zoom, modes and persistence dispatch
//!
//! The controller reaches its collaborators through the traits below.

pub mod controller;
pub mod geometry;
pub mod selection;
pub mod store;
pub mod surface;

pub use controller::{
    DeleteOutcome, HighlightOverlay, NoteOverlay, PageOverlay, ViewerController, ViewerMode,
    ViewerPhase,
};
pub use geometry::{Point, Rect, RelativePoint, RelativeRect};
pub use selection::{SelectionOutcome, SelectionSnapshot, SelectionTracker, TrackedSelection};
pub use store::AnnotationStore;
pub use surface::{NodeId, PageLayout, PageSize, ViewerSurface};

use crate::database::{Annotation, AnnotationDraft, Document, UploadRequest};
use crate::error::Result;

/// Document metadata and file access
#[allow(async_fn_in_trait)]
pub trait DocumentService {
    async fn list(&self) -> Result<Vec<Document>>;

    async fn get(&self, id: &str) -> Result<Document>;

    /// Delete a document together with its annotations
    async fn delete(&self, id: &str) -> Result<()>;

    /// Raw bytes behind the document's file reference
    async fn fetch_file(&self, id: &str) -> Result<Vec<u8>>;

    async fn upload(&self, request: UploadRequest) -> Result<Document>;

    /// Store the discovered page count and the open time
    async fn record_opened(&self, id: &str, page_count: u32) -> Result<Document>;
}

/// Annotation persistence; the service assigns ids
#[allow(async_fn_in_trait)]
pub trait AnnotationService {
    async fn list(&self, document_id: &str, page: Option<u32>) -> Result<Vec<Annotation>>;

    async fn create(&self, document_id: &str, draft: AnnotationDraft) -> Result<Annotation>;
}

/// What the engine needs from a PDF engine
pub trait RenderCapability {
    /// Total page count of the PDF in `data`
    fn page_count(&self, data: &[u8]) -> Result<u32>;
}
