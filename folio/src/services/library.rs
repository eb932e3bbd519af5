//! Library service
//!
//! Handles uploaded PDFs: metadata in the repository, bytes in the
//! blob store. Validation happens here, before anything is written.

use crate::config::{DEFAULT_CATEGORY, MAX_UPLOAD_BYTES, PDF_MAGIC};
use crate::database::{CreateDocumentRequest, Document, Repository, UploadRequest};
use crate::error::{AppError, Result};
use crate::render::LopdfRenderer;
use crate::storage::BlobStore;
use crate::viewer::{DocumentService, RenderCapability};
use std::path::Path;

/// Service for managing the document library
#[derive(Clone)]
pub struct LibraryService {
    repo: Repository,
    blob_store: BlobStore,
    renderer: LopdfRenderer,
}

impl LibraryService {
    pub fn new(repo: Repository, blob_store: BlobStore) -> Self {
        Self {
            repo,
            blob_store,
            renderer: LopdfRenderer::new(),
        }
    }

    /// List all documents
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        self.repo.list_documents().await
    }

    /// Search documents by title or category, ignoring case
    pub async fn search_documents(&self, query: &str) -> Result<Vec<Document>> {
        let all_documents = self.list_documents().await?;

        let query_lower = query.trim().to_lowercase();

        let filtered: Vec<Document> = all_documents
            .into_iter()
            .filter(|doc| {
                doc.title.to_lowercase().contains(&query_lower)
                    || doc.category.to_lowercase().contains(&query_lower)
            })
            .collect();

        Ok(filtered)
    }

    /// Get a document by ID
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.repo.get_document(id).await
    }

    /// Validate and store an uploaded PDF
    pub async fn upload_document(&self, request: UploadRequest) -> Result<Document> {
        tracing::info!(
            "Uploading document: {} (size: {} bytes)",
            request.file_name,
            request.data.len()
        );

        validate_pdf_bytes(&request.data)?;

        let page_count = self
            .renderer
            .page_count(&request.data)
            .map_err(|e| AppError::Validation(format!("Not a readable PDF: {}", e)))?;

        let file_name = sanitize_filename(&request.file_name);
        if file_name.is_empty() {
            return Err(AppError::Validation("File name is required".to_string()));
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_title(&file_name));

        let category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        // A concurrent delete of the last document sharing these bytes must
        // not remove the file between the write and the insert
        let _file_lock = self
            .blob_store
            .lock(&BlobStore::reference_for(&request.data))
            .await;
        let file_ref = self.blob_store.write(&request.data).await?;

        let document = self
            .repo
            .create_document(CreateDocumentRequest {
                title,
                category,
                page_count: Some(i64::from(page_count)),
                file_ref,
                file_name,
                size: request.data.len() as i64,
            })
            .await?;

        tracing::info!("Document uploaded: {} ({} pages)", document.id, page_count);

        Ok(document)
    }

    /// Document metadata together with its PDF bytes
    pub async fn read_file(&self, id: &str) -> Result<(Document, Vec<u8>)> {
        let document = self.repo.get_document(id).await?;
        let data = self.blob_store.read(&document.file_ref).await?;
        Ok((document, data))
    }

    /// Delete a document and its annotations.
    ///
    /// The file is removed only when no other document shares it.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting document: {}", id);

        let document = self.repo.delete_document(id).await?;

        let _file_lock = self.blob_store.lock(&document.file_ref).await;
        let remaining = self.repo.count_documents_with_file(&document.file_ref).await?;
        if remaining == 0 {
            if let Err(e) = self.blob_store.delete(&document.file_ref).await {
                tracing::warn!("Failed to remove file for document {}: {}", id, e);
            }
        } else {
            tracing::debug!(
                "Keeping file {} still used by {} documents",
                document.file_ref,
                remaining
            );
        }

        tracing::info!("Document deleted successfully: {}", id);

        Ok(())
    }

    /// Store the page count found on open and stamp the open time
    pub async fn record_opened(&self, id: &str, page_count: u32) -> Result<Document> {
        self.repo.record_opened(id, page_count).await
    }
}

impl DocumentService for LibraryService {
    async fn list(&self) -> Result<Vec<Document>> {
        self.list_documents().await
    }

    async fn get(&self, id: &str) -> Result<Document> {
        self.get_document(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_document(id).await
    }

    async fn fetch_file(&self, id: &str) -> Result<Vec<u8>> {
        let (_, data) = self.read_file(id).await?;
        Ok(data)
    }

    async fn upload(&self, request: UploadRequest) -> Result<Document> {
        self.upload_document(request).await
    }

    async fn record_opened(&self, id: &str, page_count: u32) -> Result<Document> {
        LibraryService::record_opened(self, id, page_count).await
    }
}

fn validate_pdf_bytes(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(format!(
            "File is {} bytes; the limit is {} bytes",
            data.len(),
            MAX_UPLOAD_BYTES
        )));
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation("File is not a PDF".to_string()));
    }
    Ok(())
}

/// Strip path separators and null bytes, replace whitespace with '-'
fn sanitize_filename(filename: &str) -> String {
    filename
        .trim()
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .take(255)
        .collect()
}

fn default_title(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use crate::render::test_support::sample_pdf;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn create_test_service() -> (LibraryService, TempDir) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);

        let temp_dir = TempDir::new().unwrap();
        let blob_store = BlobStore::new(temp_dir.path().join("blobs"));
        blob_store.initialize().await.unwrap();

        (LibraryService::new(repo, blob_store), temp_dir)
    }

    fn upload(file_name: &str, title: Option<&str>, data: Vec<u8>) -> UploadRequest {
        UploadRequest {
            file_name: file_name.to_string(),
            title: title.map(str::to_string),
            category: None,
            data,
        }
    }

    #[tokio::test]
    async fn test_upload_and_read_back() {
        let (service, _temp) = create_test_service().await;
        let data = sample_pdf(3);

        let document = service
            .upload_document(upload("intro to ai.pdf", None, data.clone()))
            .await
            .unwrap();

        assert_eq!(document.title, "intro-to-ai");
        assert_eq!(document.file_name, "intro-to-ai.pdf");
        assert_eq!(document.category, DEFAULT_CATEGORY);
        assert_eq!(document.page_count, Some(3));
        assert_eq!(document.size, data.len() as i64);

        let (fetched, bytes) = service.read_file(&document.id).await.unwrap();
        assert_eq!(fetched.id, document.id);
        assert_eq!(bytes, data);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_files() {
        let (service, _temp) = create_test_service().await;

        let empty = service.upload_document(upload("a.pdf", None, Vec::new())).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let text = service
            .upload_document(upload("a.pdf", None, b"hello world".to_vec()))
            .await;
        assert!(matches!(text, Err(AppError::Validation(_))));

        let truncated = service
            .upload_document(upload("a.pdf", None, b"%PDF-1.5\ngarbage".to_vec()))
            .await;
        assert!(matches!(truncated, Err(AppError::Validation(_))));

        let mut huge = b"%PDF-".to_vec();
        huge.resize(MAX_UPLOAD_BYTES + 1, b' ');
        let too_big = service.upload_document(upload("a.pdf", None, huge)).await;
        assert!(matches!(too_big, Err(AppError::Validation(_))));

        assert!(service.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_documents() {
        let (service, _temp) = create_test_service().await;

        service
            .upload_document(upload("a.pdf", Some("Introduction to AI"), sample_pdf(1)))
            .await
            .unwrap();
        let mut recipes = upload("b.pdf", Some("Healthy Recipes"), sample_pdf(2));
        recipes.category = Some("Cooking".to_string());
        service.upload_document(recipes).await.unwrap();

        let results = service.search_documents("healthy").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Healthy Recipes");

        let by_category = service.search_documents("COOK").await.unwrap();
        assert_eq!(by_category.len(), 1);

        assert_eq!(service.search_documents("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_keeps_shared_file() {
        let (service, _temp) = create_test_service().await;
        let data = sample_pdf(2);

        let first = service
            .upload_document(upload("one.pdf", None, data.clone()))
            .await
            .unwrap();
        let second = service
            .upload_document(upload("two.pdf", None, data.clone()))
            .await
            .unwrap();
        assert_eq!(first.file_ref, second.file_ref);

        service.delete_document(&first.id).await.unwrap();
        assert!(service.blob_store.exists(&second.file_ref).await.unwrap());
        assert_eq!(service.fetch_file(&second.id).await.unwrap(), data);

        service.delete_document(&second.id).await.unwrap();
        assert!(!service.blob_store.exists(&second.file_ref).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_racing_reupload_keeps_file() {
        let (service, _temp) = create_test_service().await;
        let data = sample_pdf(2);

        let first = service
            .upload_document(upload("one.pdf", None, data.clone()))
            .await
            .unwrap();

        // Hold the file while the delete runs, then upload the same bytes
        let file_lock = service.blob_store.lock(&first.file_ref).await;
        let (deleted, reuploaded) = tokio::join!(
            service.delete_document(&first.id),
            async {
                tokio::task::yield_now().await;
                drop(file_lock);
                service
                    .upload_document(upload("two.pdf", None, data.clone()))
                    .await
            }
        );
        deleted.unwrap();
        let second = reuploaded.unwrap();

        assert_eq!(second.file_ref, first.file_ref);
        assert!(service.blob_store.exists(&second.file_ref).await.unwrap());
        let (_, bytes) = service.read_file(&second.id).await.unwrap();
        assert_eq!(bytes, data);
    }

    #[tokio::test]
    async fn test_delete_missing_document() {
        let (service, _temp) = create_test_service().await;

        let result = service.delete_document("nope").await;

        assert!(matches!(result, Err(AppError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_record_opened() {
        let (service, _temp) = create_test_service().await;
        let document = service
            .upload_document(upload("a.pdf", None, sample_pdf(1)))
            .await
            .unwrap();

        let opened = service.record_opened(&document.id, 1).await.unwrap();

        assert!(opened.last_opened_at.is_some());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal.pdf"), "normal.pdf");
        assert_eq!(sanitize_filename("../../../etc/passwd"), "......etcpasswd");
        assert_eq!(sanitize_filename("my notes\\final.pdf"), "my-notesfinal.pdf");
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("report.pdf"), "report");
        assert_eq!(default_title("archive.tar.pdf"), "archive.tar");
        assert_eq!(default_title("noext"), "noext");
    }
}
