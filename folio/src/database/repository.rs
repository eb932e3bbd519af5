//! Repository layer for database operations
//!
//! This module provides CRUD operations for documents and annotations.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert document metadata
    pub async fn create_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (id, title, category, page_count, file_ref, file_name, size, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.title)
        .bind(&req.category)
        .bind(req.page_count)
        .bind(&req.file_ref)
        .bind(&req.file_name)
        .bind(req.size)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created document: {}", id);
        Ok(document)
    }

    /// Get a document by ID
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound(id.to_string()))
    }

    /// List all documents in upload order
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    /// Delete a document; annotations go with it via ON DELETE CASCADE.
    ///
    /// Returns the deleted row so the caller can release its file.
    pub async fn delete_document(&self, id: &str) -> Result<Document> {
        let mut tx = self.pool.begin().await?;

        let document = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound(id.to_string()))?;

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Deleted document: {}", id);
        Ok(document)
    }

    /// Number of documents whose file lives at `file_ref`
    pub async fn count_documents_with_file(&self, file_ref: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE file_ref = ?")
            .bind(file_ref)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Record the discovered page count and the time the document was opened
    pub async fn record_opened(&self, id: &str, page_count: u32) -> Result<Document> {
        let rows = sqlx::query(
            r#"
            UPDATE documents SET page_count = ?, last_opened_at = ? WHERE id = ?
            "#,
        )
        .bind(i64::from(page_count))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::DocumentNotFound(id.to_string()));
        }

        self.get_document(id).await
    }

    /// Insert an annotation for a document
    pub async fn create_annotation(
        &self,
        document_id: &str,
        draft: &AnnotationDraft,
    ) -> Result<Annotation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let body_json = serde_json::to_string(&draft.body)?;

        let record = sqlx::query_as::<_, AnnotationRecord>(
            r#"
            INSERT INTO annotations (id, document_id, page, kind, body_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(document_id)
        .bind(i64::from(draft.page))
        .bind(draft.body.kind())
        .bind(&body_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created {} annotation: {} for document: {}", record.kind, id, document_id);
        Annotation::try_from(record)
    }

    /// List annotations for a document in creation order, optionally for one page
    pub async fn list_annotations(
        &self,
        document_id: &str,
        page: Option<u32>,
    ) -> Result<Vec<Annotation>> {
        let page = page.map(i64::from);

        let records = sqlx::query_as::<_, AnnotationRecord>(
            r#"
            SELECT * FROM annotations
            WHERE document_id = ? AND (? IS NULL OR page = ?)
            ORDER BY rowid ASC
            "#,
        )
        .bind(document_id)
        .bind(page)
        .bind(page)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Annotation::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use crate::viewer::geometry::{RelativePoint, RelativeRect};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn document_request(title: &str, file_ref: &str) -> CreateDocumentRequest {
        CreateDocumentRequest {
            title: title.to_string(),
            category: "Learning".to_string(),
            page_count: Some(3),
            file_ref: file_ref.to_string(),
            file_name: format!("{}.pdf", title),
            size: 1024,
        }
    }

    fn note(page: u32, text: &str) -> AnnotationDraft {
        AnnotationDraft {
            page,
            body: AnnotationBody::Text {
                text: text.to_string(),
                position: RelativePoint { x: 20.0, y: 30.0 },
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_get_document() {
        let repo = create_test_repo().await;

        let document = repo
            .create_document(document_request("Intro to AI", "abc"))
            .await
            .unwrap();
        assert_eq!(document.title, "Intro to AI");
        assert_eq!(document.page_count, Some(3));
        assert!(document.last_opened_at.is_none());

        let fetched = repo.get_document(&document.id).await.unwrap();
        assert_eq!(fetched, document);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let repo = create_test_repo().await;

        let result = repo.get_document("nope").await;
        assert!(matches!(result, Err(AppError::DocumentNotFound(_))));

        let result = repo.delete_document("nope").await;
        assert!(matches!(result, Err(AppError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_documents_in_upload_order() {
        let repo = create_test_repo().await;

        for title in ["First", "Second", "Third"] {
            repo.create_document(document_request(title, title)).await.unwrap();
        }

        let titles: Vec<String> = repo
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_record_opened() {
        let repo = create_test_repo().await;

        let mut req = document_request("Recipes", "def");
        req.page_count = None;
        let document = repo.create_document(req).await.unwrap();

        let opened = repo.record_opened(&document.id, 50).await.unwrap();
        assert_eq!(opened.page_count, Some(50));
        assert!(opened.last_opened_at.is_some());
    }

    #[tokio::test]
    async fn test_annotations_by_page_in_order() {
        let repo = create_test_repo().await;
        let document = repo
            .create_document(document_request("Patterns", "ghi"))
            .await
            .unwrap();

        repo.create_annotation(&document.id, &note(1, "first")).await.unwrap();
        repo.create_annotation(&document.id, &note(2, "second")).await.unwrap();
        repo.create_annotation(&document.id, &note(1, "third")).await.unwrap();

        let all = repo.list_annotations(&document.id, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|a| a.pdf_document_id == document.id));

        let page_one = repo.list_annotations(&document.id, Some(1)).await.unwrap();
        let texts: Vec<&str> = page_one
            .iter()
            .map(|a| match &a.body {
                AnnotationBody::Text { text, .. } => text.as_str(),
                AnnotationBody::Highlight { .. } => "",
            })
            .collect();
        assert_eq!(texts, vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_highlight_round_trips_through_storage() {
        let repo = create_test_repo().await;
        let document = repo
            .create_document(document_request("Highlights", "jkl"))
            .await
            .unwrap();

        let draft = AnnotationDraft {
            page: 2,
            body: AnnotationBody::Highlight {
                rects: vec![
                    RelativeRect { left: 10.0, top: 20.0, width: 50.0, height: 2.0 },
                    RelativeRect { left: 10.0, top: 23.0, width: 20.0, height: 2.0 },
                ],
                text: Some("two lines".to_string()),
            },
        };

        let saved = repo.create_annotation(&document.id, &draft).await.unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(saved.body, draft.body);

        let listed = repo.list_annotations(&document.id, Some(2)).await.unwrap();
        assert_eq!(listed, vec![saved]);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_annotations() {
        let repo = create_test_repo().await;
        let document = repo
            .create_document(document_request("Cascade", "mno"))
            .await
            .unwrap();

        repo.create_annotation(&document.id, &note(1, "gone soon")).await.unwrap();

        let deleted = repo.delete_document(&document.id).await.unwrap();
        assert_eq!(deleted.file_ref, "mno");

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotations")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_count_documents_with_file() {
        let repo = create_test_repo().await;

        repo.create_document(document_request("A", "shared")).await.unwrap();
        repo.create_document(document_request("B", "shared")).await.unwrap();
        repo.create_document(document_request("C", "other")).await.unwrap();

        assert_eq!(repo.count_documents_with_file("shared").await.unwrap(), 2);
        assert_eq!(repo.count_documents_with_file("missing").await.unwrap(), 0);
    }
}
