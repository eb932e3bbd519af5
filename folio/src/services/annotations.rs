//! Annotations service
//!
//! Validates drafts against their document before they reach the
//! repository, so stored annotations always sit on a real page.

use crate::database::{Annotation, AnnotationBody, AnnotationDraft, Document, Repository};
use crate::error::{AppError, Result};
use crate::viewer::AnnotationService;

/// Service for managing annotations
#[derive(Clone)]
pub struct AnnotationsService {
    repo: Repository,
}

impl AnnotationsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// List a document's annotations, optionally for one page
    pub async fn list_annotations(
        &self,
        document_id: &str,
        page: Option<u32>,
    ) -> Result<Vec<Annotation>> {
        // 404 for unknown documents rather than an empty list
        self.repo.get_document(document_id).await?;
        self.repo.list_annotations(document_id, page).await
    }

    /// Validate and store a new annotation
    pub async fn create_annotation(
        &self,
        document_id: &str,
        draft: AnnotationDraft,
    ) -> Result<Annotation> {
        let document = self.repo.get_document(document_id).await?;
        validate_draft(&document, &draft)?;

        let annotation = self.repo.create_annotation(document_id, &draft).await?;

        tracing::info!(
            "Annotation created: {} ({} on page {})",
            annotation.id,
            annotation.body.kind(),
            annotation.page
        );

        Ok(annotation)
    }
}

impl AnnotationService for AnnotationsService {
    async fn list(&self, document_id: &str, page: Option<u32>) -> Result<Vec<Annotation>> {
        self.list_annotations(document_id, page).await
    }

    async fn create(&self, document_id: &str, draft: AnnotationDraft) -> Result<Annotation> {
        self.create_annotation(document_id, draft).await
    }
}

fn validate_draft(document: &Document, draft: &AnnotationDraft) -> Result<()> {
    if draft.page == 0 {
        return Err(AppError::Validation("Pages are numbered from 1".to_string()));
    }
    if let Some(count) = document.page_count {
        if i64::from(draft.page) > count {
            return Err(AppError::Validation(format!(
                "Page {} is beyond the last page ({})",
                draft.page, count
            )));
        }
    }

    match &draft.body {
        AnnotationBody::Text { text, position } => {
            if text.trim().is_empty() {
                return Err(AppError::Validation("Note text is empty".to_string()));
            }
            if !position.is_finite() {
                return Err(AppError::Validation("Note position is not finite".to_string()));
            }
        }
        AnnotationBody::Highlight { rects, .. } => {
            if rects.is_empty() {
                return Err(AppError::Validation("Highlight has no rects".to_string()));
            }
            if rects
                .iter()
                .any(|r| !r.is_finite() || r.width < 0.0 || r.height < 0.0)
            {
                return Err(AppError::Validation(
                    "Highlight rects must be finite with non-negative size".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, CreateDocumentRequest};
    use crate::viewer::geometry::{RelativePoint, RelativeRect};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> (AnnotationsService, Document) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let document = repo
            .create_document(CreateDocumentRequest {
                title: "Intro to AI".to_string(),
                category: "Learning".to_string(),
                page_count: Some(3),
                file_ref: "f".repeat(64),
                file_name: "intro.pdf".to_string(),
                size: 10,
            })
            .await
            .unwrap();

        (AnnotationsService::new(repo), document)
    }

    fn note(page: u32, text: &str) -> AnnotationDraft {
        AnnotationDraft {
            page,
            body: AnnotationBody::Text {
                text: text.to_string(),
                position: RelativePoint { x: 11.25, y: 10.0 },
            },
        }
    }

    fn highlight(page: u32, rects: Vec<RelativeRect>) -> AnnotationDraft {
        AnnotationDraft {
            page,
            body: AnnotationBody::Highlight {
                rects,
                text: Some("two lines".to_string()),
            },
        }
    }

    fn rect(top: f64, width: f64) -> RelativeRect {
        RelativeRect {
            left: 10.0,
            top,
            width,
            height: 2.0,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_page() {
        let (service, document) = create_test_service().await;

        service.create_annotation(&document.id, note(1, "first")).await.unwrap();
        let saved = service
            .create_annotation(&document.id, highlight(2, vec![rect(10.0, 50.0), rect(12.5, 20.0)]))
            .await
            .unwrap();

        assert_eq!(saved.pdf_document_id, document.id);
        assert_eq!(saved.page, 2);

        let all = service.list_annotations(&document.id, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let second_page = service.list_annotations(&document.id, Some(2)).await.unwrap();
        assert_eq!(second_page, vec![saved]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_drafts() {
        let (service, document) = create_test_service().await;

        let cases = vec![
            note(0, "page zero"),
            note(4, "past the end"),
            note(1, "   "),
            AnnotationDraft {
                page: 1,
                body: AnnotationBody::Text {
                    text: "nan".to_string(),
                    position: RelativePoint { x: f64::NAN, y: 1.0 },
                },
            },
            highlight(1, Vec::new()),
            highlight(1, vec![rect(10.0, -5.0)]),
            highlight(1, vec![rect(f64::INFINITY, 5.0)]),
        ];

        for draft in cases {
            let result = service.create_annotation(&document.id, draft.clone()).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "accepted {:?}",
                draft
            );
        }

        assert!(service.list_annotations(&document.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let (service, _document) = create_test_service().await;

        let listed = service.list_annotations("missing", None).await;
        assert!(matches!(listed, Err(AppError::DocumentNotFound(_))));

        let created = service.create_annotation("missing", note(1, "x")).await;
        assert!(matches!(created, Err(AppError::DocumentNotFound(_))));
    }
}
