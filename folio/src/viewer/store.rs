//! Client-side annotation cache for the open document

use crate::database::Annotation;

/// Ordered cache of saved annotations.
///
/// Order is insertion order and only matters for stable rendering. Ids are
/// not de-duplicated; callers must not append the same record twice.
#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache, e.g. with the result of a fetch
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    /// Add a record returned by a successful save
    pub fn append(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Annotations on page `page`, in insertion order
    pub fn by_page(&self, page: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter(move |a| a.page == page)
    }

    /// Annotations belonging to `document_id`
    pub fn for_document<'a>(
        &'a self,
        document_id: &'a str,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .iter()
            .filter(move |a| a.pdf_document_id == document_id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.annotations.iter().any(|a| a.id == id)
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Remove and return everything, leaving the cache empty
    pub fn take(&mut self) -> Vec<Annotation> {
        std::mem::take(&mut self.annotations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
