//! Viewer controller
//!
//! State machine for the open document: `Closed -> Opening -> Open -> Closed`,
//! with `Open` carrying the page count, the render scale and a sub-mode.
//!
//! Methods take `&self` and keep state behind a mutex that is never held
//! across an `.await`, so UI events and network responses can interleave
//! on one task. Every request is tagged with the document id and the open
//! session at request time; a response whose tag no longer matches is
//! discarded instead of touching the new document's state.

use super::geometry::{to_absolute_point, to_absolute_rect, to_relative_point, Point, Rect};
use super::selection::{SelectionOutcome, SelectionSnapshot, SelectionTracker, TrackedSelection};
use super::store::AnnotationStore;
use super::surface::{NodeId, ViewerSurface};
use super::{AnnotationService, DocumentService, RenderCapability};
use crate::config::{DEFAULT_NOTE_TEXT, DEFAULT_SCALE, MAX_SCALE, MIN_SCALE, PERCENT, ZOOM_STEP};
use crate::database::{Annotation, AnnotationBody, AnnotationDraft, Document, UploadRequest};
use crate::error::{AppError, Result};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    Browsing,
    PlacingNote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerPhase {
    Closed,
    Opening {
        document_id: String,
    },
    Open {
        document_id: String,
        page_count: u32,
        scale: f64,
        mode: ViewerMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// A delete for the same id was already running; nothing was sent
    AlreadyInFlight,
}

/// Everything drawn on top of one rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct PageOverlay {
    pub page: u32,
    pub page_box: Rect,
    pub notes: Vec<NoteOverlay>,
    pub highlights: Vec<HighlightOverlay>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteOverlay {
    pub annotation_id: String,
    pub text: String,
    pub at: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightOverlay {
    pub annotation_id: String,
    pub rects: Vec<Rect>,
}

/// Identity of the open document at the time a request was sent
#[derive(Debug, Clone)]
struct Ticket {
    document_id: String,
    session: u64,
}

struct ViewerState {
    phase: ViewerPhase,
    session: u64,
    store: AnnotationStore,
    selection: SelectionTracker,
    note_text: String,
    library: Vec<Document>,
    deleting: HashSet<String>,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            phase: ViewerPhase::Closed,
            session: 0,
            store: AnnotationStore::new(),
            selection: SelectionTracker::new(),
            note_text: String::new(),
            library: Vec::new(),
            deleting: HashSet::new(),
        }
    }

    fn current_document_id(&self) -> Option<&str> {
        match &self.phase {
            ViewerPhase::Closed => None,
            ViewerPhase::Opening { document_id } | ViewerPhase::Open { document_id, .. } => {
                Some(document_id)
            }
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.session == ticket.session && self.current_document_id() == Some(&ticket.document_id)
    }

    /// Start a new session; in-flight requests of the old one go stale
    fn reset(&mut self, phase: ViewerPhase) {
        self.session += 1;
        self.phase = phase;
        self.store.clear();
        self.selection.clear();
        self.note_text.clear();
    }

    fn open_view(&self) -> Result<(&str, u32, f64, ViewerMode)> {
        match &self.phase {
            ViewerPhase::Open {
                document_id,
                page_count,
                scale,
                mode,
            } => Ok((document_id, *page_count, *scale, *mode)),
            _ => Err(AppError::InvalidState("no document is open".to_string())),
        }
    }

    fn set_mode(&mut self, new_mode: ViewerMode) {
        if let ViewerPhase::Open { mode, .. } = &mut self.phase {
            *mode = new_mode;
        }
    }

    fn upsert_library(&mut self, document: Document) {
        match self.library.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => self.library.push(document),
        }
    }

    fn replace_library_entry(&mut self, document: Document) {
        if let Some(existing) = self.library.iter_mut().find(|d| d.id == document.id) {
            *existing = document;
        }
    }
}

fn lock(state: &Mutex<ViewerState>) -> MutexGuard<'_, ViewerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the delete-in-flight flag even if the delete future is dropped
struct DeleteGuard<'a> {
    state: &'a Mutex<ViewerState>,
    id: String,
}

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).deleting.remove(&self.id);
    }
}

fn persistence(err: AppError) -> AppError {
    match err {
        AppError::Persistence(_) => err,
        other => AppError::Persistence(other.to_string()),
    }
}

pub struct ViewerController<D, A, R> {
    documents: D,
    annotations: A,
    renderer: R,
    state: Mutex<ViewerState>,
}

impl<D, A, R> ViewerController<D, A, R>
where
    D: DocumentService,
    A: AnnotationService,
    R: RenderCapability,
{
    pub fn new(documents: D, annotations: A, renderer: R) -> Self {
        Self {
            documents,
            annotations,
            renderer,
            state: Mutex::new(ViewerState::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewerState> {
        lock(&self.state)
    }

    // ===== Library =====

    /// Reload the library listing from the document service
    pub async fn refresh_library(&self) -> Result<Vec<Document>> {
        let documents = self.documents.list().await?;
        self.state().library = documents.clone();
        Ok(documents)
    }

    pub fn library(&self) -> Vec<Document> {
        self.state().library.clone()
    }

    /// Library entries whose title or category contains `term`, ignoring case
    pub fn filtered_library(&self, term: &str) -> Vec<Document> {
        let needle = term.to_lowercase();
        self.state()
            .library
            .iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.category.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub async fn upload_document(&self, request: UploadRequest) -> Result<Document> {
        let document = self.documents.upload(request).await?;
        tracing::info!("Uploaded document {} ({})", document.id, document.title);
        self.state().upsert_library(document.clone());
        Ok(document)
    }

    /// Delete a document. A second request for an id that is still being
    /// deleted is ignored.
    pub async fn delete_document(&self, id: &str) -> Result<DeleteOutcome> {
        if !self.state().deleting.insert(id.to_string()) {
            tracing::debug!("Delete already in flight for document {}", id);
            return Ok(DeleteOutcome::AlreadyInFlight);
        }
        let guard = DeleteGuard {
            state: &self.state,
            id: id.to_string(),
        };

        let result = self.documents.delete(id).await;
        drop(guard);

        match result {
            Ok(()) => {
                let mut state = self.state();
                state.library.retain(|d| d.id != id);
                if state.current_document_id() == Some(id) {
                    state.reset(ViewerPhase::Closed);
                }
                tracing::info!("Deleted document {}", id);
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                tracing::error!("Failed to delete document {}: {}", id, e);
                Err(persistence(e))
            }
        }
    }

    // ===== Document lifecycle =====

    /// Open `document`: discover its page count, then load its annotations.
    ///
    /// Returns the page count. A load failure leaves the viewer closed. An
    /// annotation fetch failure leaves the document open with an empty cache.
    pub async fn open_document(&self, document: &Document) -> Result<u32> {
        let ticket = {
            let mut state = self.state();
            state.reset(ViewerPhase::Opening {
                document_id: document.id.clone(),
            });
            Ticket {
                document_id: document.id.clone(),
                session: state.session,
            }
        };
        tracing::info!("Opening document {} ({})", document.id, document.title);

        let page_count = match self.discover_page_count(&document.id).await {
            Ok(count) => count,
            Err(e) => {
                let mut state = self.state();
                if state.is_current(&ticket) {
                    state.phase = ViewerPhase::Closed;
                }
                tracing::error!("Failed to load document {}: {}", document.id, e);
                return Err(match e {
                    AppError::Load(_) => e,
                    other => AppError::Load(other.to_string()),
                });
            }
        };

        {
            let mut state = self.state();
            if !state.is_current(&ticket) {
                tracing::debug!("Discarding page count for stale document {}", document.id);
                return Err(AppError::Cancelled(document.id.clone()));
            }
            state.phase = ViewerPhase::Open {
                document_id: document.id.clone(),
                page_count,
                scale: DEFAULT_SCALE,
                mode: ViewerMode::Browsing,
            };
        }
        tracing::info!("Document {} open with {} pages", document.id, page_count);

        let (recorded, fetched) = tokio::join!(
            self.documents.record_opened(&document.id, page_count),
            self.annotations.list(&document.id, None),
        );

        let mut state = self.state();
        let current = state.is_current(&ticket);
        match recorded {
            Ok(updated) if current => state.upsert_library(updated),
            // A stale open may only refresh an entry that is still listed
            Ok(updated) => state.replace_library_entry(updated),
            Err(e) => tracing::warn!("Could not record open of {}: {}", document.id, e),
        }

        if !current {
            tracing::debug!("Discarding annotations for stale document {}", document.id);
            return Err(AppError::Cancelled(document.id.clone()));
        }

        match fetched {
            Ok(annotations) => {
                // Saves that landed while the fetch was in flight stay
                let local = state.store.take();
                state.store.replace_all(annotations);
                for annotation in local {
                    if !state.store.contains_id(&annotation.id) {
                        state.store.append(annotation);
                    }
                }
                tracing::debug!(
                    "Loaded {} annotations for document {}",
                    state.store.len(),
                    document.id
                );
                Ok(page_count)
            }
            Err(e) => {
                tracing::error!("Failed to load annotations for {}: {}", document.id, e);
                Err(persistence(e))
            }
        }
    }

    async fn discover_page_count(&self, document_id: &str) -> Result<u32> {
        let data = self.documents.fetch_file(document_id).await?;
        self.renderer.page_count(&data)
    }

    /// Back to the library; pending requests for the document go stale
    pub fn close_document(&self) {
        let mut state = self.state();
        if let Some(id) = state.current_document_id() {
            tracing::info!("Closing document {}", id);
        }
        state.reset(ViewerPhase::Closed);
    }

    // ===== Zoom and modes =====

    /// Set the render scale, clamped to the allowed range
    pub fn set_scale(&self, requested: f64) -> Result<f64> {
        if !requested.is_finite() {
            return Err(AppError::Validation(format!("scale {} is not finite", requested)));
        }
        let mut state = self.state();
        match &mut state.phase {
            ViewerPhase::Open { scale, .. } => {
                *scale = requested.clamp(MIN_SCALE, MAX_SCALE);
                Ok(*scale)
            }
            _ => Err(AppError::InvalidState("no document is open".to_string())),
        }
    }

    pub fn zoom_in(&self) -> Result<f64> {
        let current = self.state().open_view()?.2;
        self.set_scale(current + ZOOM_STEP)
    }

    pub fn zoom_out(&self) -> Result<f64> {
        let current = self.state().open_view()?.2;
        self.set_scale(current - ZOOM_STEP)
    }

    /// Flip between browsing and note placement.
    ///
    /// Entering note placement drops any tracked selection.
    pub fn toggle_note_placement(&self) -> Result<ViewerMode> {
        let mut state = self.state();
        let next = match state.open_view()?.3 {
            ViewerMode::Browsing => ViewerMode::PlacingNote,
            ViewerMode::PlacingNote => ViewerMode::Browsing,
        };
        state.set_mode(next);
        if next == ViewerMode::PlacingNote {
            state.selection.clear();
        }
        Ok(next)
    }

    pub fn set_note_text(&self, text: impl Into<String>) {
        self.state().note_text = text.into();
    }

    // ===== Annotation capture =====

    /// Route a pointer release to the selection tracker.
    ///
    /// Geometry and page-resolution failures are logged and reported as
    /// `NoSelection`.
    pub fn handle_pointer_release<S: ViewerSurface + ?Sized>(
        &self,
        surface: &S,
        snapshot: Option<&SelectionSnapshot>,
    ) -> SelectionOutcome {
        let mut state = self.state();
        match state.open_view() {
            Ok((_, _, _, ViewerMode::Browsing)) => {}
            _ => {
                state.selection.clear();
                return SelectionOutcome::NoSelection;
            }
        }

        match state.selection.on_pointer_release(surface, snapshot) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("Ignoring selection: {}", e);
                SelectionOutcome::NoSelection
            }
        }
    }

    /// Place a note where the capture layer was clicked.
    ///
    /// Returns `Ok(None)` when the click is ignored: not in note placement,
    /// no page under the target, or a position off the page. On a failed
    /// save the viewer stays in note placement so the user can retry.
    pub async fn place_note_at<S: ViewerSurface + ?Sized>(
        &self,
        surface: &S,
        target: NodeId,
        pointer: Point,
    ) -> Result<Option<Annotation>> {
        let (ticket, draft, submitted_text) = {
            let state = self.state();
            let (document_id, page_count) = match state.open_view() {
                Ok((id, pages, _, ViewerMode::PlacingNote)) => (id.to_string(), pages),
                _ => {
                    tracing::debug!("Ignoring note click outside note placement");
                    return Ok(None);
                }
            };

            let Some(page) = surface.page_of(target).filter(|p| (1..=page_count).contains(p))
            else {
                tracing::debug!("Ignoring note click with no page");
                return Ok(None);
            };
            let Some(page_box) = surface.page_box(page) else {
                tracing::debug!("Ignoring note click on page {} with no layout", page);
                return Ok(None);
            };

            let position = match to_relative_point(pointer, &page_box) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!("Ignoring note click: {}", e);
                    return Ok(None);
                }
            };
            let on_page = |v: f64| (0.0..=PERCENT).contains(&v);
            if !on_page(position.x) || !on_page(position.y) {
                tracing::debug!("Ignoring note click off page {}", page);
                return Ok(None);
            }

            let text = if state.note_text.trim().is_empty() {
                DEFAULT_NOTE_TEXT.to_string()
            } else {
                state.note_text.clone()
            };

            (
                Ticket {
                    document_id,
                    session: state.session,
                },
                AnnotationDraft {
                    page,
                    body: AnnotationBody::Text { text, position },
                },
                state.note_text.clone(),
            )
        };

        let saved = self.annotations.create(&ticket.document_id, draft).await;

        let mut state = self.state();
        if !state.is_current(&ticket) {
            tracing::debug!("Discarding note saved for stale document {}", ticket.document_id);
            return Err(AppError::Cancelled(ticket.document_id));
        }

        match saved {
            Ok(annotation) => {
                state.store.append(annotation.clone());
                // Text typed while the save was in flight is kept
                if state.note_text == submitted_text {
                    state.note_text.clear();
                }
                state.set_mode(ViewerMode::Browsing);
                tracing::info!("Placed note {} on page {}", annotation.id, annotation.page);
                Ok(Some(annotation))
            }
            Err(e) => {
                tracing::error!("Failed to save note: {}", e);
                Err(persistence(e))
            }
        }
    }

    /// Save the tracked selection as a highlight.
    ///
    /// Returns `Ok(None)` when nothing is selected. On a failed save the
    /// selection stays tracked so the user can retry.
    pub async fn confirm_highlight<S: ViewerSurface + ?Sized>(
        &self,
        surface: &mut S,
    ) -> Result<Option<Annotation>> {
        let (ticket, tracked) = {
            let mut state = self.state();
            let (document_id, page_count) = match state.open_view() {
                Ok((id, pages, _, _)) => (id.to_string(), pages),
                Err(_) => return Ok(None),
            };
            let Some(tracked) = state.selection.active().cloned() else {
                return Ok(None);
            };
            if tracked.page_number == 0 || tracked.page_number > page_count {
                tracing::debug!("Dropping selection on page {}", tracked.page_number);
                state.selection.clear();
                return Ok(None);
            }
            (
                Ticket {
                    document_id,
                    session: state.session,
                },
                tracked,
            )
        };

        let draft = highlight_draft(&tracked);
        let saved = self.annotations.create(&ticket.document_id, draft).await;

        let mut state = self.state();
        if !state.is_current(&ticket) {
            tracing::debug!(
                "Discarding highlight saved for stale document {}",
                ticket.document_id
            );
            return Err(AppError::Cancelled(ticket.document_id));
        }

        match saved {
            Ok(annotation) => {
                state.store.append(annotation.clone());
                // A newer selection made while saving is left alone
                if state.selection.active() == Some(&tracked) {
                    state.selection.clear();
                    surface.clear_native_selection();
                }
                tracing::info!(
                    "Saved highlight {} on page {}",
                    annotation.id,
                    annotation.page
                );
                Ok(Some(annotation))
            }
            Err(e) => {
                tracing::error!("Failed to save highlight: {}", e);
                Err(persistence(e))
            }
        }
    }

    // ===== Rendering =====

    /// Overlays for every page of the open document at the surface's
    /// current page boxes
    pub fn render_overlays<S: ViewerSurface + ?Sized>(&self, surface: &S) -> Vec<PageOverlay> {
        let state = self.state();
        let Ok((document_id, page_count, _, _)) = state.open_view() else {
            return Vec::new();
        };

        (1..=page_count)
            .filter_map(|page| {
                let page_box = surface.page_box(page)?;
                let mut overlay = PageOverlay {
                    page,
                    page_box,
                    notes: Vec::new(),
                    highlights: Vec::new(),
                };

                for annotation in state
                    .store
                    .for_document(document_id)
                    .filter(|a| a.page == page)
                {
                    match &annotation.body {
                        AnnotationBody::Text { text, position } => {
                            if let Ok(at) = to_absolute_point(position, &page_box) {
                                overlay.notes.push(NoteOverlay {
                                    annotation_id: annotation.id.clone(),
                                    text: text.clone(),
                                    at,
                                });
                            }
                        }
                        AnnotationBody::Highlight { rects, .. } => {
                            match rects
                                .iter()
                                .map(|r| to_absolute_rect(r, &page_box))
                                .collect::<Result<Vec<_>>>()
                            {
                                Ok(rects) => overlay.highlights.push(HighlightOverlay {
                                    annotation_id: annotation.id.clone(),
                                    rects,
                                }),
                                Err(e) => tracing::debug!(
                                    "Skipping highlight {}: {}",
                                    annotation.id,
                                    e
                                ),
                            }
                        }
                    }
                }

                Some(overlay)
            })
            .collect()
    }

    // ===== Inspection =====

    pub fn phase(&self) -> ViewerPhase {
        self.state().phase.clone()
    }

    pub fn open_document_id(&self) -> Option<String> {
        self.state().current_document_id().map(str::to_string)
    }

    pub fn scale(&self) -> Option<f64> {
        self.state().open_view().ok().map(|v| v.2)
    }

    pub fn mode(&self) -> Option<ViewerMode> {
        self.state().open_view().ok().map(|v| v.3)
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.state().store.iter().cloned().collect()
    }

    pub fn annotations_on_page(&self, page: u32) -> Vec<Annotation> {
        self.state().store.by_page(page).cloned().collect()
    }

    pub fn active_selection(&self) -> Option<TrackedSelection> {
        self.state().selection.active().cloned()
    }

    pub fn note_text(&self) -> String {
        self.state().note_text.clone()
    }
}

fn highlight_draft(tracked: &TrackedSelection) -> AnnotationDraft {
    let text = Some(tracked.raw_text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    AnnotationDraft {
        page: tracked.page_number,
        body: AnnotationBody::Highlight {
            rects: tracked.rects.clone(),
            text,
        },
    }
}
