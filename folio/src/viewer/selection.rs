//! Selection tracker
//!
//! Turns the text selection present at pointer release into the page it
//! belongs to, one normalized rect per visual line fragment, and an
//! anchor for the highlight popover.

use super::geometry::{to_relative_rect, Point, Rect, RelativeRect};
use super::surface::{NodeId, ViewerSurface};
use crate::config::POPOVER_OFFSET_PX;
use crate::error::{AppError, Result};

/// Text selection as read from the environment at pointer release
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    pub collapsed: bool,
    pub text: String,
    /// Deepest element containing the whole selection
    pub common_ancestor: NodeId,
    /// One rect per visual line fragment, in viewport pixels
    pub client_rects: Vec<Rect>,
}

/// Selection the user may turn into a highlight
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSelection {
    pub page_number: u32,
    pub rects: Vec<RelativeRect>,
    /// Popover position in surface-local coordinates
    pub popover_anchor: Point,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    NoSelection,
    Tracked(TrackedSelection),
}

#[derive(Debug, Default)]
pub struct SelectionTracker {
    active: Option<TrackedSelection>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&TrackedSelection> {
        self.active.as_ref()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Process a pointer release.
    ///
    /// Any failure clears the tracked state before returning.
    pub fn on_pointer_release<S: ViewerSurface + ?Sized>(
        &mut self,
        surface: &S,
        snapshot: Option<&SelectionSnapshot>,
    ) -> Result<SelectionOutcome> {
        self.active = None;

        let snapshot = match snapshot {
            Some(s) if !s.collapsed => s,
            _ => return Ok(SelectionOutcome::NoSelection),
        };

        // Selections in dialogs and other chrome must not leak into the viewer
        if !surface.contains(snapshot.common_ancestor) {
            return Ok(SelectionOutcome::NoSelection);
        }

        let (page_number, fragments) = resolve_page(surface, snapshot)?;
        if fragments.is_empty() {
            return Err(AppError::EmptyGeometry);
        }

        let page_box = surface.page_box(page_number).ok_or_else(|| {
            AppError::PageResolution(format!("page {} is not laid out", page_number))
        })?;

        let rects = fragments
            .iter()
            .map(|r| to_relative_rect(r, &page_box))
            .collect::<Result<Vec<_>>>()?;

        let bounds = Rect::union_all(&fragments).ok_or(AppError::EmptyGeometry)?;
        let popover_anchor = popover_anchor(surface, &bounds);

        let tracked = TrackedSelection {
            page_number,
            rects,
            popover_anchor,
            raw_text: snapshot.text.clone(),
        };
        self.active = Some(tracked.clone());

        Ok(SelectionOutcome::Tracked(tracked))
    }
}

/// Page tag first; otherwise the page overlapping most of the selection.
///
/// The fallback covers selections whose common ancestor is above the page
/// elements, e.g. one dragged across a page boundary. Fragments that do
/// not touch the chosen page are dropped in that case.
fn resolve_page<S: ViewerSurface + ?Sized>(
    surface: &S,
    snapshot: &SelectionSnapshot,
) -> Result<(u32, Vec<Rect>)> {
    if let Some(page) = surface.page_of(snapshot.common_ancestor) {
        return Ok((page, snapshot.client_rects.clone()));
    }
    if snapshot.client_rects.is_empty() {
        return Err(AppError::EmptyGeometry);
    }

    let best = (1..=surface.page_count())
        .filter_map(|page| {
            let page_box = surface.page_box(page)?;
            let area: f64 = snapshot
                .client_rects
                .iter()
                .map(|r| r.overlap_area(&page_box))
                .sum();
            (area > 0.0).then_some((page, page_box, area))
        })
        .fold(None, |best: Option<(u32, Rect, f64)>, candidate| match best {
            Some(b) if b.2 >= candidate.2 => Some(b),
            _ => Some(candidate),
        });

    let (page, page_box, _) = best.ok_or_else(|| {
        AppError::PageResolution("selection does not overlap any page".to_string())
    })?;

    let fragments = snapshot
        .client_rects
        .iter()
        .filter(|r| r.overlap_area(&page_box) > 0.0)
        .copied()
        .collect();

    Ok((page, fragments))
}

/// Centered above the selection, in surface-local scrolled coordinates
fn popover_anchor<S: ViewerSurface + ?Sized>(surface: &S, bounds: &Rect) -> Point {
    let container = surface.surface_box();
    let scroll = surface.scroll_offset();

    Point {
        x: bounds.left - container.left + scroll.x + bounds.width / 2.0,
        y: bounds.top - container.top + scroll.y - POPOVER_OFFSET_PX,
    }
}
