//! Viewer surface
//!
//! The scrollable container hosting every rendered page. The engine talks
//! to it through [`ViewerSurface`], which answers the questions a UI
//! toolkit's element tree would: is this node inside the viewer, which
//! page is it on, where is that page right now.
//!
//! [`PageLayout`] is the in-process implementation: pages stacked
//! vertically at the current scale plus a small node tree whose page
//! elements carry their page number.

use super::geometry::{Point, Rect};
use std::collections::HashMap;

/// Opaque handle to an element of the viewer's element tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

pub trait ViewerSurface {
    /// Whether `node` lies within the viewer surface subtree
    fn contains(&self, node: NodeId) -> bool;

    /// Page number of the nearest ancestor tagged with one
    fn page_of(&self, node: NodeId) -> Option<u32>;

    /// Current on-screen box of a page (1-indexed)
    fn page_box(&self, page: u32) -> Option<Rect>;

    /// Number of pages currently laid out
    fn page_count(&self) -> u32;

    /// On-screen box of the surface itself
    fn surface_box(&self) -> Rect;

    /// How far the surface content is scrolled
    fn scroll_offset(&self) -> Point;

    /// Drop the environment's native text selection
    fn clear_native_selection(&mut self);
}

/// Size of a page in PDF points at scale 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    page: Option<u32>,
}

/// Pages stacked top to bottom inside the surface, centered horizontally
#[derive(Debug, Clone)]
pub struct PageLayout {
    surface: Rect,
    scroll: Point,
    gap: f64,
    sizes: Vec<PageSize>,
    pages: Vec<Rect>,
    nodes: HashMap<NodeId, Node>,
    page_nodes: Vec<NodeId>,
    root: NodeId,
    next_id: u64,
    native_selection: bool,
}

impl PageLayout {
    /// Lay out `sizes` at `scale` inside `surface` with `gap` pixels between pages
    pub fn new(surface: Rect, sizes: Vec<PageSize>, scale: f64, gap: f64) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node { parent: None, page: None });

        let mut layout = Self {
            surface,
            scroll: Point::default(),
            gap,
            sizes,
            pages: Vec::new(),
            nodes,
            page_nodes: Vec::new(),
            root,
            next_id: 1,
            native_selection: false,
        };

        for page in 1..=layout.sizes.len() as u32 {
            let node = layout.add_node(Some(root), Some(page));
            layout.page_nodes.push(node);
        }
        layout.set_scale(scale);
        layout
    }

    /// Same page size for every page
    pub fn uniform(surface: Rect, page_count: u32, size: PageSize, scale: f64, gap: f64) -> Self {
        Self::new(surface, vec![size; page_count as usize], scale, gap)
    }

    /// Recompute page boxes for a new scale; the node tree is unchanged
    pub fn set_scale(&mut self, scale: f64) {
        let mut top = self.surface.top + self.gap - self.scroll.y;
        self.pages = self
            .sizes
            .iter()
            .map(|size| {
                let width = size.width * scale;
                let height = size.height * scale;
                let left =
                    self.surface.left + (self.surface.width - width).max(0.0) / 2.0 - self.scroll.x;
                let rect = Rect::new(left, top, width, height);
                top += height + self.gap;
                rect
            })
            .collect();
    }

    /// Scroll the content; page boxes move the opposite way
    pub fn scroll_to(&mut self, offset: Point) {
        let dx = offset.x - self.scroll.x;
        let dy = offset.y - self.scroll.y;
        for page in &mut self.pages {
            page.left -= dx;
            page.top -= dy;
        }
        self.scroll = offset;
    }

    /// Add an element below `parent` (None for an element outside the viewer)
    pub fn add_node(&mut self, parent: Option<NodeId>, page: Option<u32>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { parent, page });
        id
    }

    /// Root element of the viewer surface
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Page element for page `page` (1-indexed)
    pub fn page_node(&self, page: u32) -> Option<NodeId> {
        let index = usize::try_from(page.checked_sub(1)?).ok()?;
        self.page_nodes.get(index).copied()
    }

    pub fn set_native_selection(&mut self, active: bool) {
        self.native_selection = active;
    }

    pub fn has_native_selection(&self) -> bool {
        self.native_selection
    }

    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        let mut current = Some(node);
        std::iter::from_fn(move || {
            let id = current?;
            let entry = self.nodes.get(&id)?;
            current = entry.parent;
            Some((id, entry))
        })
    }
}

impl ViewerSurface for PageLayout {
    fn contains(&self, node: NodeId) -> bool {
        self.ancestors(node).any(|(id, _)| id == self.root)
    }

    fn page_of(&self, node: NodeId) -> Option<u32> {
        self.ancestors(node).find_map(|(_, entry)| entry.page)
    }

    fn page_box(&self, page: u32) -> Option<Rect> {
        let index = usize::try_from(page.checked_sub(1)?).ok()?;
        self.pages.get(index).copied()
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn surface_box(&self) -> Rect {
        self.surface
    }

    fn scroll_offset(&self) -> Point {
        self.scroll
    }

    fn clear_native_selection(&mut self) {
        self.native_selection = false;
    }
}
