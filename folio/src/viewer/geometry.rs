//! Geometry normalizer
//!
//! Stateless conversion between viewport pixels and page-relative
//! percentages. Stored annotation anchors are always relative, so an
//! annotation renders at the same spot on the page at any zoom level:
//! multiply the percentage by the page's current rendered size.

use crate::config::PERCENT;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Point in viewport pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in viewport pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    /// Area shared with another rectangle (0 when disjoint)
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Smallest rectangle covering every rect in `rects`
    pub fn union_all(rects: &[Rect]) -> Option<Rect> {
        let first = rects.first()?;
        let (mut left, mut top, mut right, mut bottom) =
            (first.left, first.top, first.right(), first.bottom());
        for r in &rects[1..] {
            left = left.min(r.left);
            top = top.min(r.top);
            right = right.max(r.right());
            bottom = bottom.max(r.bottom());
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Position as a percentage (0-100) of the page's width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: f64,
    pub y: f64,
}

impl RelativePoint {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Rectangle as percentages of the page's width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

fn check_page_box(page_box: &Rect) -> Result<()> {
    let usable = |v: f64| v.is_finite() && v != 0.0;
    if !usable(page_box.width) || !usable(page_box.height) {
        return Err(AppError::InvalidGeometry(format!(
            "page box is {}x{}",
            page_box.width, page_box.height
        )));
    }
    Ok(())
}

/// Convert a pointer position to page-relative percentages.
///
/// Positions outside the page are not clamped; callers reject them.
pub fn to_relative_point(pointer: Point, page_box: &Rect) -> Result<RelativePoint> {
    check_page_box(page_box)?;
    Ok(RelativePoint {
        x: (pointer.x - page_box.left) / page_box.width * PERCENT,
        y: (pointer.y - page_box.top) / page_box.height * PERCENT,
    })
}

/// Convert a pixel rectangle to page-relative percentages
pub fn to_relative_rect(rect: &Rect, page_box: &Rect) -> Result<RelativeRect> {
    check_page_box(page_box)?;
    Ok(RelativeRect {
        left: (rect.left - page_box.left) / page_box.width * PERCENT,
        top: (rect.top - page_box.top) / page_box.height * PERCENT,
        width: rect.width / page_box.width * PERCENT,
        height: rect.height / page_box.height * PERCENT,
    })
}

/// Inverse of [`to_relative_point`] for the page's current box
pub fn to_absolute_point(point: &RelativePoint, page_box: &Rect) -> Result<Point> {
    check_page_box(page_box)?;
    Ok(Point {
        x: page_box.left + point.x / PERCENT * page_box.width,
        y: page_box.top + point.y / PERCENT * page_box.height,
    })
}

/// Inverse of [`to_relative_rect`] for the page's current box
pub fn to_absolute_rect(rect: &RelativeRect, page_box: &Rect) -> Result<Rect> {
    check_page_box(page_box)?;
    Ok(Rect {
        left: page_box.left + rect.left / PERCENT * page_box.width,
        top: page_box.top + rect.top / PERCENT * page_box.height,
        width: rect.width / PERCENT * page_box.width,
        height: rect.height / PERCENT * page_box.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{} != {}", a, b);
    }

    #[test]
    fn test_relative_point_scenario() {
        let page = Rect::new(0.0, 0.0, 400.0, 600.0);
        let rel = to_relative_point(Point::new(45.0, 60.0), &page).unwrap();

        assert_close(rel.x, 11.25);
        assert_close(rel.y, 10.0);

        let zoomed = Rect::new(0.0, 0.0, 800.0, 1200.0);
        let abs = to_absolute_point(&rel, &zoomed).unwrap();
        assert_close(abs.x, 90.0);
        assert_close(abs.y, 120.0);
    }

    #[test]
    fn test_relative_point_respects_page_origin() {
        let page = Rect::new(100.0, 250.0, 200.0, 100.0);
        let rel = to_relative_point(Point::new(150.0, 275.0), &page).unwrap();

        assert_close(rel.x, 25.0);
        assert_close(rel.y, 25.0);
    }

    #[test]
    fn test_points_outside_page_are_not_clamped() {
        let page = Rect::new(0.0, 0.0, 100.0, 100.0);
        let rel = to_relative_point(Point::new(-10.0, 150.0), &page).unwrap();

        assert_close(rel.x, -10.0);
        assert_close(rel.y, 150.0);
    }

    #[test]
    fn test_rect_round_trip() {
        let boxes = [
            Rect::new(0.0, 0.0, 400.0, 600.0),
            Rect::new(37.5, 812.25, 612.0, 792.0),
            Rect::new(-20.0, -300.0, 1.5, 2.5),
        ];
        let rects = [
            Rect::new(10.0, 20.0, 30.0, 12.0),
            Rect::new(400.0, 900.0, 250.5, 14.25),
            Rect::new(-5.0, -1.0, 0.0, 0.0),
        ];

        for page in &boxes {
            for rect in &rects {
                let rel = to_relative_rect(rect, page).unwrap();
                let back = to_absolute_rect(&rel, page).unwrap();
                assert!((back.left - rect.left).abs() < 1e-6);
                assert!((back.top - rect.top).abs() < 1e-6);
                assert!((back.width - rect.width).abs() < 1e-6);
                assert!((back.height - rect.height).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_scale_invariance() {
        let stored = RelativeRect {
            left: 12.5,
            top: 40.0,
            width: 33.0,
            height: 2.5,
        };

        for scale in [0.5, 1.0, 1.75, 3.0] {
            let page = Rect::new(24.0, 16.0 * scale, 612.0 * scale, 792.0 * scale);
            let pixels = to_absolute_rect(&stored, &page).unwrap();
            let again = to_relative_rect(&pixels, &page).unwrap();

            assert_close(again.left, stored.left);
            assert_close(again.top, stored.top);
            assert_close(again.width, stored.width);
            assert_close(again.height, stored.height);
        }
    }

    #[test]
    fn test_zero_area_page_is_invalid() {
        let flat = Rect::new(0.0, 0.0, 400.0, 0.0);
        let narrow = Rect::new(0.0, 0.0, 0.0, 600.0);

        assert!(matches!(
            to_relative_point(Point::new(1.0, 1.0), &flat),
            Err(AppError::InvalidGeometry(_))
        ));
        assert!(matches!(
            to_relative_rect(&Rect::new(1.0, 1.0, 1.0, 1.0), &narrow),
            Err(AppError::InvalidGeometry(_))
        ));
        assert!(to_absolute_point(&RelativePoint { x: 1.0, y: 1.0 }, &flat).is_err());
    }

    #[test]
    fn test_overlap_and_union() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(20.0, 20.0, 1.0, 1.0);

        assert_close(a.overlap_area(&b), 25.0);
        assert_close(a.overlap_area(&c), 0.0);

        let u = Rect::union_all(&[a, b, c]).unwrap();
        assert_eq!(u, Rect::new(0.0, 0.0, 21.0, 21.0));
        assert!(Rect::union_all(&[]).is_none());
    }
}
