//! Coordinate mapping between viewport space and document space.
//!
//! The authoring viewport puts its origin at the top-left with y growing
//! downward; PDF pages put theirs at the bottom-left with y growing upward.
//! Both share the horizontal axis. Point-shaped anchors (text, path origins)
//! flip y directly; box-shaped anchors (rects, images) additionally shift by
//! the box height because document-space boxes are anchored at their own
//! bottom-left corner while viewport boxes are anchored at their top-left.

/// A 2D point. Which space it lives in depends on context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Map a viewport-space point anchor to document space.
///
/// # Examples
///
/// ```
/// use pdf_overlay::geometry::{page_point, Point};
///
/// let mapped = page_point(792.0, Point::new(50.0, 100.0));
/// assert_eq!(mapped, Point::new(50.0, 692.0));
/// ```
pub fn page_point(page_height: f32, at: Point) -> Point {
    Point {
        x: at.x,
        y: page_height - at.y,
    }
}

/// Map a viewport-space box (top-left anchor plus size) to its document-space
/// bottom-left anchor.
///
/// # Examples
///
/// ```
/// use pdf_overlay::geometry::{page_box, Point};
///
/// let mapped = page_box(792.0, Point::new(10.0, 10.0), 50.0, 20.0);
/// assert_eq!(mapped, Point::new(10.0, 762.0));
/// ```
pub fn page_box(page_height: f32, top_left: Point, _width: f32, height: f32) -> Point {
    Point {
        x: top_left.x,
        y: page_height - top_left.y - height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_anchor_flips_y() {
        assert_eq!(page_point(792.0, Point::new(50.0, 100.0)), Point::new(50.0, 692.0));
    }

    #[test]
    fn test_point_anchor_keeps_x() {
        let mapped = page_point(500.0, Point::new(123.5, 0.0));
        assert_eq!(mapped.x, 123.5);
        assert_eq!(mapped.y, 500.0);
    }

    #[test]
    fn test_box_anchor_shifts_by_height() {
        let mapped = page_box(792.0, Point::new(10.0, 10.0), 50.0, 20.0);
        assert_eq!(mapped, Point::new(10.0, 762.0));
    }

    #[test]
    fn test_box_of_zero_height_matches_point_mapping() {
        let top_left = Point::new(30.0, 40.0);
        assert_eq!(page_box(600.0, top_left, 10.0, 0.0), page_point(600.0, top_left));
    }

    #[test]
    fn test_fractional_coordinates() {
        let mapped = page_point(841.89, Point::new(0.25, 0.5));
        assert!((mapped.y - 841.39).abs() < 1e-4);
    }

    #[test]
    fn test_mapping_is_involutive() {
        // Flipping twice returns to the original point.
        let original = Point::new(72.0, 144.0);
        let there = page_point(792.0, original);
        let back = page_point(792.0, there);
        assert_eq!(back, original);
    }
}
