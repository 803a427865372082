use crate::Vec2;

/// Axis-aligned 2D region given by its bottom-left and top-right corners.
///
/// A rectangle whose top-right lies below or left of its bottom-left is
/// *invalid*. Invalid is an ordinary value (the result of intersecting two
/// disjoint rectangles, the coverage of an empty quadtree) rather than an
/// error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub bottom_left: Vec2,
    pub top_right: Vec2,
}

impl Rectangle {
    pub const INVALID: Rectangle = Rectangle {
        bottom_left: Vec2::splat(f32::INFINITY),
        top_right: Vec2::splat(f32::NEG_INFINITY),
    };

    /// Rectangle at `(x, y)` (bottom-left) with the given size.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            bottom_left: Vec2::new(x, y),
            top_right: Vec2::new(x + width, y + height),
        }
    }

    pub fn from_corners(bottom_left: Vec2, top_right: Vec2) -> Self {
        Self {
            bottom_left,
            top_right,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.top_right.x >= self.bottom_left.x && self.top_right.y >= self.bottom_left.y
    }

    pub fn width(&self) -> f32 {
        self.top_right.x - self.bottom_left.x
    }

    pub fn height(&self) -> f32 {
        self.top_right.y - self.bottom_left.y
    }

    /// Area, or zero for an invalid rectangle.
    pub fn area(&self) -> f32 {
        if self.is_valid() {
            self.width() * self.height()
        } else {
            0.0
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.bottom_left + self.top_right) * 0.5
    }

    /// Closed containment test: points on the boundary are inside.
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.bottom_left.x
            && p.x <= self.top_right.x
            && p.y >= self.bottom_left.y
            && p.y <= self.top_right.y
    }

    pub fn intersection(&self, other: &Rectangle) -> Rectangle {
        Rectangle::from_corners(
            self.bottom_left.max(other.bottom_left),
            self.top_right.min(other.top_right),
        )
    }

    /// Smallest rectangle containing both. Invalid inputs are ignored.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        match (self.is_valid(), other.is_valid()) {
            (false, _) => *other,
            (_, false) => *self,
            _ => Rectangle::from_corners(
                self.bottom_left.min(other.bottom_left),
                self.top_right.max(other.top_right),
            ),
        }
    }

    /// The four equal quadrants, counter-clockwise from bottom-left:
    /// bottom-left, bottom-right, top-right, top-left.
    pub fn quadrants(&self) -> [Rectangle; 4] {
        let bl = self.bottom_left;
        let tr = self.top_right;
        let c = self.center();
        [
            Rectangle::from_corners(bl, c),
            Rectangle::from_corners(Vec2::new(c.x, bl.y), Vec2::new(tr.x, c.y)),
            Rectangle::from_corners(c, tr),
            Rectangle::from_corners(Vec2::new(bl.x, c.y), Vec2::new(c.x, tr.y)),
        ]
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::INVALID
    }
}
