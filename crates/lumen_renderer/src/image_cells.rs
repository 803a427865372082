//! Adaptive quadtree over a rectangular image region.
//!
//! Cells live in an arena (`Vec<Cell>`) and refer to each other by index,
//! which gives O(1) parent navigation without reference cycles. The arena is
//! append-only between `clear()` calls, so a `CellId` stays valid until the
//! tree is reset.

use lumen_core::Color;
use lumen_math::{Rectangle, Vec2};

use crate::raster::{color_to_rgba, RasterBuffer};

/// Handle of a cell inside one `ImageCells` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One quadtree node.
///
/// A leaf carries one color sample. A split cell has exactly four children
/// covering its quadrants counter-clockwise from bottom-left; its own color
/// is only the coarse sample taken before splitting and is not displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: CellId,
    parent: Option<CellId>,
    children: Option<[CellId; 4]>,
    rect: Rectangle,
    pub color: Color,
    /// Distance from the camera to the sampled surface, infinite on a miss
    pub depth: f32,
}

impl Cell {
    fn new(id: CellId, parent: Option<CellId>, rect: Rectangle) -> Self {
        Self {
            id,
            parent,
            children: None,
            rect,
            color: Color::ZERO,
            depth: f32::INFINITY,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    pub fn children(&self) -> Option<&[CellId; 4]> {
        self.children.as_ref()
    }

    pub fn rect(&self) -> &Rectangle {
        &self.rect
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Sample position: the center of the cell.
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    fn covers_at_most_one_pixel(&self) -> bool {
        self.rect.width() <= 1.0 && self.rect.height() <= 1.0
    }
}

/// A tile's rendered result at variable resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageCells {
    cells: Vec<Cell>,
}

impl ImageCells {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree holding a single root leaf over `rect`.
    pub fn with_coverage(rect: Rectangle) -> Self {
        let mut cells = Self::new();
        cells.set_coverage_rect(rect);
        cells
    }

    /// Node count of a tree fully expanded to `level` (the root is level 0):
    /// `(4^(level+1) - 1) / 3`. Saturates at `usize::MAX`.
    pub fn node_count_at_depth(level: u32) -> usize {
        4usize
            .checked_pow(level.saturating_add(1))
            .map(|n| (n - 1) / 3)
            .unwrap_or(usize::MAX)
    }

    /// Drop every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Reset to a single root leaf over `(x, y, width, height)`.
    pub fn set_coverage(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.set_coverage_rect(Rectangle::new(x, y, width, height));
    }

    pub fn set_coverage_rect(&mut self, rect: Rectangle) {
        self.clear();
        self.cells.push(Cell::new(CellId(0), None, rect));
    }

    /// Reserve room for `additional` more cells.
    pub fn reserve(&mut self, additional: usize) {
        self.cells.reserve(additional);
    }

    /// Root rectangle, or `Rectangle::INVALID` for an empty tree.
    pub fn coverage(&self) -> Rectangle {
        self.cells
            .first()
            .map(|root| root.rect)
            .unwrap_or(Rectangle::INVALID)
    }

    pub fn root(&self) -> Option<CellId> {
        self.cells.first().map(|root| root.id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.index()]
    }

    /// Split `id` into four quadrant children and return them.
    ///
    /// Idempotent: splitting a cell that already has children returns the
    /// existing children unchanged. New children start with the parent's
    /// sample as their color and depth.
    pub fn split(&mut self, id: CellId) -> [CellId; 4] {
        let parent = &self.cells[id.index()];
        if let Some(children) = parent.children {
            return children;
        }

        let quadrants = parent.rect.quadrants();
        let (color, depth) = (parent.color, parent.depth);
        let first = self.cells.len() as u32;
        let children = [
            CellId(first),
            CellId(first + 1),
            CellId(first + 2),
            CellId(first + 3),
        ];

        for (child, rect) in children.iter().zip(quadrants) {
            let mut cell = Cell::new(*child, Some(id), rect);
            cell.color = color;
            cell.depth = depth;
            self.cells.push(cell);
        }
        self.cells[id.index()].children = Some(children);
        children
    }

    /// Number of edges between `id` and the root.
    pub fn depth_of(&self, id: CellId) -> u32 {
        let mut depth = 0;
        let mut current = self.cell(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.cell(parent).parent;
        }
        depth
    }

    /// Split every leaf until all leaves are `levels` below the root.
    pub fn subdivide_uniform(&mut self, levels: u32) {
        let Some(root) = self.root() else {
            return;
        };
        let mut frontier = vec![root];
        for _ in 0..levels {
            frontier = frontier
                .into_iter()
                .flat_map(|id| self.split(id))
                .collect();
        }
    }

    /// Leaves in traversal order: depth first, children 0 to 3.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            cells: self,
            stack: self.root().into_iter().collect(),
        }
    }

    /// Displayed color of a cell: its sample for a leaf, the mean of its
    /// children's displayed colors for a split cell.
    pub fn resolved_color(&self, id: CellId) -> Color {
        let cell = self.cell(id);
        match cell.children {
            None => cell.color,
            Some(children) => {
                children
                    .iter()
                    .map(|&child| self.resolved_color(child))
                    .sum::<Color>()
                    / 4.0
            }
        }
    }

    /// Box-fill one cell into `raster` with its resolved color.
    pub fn fill_pixel(&self, id: CellId, raster: &mut RasterBuffer, gamma_correct: bool) -> usize {
        let color = color_to_rgba(self.resolved_color(id), gamma_correct);
        raster.fill_rect(self.cell(id).rect(), color)
    }

    /// Rasterize the tree.
    ///
    /// Every leaf fills the pixels whose centers fall inside its rectangle.
    /// Cells no larger than a pixel are filled with their averaged color
    /// instead of being descended into. Pixels on a shared boundary take the
    /// color of the cell visited last.
    pub fn fill_pixels(&self, raster: &mut RasterBuffer, gamma_correct: bool) -> usize {
        let Some(root) = self.root() else {
            return 0;
        };

        let mut written = 0;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let cell = self.cell(id);
            match cell.children {
                Some(children) if !cell.covers_at_most_one_pixel() => {
                    // Reversed so child 0 is visited first
                    stack.extend(children.iter().rev());
                }
                _ => written += self.fill_pixel(id, raster, gamma_correct),
            }
        }
        written
    }
}

/// Iterator over the leaves of an `ImageCells` tree.
pub struct Leaves<'a> {
    cells: &'a ImageCells,
    stack: Vec<CellId>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Cell;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let cell = self.cells.cell(id);
            match cell.children {
                Some(children) => self.stack.extend(children.iter().rev()),
                None => return Some(cell),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Rgba8;
    use lumen_math::Vec3;

    #[test]
    fn test_node_count_closed_form() {
        assert_eq!(ImageCells::node_count_at_depth(0), 1);
        assert_eq!(ImageCells::node_count_at_depth(1), 5);
        assert_eq!(ImageCells::node_count_at_depth(2), 21);
        assert_eq!(ImageCells::node_count_at_depth(3), 85);

        for level in 1..12 {
            assert_eq!(
                ImageCells::node_count_at_depth(level),
                1 + 4 * ImageCells::node_count_at_depth(level - 1)
            );
        }
        assert_eq!(ImageCells::node_count_at_depth(64), usize::MAX);
    }

    #[test]
    fn test_uniform_subdivision_matches_closed_form() {
        for level in 0..5 {
            let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 16.0, 16.0));
            cells.subdivide_uniform(level);
            assert_eq!(cells.len(), ImageCells::node_count_at_depth(level));
            assert_eq!(cells.leaves().count(), 4usize.pow(level));
        }
    }

    #[test]
    fn test_set_coverage_resets_tree() {
        let mut cells = ImageCells::new();
        assert!(cells.is_empty());
        assert!(!cells.coverage().is_valid());

        cells.set_coverage(0.0, 0.0, 8.0, 8.0);
        cells.subdivide_uniform(2);
        cells.set_coverage(8.0, 0.0, 4.0, 4.0);

        assert_eq!(cells.len(), 1);
        assert_eq!(cells.coverage(), Rectangle::new(8.0, 0.0, 4.0, 4.0));
        assert!(cells.cell(cells.root().unwrap()).is_leaf());
    }

    #[test]
    fn test_split_is_idempotent_and_partitions_parent() {
        let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 4.0, 2.0));
        let root = cells.root().unwrap();

        let children = cells.split(root);
        assert_eq!(cells.split(root), children);
        assert_eq!(cells.len(), 5);

        let rects: Vec<Rectangle> = children.iter().map(|&c| *cells.cell(c).rect()).collect();
        assert_eq!(rects[0], Rectangle::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(rects[1], Rectangle::new(2.0, 0.0, 2.0, 1.0));
        assert_eq!(rects[2], Rectangle::new(2.0, 1.0, 2.0, 1.0));
        assert_eq!(rects[3], Rectangle::new(0.0, 1.0, 2.0, 1.0));

        let union = rects.iter().fold(Rectangle::INVALID, |acc, r| acc.union(r));
        assert_eq!(union, *cells.cell(root).rect());
        let area: f32 = rects.iter().map(|r| r.area()).sum();
        assert_eq!(area, cells.cell(root).rect().area());

        for &child in &children {
            assert_eq!(cells.cell(child).parent(), Some(root));
            assert_eq!(cells.depth_of(child), 1);
        }
    }

    #[test]
    fn test_resolved_color_averages_children() {
        let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 1.0, 1.0));
        let root = cells.root().unwrap();
        let children = cells.split(root);
        cells.cell_mut(children[0]).color = Vec3::new(1.0, 0.0, 0.0);
        cells.cell_mut(children[1]).color = Vec3::new(1.0, 0.0, 0.0);
        cells.cell_mut(children[2]).color = Vec3::ZERO;
        cells.cell_mut(children[3]).color = Vec3::ZERO;

        assert_eq!(cells.resolved_color(root), Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_fill_pixels_box_fills_leaves() {
        let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 4.0, 4.0));
        let root = cells.root().unwrap();
        let children = cells.split(root);
        let colors = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE];
        for (child, color) in children.iter().zip(colors) {
            cells.cell_mut(*child).color = color;
        }

        let mut raster = RasterBuffer::new(4, 4);
        assert_eq!(cells.fill_pixels(&mut raster, false), 16);

        let red = Rgba8::new(255, 0, 0, 255);
        let green = Rgba8::new(0, 255, 0, 255);
        let blue = Rgba8::new(0, 0, 255, 255);
        let white = Rgba8::new(255, 255, 255, 255);
        assert_eq!(raster.get(0, 0), Some(red));
        assert_eq!(raster.get(1, 1), Some(red));
        assert_eq!(raster.get(3, 0), Some(green));
        assert_eq!(raster.get(3, 3), Some(blue));
        assert_eq!(raster.get(0, 3), Some(white));
    }

    #[test]
    fn test_sub_pixel_cells_are_averaged() {
        let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 1.0, 1.0));
        let children = cells.split(cells.root().unwrap());
        cells.cell_mut(children[0]).color = Vec3::ONE;
        cells.cell_mut(children[2]).color = Vec3::ONE;
        cells.cell_mut(children[1]).color = Vec3::ZERO;
        cells.cell_mut(children[3]).color = Vec3::ZERO;

        let mut raster = RasterBuffer::new(1, 1);
        assert_eq!(cells.fill_pixels(&mut raster, false), 1);
        assert_eq!(raster.get(0, 0), Some(Rgba8::new(128, 128, 128, 255)));
    }

    #[test]
    fn test_leaves_traversal_order() {
        let mut cells = ImageCells::with_coverage(Rectangle::new(0.0, 0.0, 4.0, 4.0));
        let children = cells.split(cells.root().unwrap());
        let grandchildren = cells.split(children[1]);

        let order: Vec<CellId> = cells.leaves().map(|c| c.id()).collect();
        let mut expected = vec![children[0]];
        expected.extend(grandchildren);
        expected.extend([children[2], children[3]]);
        assert_eq!(order, expected);
    }
}
