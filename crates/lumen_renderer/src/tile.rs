//! Tile-based adaptive rendering.
//!
//! The viewport is cut into square tiles of `lod` pixels. Each tile is
//! rendered into its own `ImageCells` quadtree, which is refined only where
//! neighbouring samples disagree, so flat regions cost a handful of rays
//! while edges get resolved down to (and below) single pixels.

use std::sync::Arc;

use lumen_core::Scene;
use lumen_math::Rectangle;
use rayon::prelude::*;

use crate::config::{RefinementThreshold, RenderConfig};
use crate::image_cells::{CellId, ImageCells};
use crate::integrator::{Integrator, Sample};
use crate::raster::RasterBuffer;

/// Upper bound on cells reserved up front for one tile.
const MAX_RESERVED_CELLS: usize = 1 << 16;

/// A rectangular region of the viewport, in pixels from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's bottom-left corner
    pub x: u32,
    /// Y coordinate of the tile's bottom-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position of this tile in dispatch order
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// The tile as a rectangle in raster space.
    pub fn coverage(&self) -> Rectangle {
        Rectangle::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// Cut a `width` x `height` viewport into tiles of `tile_size` pixels,
/// ordered in a spiral from the centre outward.
///
/// Edge tiles are clipped to the viewport. A zero `tile_size` is treated
/// as 1.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(Tile::new(x, y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, width, height);

    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }
    tiles
}

/// Sort tiles by distance from the viewport centre.
fn sort_spiral(tiles: &mut [Tile], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |tile: &Tile| {
        let x = tile.x as f32 + tile.width as f32 / 2.0;
        let y = tile.y as f32 + tile.height as f32 / 2.0;
        (x - center_x).powi(2) + (y - center_y).powi(2)
    };

    // Stable sort keeps row-major order among equidistant tiles
    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Per-pass settings a worker needs to render a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSettings {
    /// Mirror bounces handed to the integrator
    pub max_bounces: u32,
    pub refinement: RefinementThreshold,
    /// Quadtree levels allowed below one pixel
    pub supersample_levels: u32,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for TileSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            max_bounces: config.max_bounces,
            refinement: config.refinement,
            supersample_levels: config.supersample_levels,
        }
    }
}

impl TileSettings {
    /// Deepest quadtree level for a tile spanning `extent` pixels on its
    /// longer side: enough halvings to get cells no larger than a pixel,
    /// plus the supersample levels.
    pub fn max_depth(&self, extent: u32) -> u32 {
        let halvings = u32::BITS - (extent.max(1) - 1).leading_zeros();
        halvings + self.supersample_levels
    }
}

/// Everything a tile render reads: an immutable scene snapshot and the
/// integrator to shade it with.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub scene: Arc<Scene>,
    pub integrator: Arc<dyn Integrator>,
    pub settings: TileSettings,
}

impl RenderContext {
    pub fn new(scene: Arc<Scene>, integrator: Arc<dyn Integrator>, settings: TileSettings) -> Self {
        Self {
            scene,
            integrator,
            settings,
        }
    }

    /// Trace the primary ray through the centre of `id` and store the result.
    fn sample_cell(&self, cells: &mut ImageCells, id: CellId) -> Sample {
        let camera = self.scene.camera();
        let ray = camera.primary_ray(cells.cell(id).center());
        let sample = self
            .integrator
            .sample(&ray, &self.scene, camera, self.settings.max_bounces);

        let cell = cells.cell_mut(id);
        cell.color = sample.color;
        cell.depth = sample.depth;
        sample
    }

    fn split_and_sample(&self, cells: &mut ImageCells, id: CellId) -> [Sample; 4] {
        cells
            .split(id)
            .map(|child| self.sample_cell(cells, child))
    }
}

/// Relative difference of two hit distances; a hit next to a miss is
/// infinitely contrasted, two misses are not contrasted at all.
fn depth_contrast(a: f32, b: f32) -> f32 {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => {
            let largest = a.abs().max(b.abs());
            if largest > 0.0 {
                (a - b).abs() / largest
            } else {
                0.0
            }
        }
        (false, false) => 0.0,
        _ => f32::INFINITY,
    }
}

/// Whether any two of four sibling samples differ by more than `threshold`.
fn exceeds_contrast(samples: &[Sample; 4], threshold: &RefinementThreshold) -> bool {
    for (i, a) in samples.iter().enumerate() {
        for b in &samples[i + 1..] {
            let color = (a.color - b.color).abs().max_element();
            if color > threshold.color || depth_contrast(a.depth, b.depth) > threshold.depth {
                return true;
            }
        }
    }
    false
}

/// Render one tile covering `coverage`.
///
/// The root is sampled and always split once. Afterwards each family of
/// four siblings is compared; when they disagree, every sibling is split
/// and its children sampled, until `TileSettings::max_depth` of the tile's
/// longer side is reached. Clipped edge tiles get shallower trees.
pub fn render_tile(context: &RenderContext, coverage: Rectangle) -> ImageCells {
    let extent = coverage.width().max(coverage.height()).ceil() as u32;
    let max_depth = context.settings.max_depth(extent);
    let mut cells = ImageCells::with_coverage(coverage);
    cells.reserve(ImageCells::node_count_at_depth(max_depth).min(MAX_RESERVED_CELLS));

    let Some(root) = cells.root() else {
        return cells;
    };
    context.sample_cell(&mut cells, root);
    if max_depth == 0 {
        return cells;
    }

    let samples = context.split_and_sample(&mut cells, root);
    let mut pending = vec![(root, 1, samples)];

    while let Some((parent, depth, samples)) = pending.pop() {
        if depth >= max_depth || !exceeds_contrast(&samples, &context.settings.refinement) {
            continue;
        }
        let Some(&children) = cells.cell(parent).children() else {
            continue;
        };
        for child in children {
            let samples = context.split_and_sample(&mut cells, child);
            pending.push((child, depth + 1, samples));
        }
    }

    cells
}

/// Render the whole viewport at `lod` on the rayon pool and return the
/// merged raster. Used for one-shot renders.
pub fn render_blocking(context: &RenderContext, lod: u32, gamma_correct: bool) -> RasterBuffer {
    let camera = context.scene.camera();
    let (width, height) = (camera.width(), camera.height());
    let lod = lod.max(1);

    let tiles = generate_tiles(width, height, lod);
    let trees: Vec<ImageCells> = tiles
        .par_iter()
        .map(|tile| render_tile(context, tile.coverage()))
        .collect();

    let mut raster = RasterBuffer::new(width, height);
    for cells in &trees {
        cells.fill_pixels(&mut raster, gamma_correct);
    }
    log::debug!(
        "Rendered {}x{} at LOD {} in {} tiles",
        width,
        height,
        lod,
        tiles.len()
    );
    raster
}
