//! Render configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a `RenderConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contrast above which sibling quadtree cells are refined further.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementThreshold {
    /// Largest per-channel color difference tolerated between siblings
    pub color: f32,
    /// Largest relative depth difference tolerated between siblings
    pub depth: f32,
}

impl Default for RefinementThreshold {
    fn default() -> Self {
        Self {
            color: 0.1,
            depth: 0.1,
        }
    }
}

/// Render configuration.
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Worker threads; 0 picks `available_parallelism()`
    pub worker_threads: usize,
    /// Tile size in pixels of the first pass issued by `RayTracer::start`
    pub initial_lod: u32,
    /// Maximum mirror bounces per primary ray
    pub max_bounces: u32,
    pub refinement: RefinementThreshold,
    /// Quadtree levels allowed below one pixel (anti-aliasing)
    pub supersample_levels: u32,
    /// Offset of secondary rays along the surface normal
    pub shadow_epsilon: f32,
    /// Apply gamma 2.0 when quantizing to 8 bits
    pub gamma_correct: bool,
    /// Halve the LOD when a tick sees no replies for the current pass
    pub restart_stalled_passes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            initial_lod: 16,
            max_bounces: 3,
            refinement: RefinementThreshold::default(),
            supersample_levels: 1,
            shadow_epsilon: 1e-3,
            gamma_correct: false,
            restart_stalled_passes: true,
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Worker count with the `0 = all cores` rule applied.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
