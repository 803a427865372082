//! Lumen renderer - progressive, adaptively sampled ray tracing on the CPU.
//!
//! The viewport is split into tiles that worker threads render into
//! adaptive quadtrees (`ImageCells`) with a Whitted integrator. The
//! `RayTracer` merges finished tiles into an RGBA raster and refines the
//! level of detail pass by pass, so a coarse image is available at once.

mod config;
mod dispatcher;
mod image_cells;
mod integrator;
mod messages;
mod queue;
mod raster;
mod raytracer;
mod refinement;
mod tile;

pub use config::{ConfigError, RefinementThreshold, RenderConfig};
pub use dispatcher::Dispatcher;
pub use image_cells::{Cell, CellId, ImageCells, Leaves};
pub use integrator::{Integrator, Sample, SimpleIntegrator};
pub use messages::{RaytraceReply, RaytraceRequest, SenderId};
pub use queue::{DispatchError, MessageQueue, QueueSender};
pub use raster::{color_to_rgba, linear_to_gamma, RasterBuffer, Rgba8};
pub use raytracer::{PassStats, RayTracer};
pub use refinement::{finer_lod, Command, Event, PassProgress, RefinementPolicy, RenderState};
pub use tile::{generate_tiles, render_blocking, render_tile, RenderContext, Tile, TileSettings};

/// Re-export the math and scene types the public API is built on
pub use lumen_core::{Color, Scene};
pub use lumen_math::{Camera, Rectangle, Vec3};
