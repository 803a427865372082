//! Messages exchanged between the orchestrator and the tile workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lumen_math::Rectangle;

use crate::image_cells::ImageCells;
use crate::queue::QueueSender;
use crate::tile::{render_tile, RenderContext};

/// Opaque identity of a request producer, echoed back in its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(u64);

impl SenderId {
    /// A process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Request to render one tile.
#[derive(Debug, Clone)]
pub struct RaytraceRequest {
    /// Generation the request belongs to
    pub id: u64,
    pub sender: SenderId,
    pub coverage: Rectangle,
    /// Level of detail of the pass, in pixels
    pub tile_size: u32,
    pub context: Arc<RenderContext>,
    /// Queue the reply is posted to
    pub reply_to: QueueSender<RaytraceReply>,
    /// Generation the requester currently wants, updated on every new pass
    pub current_generation: Arc<AtomicU64>,
}

impl RaytraceRequest {
    /// Whether the requester has moved on to a newer pass.
    pub fn is_superseded(&self) -> bool {
        self.current_generation.load(Ordering::Acquire) != self.id
    }

    /// Render the tile. The request's correlation fields are copied into
    /// the reply.
    pub fn execute(&self) -> RaytraceReply {
        RaytraceReply {
            id: self.id,
            sender: self.sender,
            coverage: self.coverage,
            tile_size: self.tile_size,
            cells: render_tile(&self.context, self.coverage),
        }
    }
}

/// A rendered tile.
#[derive(Debug, Clone)]
pub struct RaytraceReply {
    pub id: u64,
    pub sender: SenderId,
    pub coverage: Rectangle,
    pub tile_size: u32,
    pub cells: ImageCells,
}

/// What the worker pool consumes.
pub(crate) enum WorkerMessage {
    Raytrace(RaytraceRequest),
    Shutdown,
}
