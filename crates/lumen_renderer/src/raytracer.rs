//! Progressive render orchestrator.
//!
//! `RayTracer` owns the final raster and runs on the caller's thread. Each
//! `render(lod)` stamps a new generation and posts one request per tile to
//! the worker pool; replies are merged as they are polled, and replies of
//! older generations are dropped. `tick()` drives the refinement policy so
//! that a caller polling on a timer sees a coarse image at once and a finer
//! one as passes converge.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lumen_core::Scene;
use lumen_math::Camera;

use crate::config::RenderConfig;
use crate::dispatcher::Dispatcher;
use crate::integrator::{Integrator, SimpleIntegrator};
use crate::messages::{RaytraceReply, RaytraceRequest, SenderId};
use crate::queue::{DispatchError, MessageQueue};
use crate::raster::RasterBuffer;
use crate::refinement::{Command, Event, PassProgress, RefinementPolicy, RenderState};
use crate::tile::{generate_tiles, RenderContext, TileSettings};

/// Counters for the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    pub generation: u64,
    pub lod: u32,
    /// Tiles posted
    pub expected: usize,
    /// Tiles merged into the raster
    pub merged: usize,
    /// Replies of older generations dropped while this pass was current
    pub stale_discarded: usize,
}

pub struct RayTracer {
    id: SenderId,
    config: RenderConfig,
    scene: Arc<Scene>,
    integrator: Arc<dyn Integrator>,
    dispatcher: Arc<Dispatcher>,
    replies: MessageQueue<RaytraceReply>,

    raster: RasterBuffer,
    generation: u64,
    /// `generation`, shared with queued requests so workers skip old passes
    live_generation: Arc<AtomicU64>,
    lod: u32,
    stats: PassStats,
    received_since_tick: usize,
    new_frame: bool,

    policy: RefinementPolicy,
    state: RenderState,
}

impl std::fmt::Debug for RayTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayTracer")
            .field("scene", &self.scene.name)
            .field("generation", &self.generation)
            .field("lod", &self.lod)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl RayTracer {
    /// Create a ray tracer with its own worker pool.
    pub fn new(scene: Scene, config: RenderConfig) -> Result<Self, DispatchError> {
        let dispatcher = Dispatcher::new(config.resolved_worker_threads())?;
        Ok(Self::with_dispatcher(
            Arc::new(scene),
            config,
            Arc::new(dispatcher),
        ))
    }

    /// Create a ray tracer that posts its tiles to a shared worker pool.
    pub fn with_dispatcher(
        scene: Arc<Scene>,
        config: RenderConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let camera = scene.camera();
        let raster = RasterBuffer::new(camera.width(), camera.height());
        let policy = RefinementPolicy {
            restart_stalled_passes: config.restart_stalled_passes,
        };
        let integrator = Arc::new(SimpleIntegrator::new(config.shadow_epsilon));

        Self {
            id: SenderId::next(),
            lod: config.initial_lod.max(1),
            config,
            scene,
            integrator,
            dispatcher,
            replies: MessageQueue::new(),
            raster,
            generation: 0,
            live_generation: Arc::new(AtomicU64::new(0)),
            stats: PassStats::default(),
            received_since_tick: 0,
            new_frame: false,
            policy,
            state: RenderState::Idle,
        }
    }

    /// Replace the integrator used by subsequent passes.
    pub fn with_integrator(mut self, integrator: impl Integrator + 'static) -> Self {
        self.integrator = Arc::new(integrator);
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to the scene.
    ///
    /// Tiles already in flight keep rendering the previous snapshot; the
    /// scene is cloned only if such tiles still exist. Call `render` to
    /// show the edit.
    pub fn scene_mut(&mut self) -> &mut Scene {
        Arc::make_mut(&mut self.scene)
    }

    pub fn camera(&self) -> &Camera {
        self.scene.camera()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn sender_id(&self) -> SenderId {
        self.id
    }

    /// Issue the first pass at the configured initial LOD.
    pub fn start(&mut self) -> u64 {
        self.render(self.config.initial_lod)
    }

    /// Issue a pass at `lod` pixels per tile and return its generation.
    ///
    /// Supersedes any pass still in flight. The raster keeps its contents
    /// until tiles of the new pass replace them, unless the viewport size
    /// changed.
    pub fn render(&mut self, lod: u32) -> u64 {
        let lod = lod.max(1);
        self.generation += 1;
        self.live_generation.store(self.generation, Ordering::Release);
        self.lod = lod;
        // Nothing of the new pass has been merged yet
        self.new_frame = false;

        let (width, height) = (self.camera().width(), self.camera().height());
        self.raster.resize(width, height);

        let context = Arc::new(RenderContext::new(
            Arc::clone(&self.scene),
            Arc::clone(&self.integrator),
            TileSettings::from(&self.config),
        ));

        let tiles = generate_tiles(width, height, lod);
        let mut posted = 0;
        for tile in &tiles {
            let request = RaytraceRequest {
                id: self.generation,
                sender: self.id,
                coverage: tile.coverage(),
                tile_size: lod,
                context: Arc::clone(&context),
                reply_to: self.replies.sender(),
                current_generation: Arc::clone(&self.live_generation),
            };
            if let Err(e) = self.dispatcher.post(request) {
                log::error!("Failed to post tile {}: {}", tile.index, e);
                break;
            }
            posted += 1;
        }

        self.stats = PassStats {
            generation: self.generation,
            lod,
            expected: posted,
            merged: 0,
            stale_discarded: 0,
        };
        self.received_since_tick = 0;

        let (state, _) = self.policy.transition(
            self.state,
            Event::RenderIssued {
                generation: self.generation,
                lod,
            },
        );
        self.state = state;

        log::info!(
            "Render pass {} at LOD {} ({} tiles, {}x{})",
            self.generation,
            lod,
            posted,
            width,
            height
        );
        self.generation
    }

    /// Resize the viewport and raster, then start over at the initial LOD.
    pub fn resize(&mut self, width: u32, height: u32) -> u64 {
        self.scene_mut().camera_mut().set_viewport(width, height);
        self.raster.resize(width, height);
        self.start()
    }

    /// Merge every reply that is ready without blocking. Returns how many
    /// were merged.
    pub fn poll(&mut self) -> usize {
        let replies = self.replies.drain();
        replies
            .iter()
            .filter(|reply| self.merge_image(reply))
            .count()
    }

    /// Box-fill `reply` into the raster if it belongs to the current pass.
    ///
    /// Replies from an older generation, or from another ray tracer, are
    /// discarded and `false` is returned.
    pub fn merge_image(&mut self, reply: &RaytraceReply) -> bool {
        if reply.sender != self.id || reply.id != self.generation {
            self.stats.stale_discarded += 1;
            log::trace!(
                "Discarding stale tile {:?} (gen {}, current {})",
                reply.coverage,
                reply.id,
                self.generation
            );
            return false;
        }

        reply
            .cells
            .fill_pixels(&mut self.raster, self.config.gamma_correct);
        self.stats.merged += 1;
        self.received_since_tick += 1;
        self.new_frame = true;
        true
    }

    /// Whether tiles of the current pass were merged since the image was
    /// last fetched. Merges whatever replies are ready first.
    pub fn has_new_frame_available(&mut self) -> bool {
        self.poll();
        self.new_frame
    }

    /// The merged raster. Clears the new-frame flag.
    pub fn image(&mut self) -> &RasterBuffer {
        self.new_frame = false;
        &self.raster
    }

    /// The merged raster, leaving the new-frame flag alone.
    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    pub fn level_of_detail(&self) -> u32 {
        self.lod
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Whether a per-pixel pass has been fully merged.
    pub fn is_converged(&self) -> bool {
        matches!(self.state, RenderState::Converged { lod: 1, .. })
    }

    /// Advance progressive refinement by one step.
    ///
    /// Merges ready replies, reports progress to the refinement policy and
    /// issues the pass it asks for. Meant to be called on a fixed timer.
    pub fn tick(&mut self) -> RenderState {
        self.poll();

        let progress = PassProgress {
            expected: self.stats.expected,
            merged: self.stats.merged,
            received_since_last_tick: mem::take(&mut self.received_since_tick),
        };
        let (state, command) = self.policy.transition(self.state, Event::Tick(progress));

        if state != self.state {
            if let RenderState::Converged { generation, lod } = state {
                log::debug!(
                    "Pass {} converged at LOD {} ({} stale replies dropped)",
                    generation,
                    lod,
                    self.stats.stale_discarded
                );
            }
        }
        self.state = state;

        if let Command::Render { lod } = command {
            self.render(lod);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_cells::ImageCells;
    use crate::integrator::Sample;
    use crate::raster::{color_to_rgba, Rgba8};
    use lumen_math::{Ray, Rectangle, Vec3};
    use std::thread;
    use std::time::{Duration, Instant};

    fn scene(width: u32, height: u32) -> Scene {
        let mut scene = Scene::new("test");
        scene.set_background(Vec3::new(0.0, 0.0, 1.0));
        scene.set_camera(Camera::new().with_viewport(width, height));
        scene
    }

    /// A ray tracer whose pool has no workers, so replies only come from
    /// the test itself.
    fn idle_tracer(width: u32, height: u32) -> RayTracer {
        let dispatcher = Arc::new(Dispatcher::new(0).unwrap());
        RayTracer::with_dispatcher(
            Arc::new(scene(width, height)),
            RenderConfig::default(),
            dispatcher,
        )
    }

    fn reply(tracer: &RayTracer, generation: u64, coverage: Rectangle, color: Vec3) -> RaytraceReply {
        let mut cells = ImageCells::with_coverage(coverage);
        if let Some(root) = cells.root() {
            cells.cell_mut(root).color = color;
        }
        RaytraceReply {
            id: generation,
            sender: tracer.sender_id(),
            coverage,
            tile_size: coverage.width() as u32,
            cells,
        }
    }

    #[test]
    fn test_render_posts_one_request_per_tile() {
        let mut tracer = idle_tracer(20, 10);
        let generation = tracer.render(8);

        let stats = tracer.stats();
        assert_eq!(stats.generation, generation);
        assert_eq!(stats.lod, 8);
        assert_eq!(stats.expected, 3 * 2);
        assert_eq!(tracer.level_of_detail(), 8);
        assert_eq!(tracer.state(), RenderState::Rendering { generation, lod: 8 });
    }

    #[test]
    fn test_generations_increase() {
        let mut tracer = idle_tracer(4, 4);
        let first = tracer.render(4);
        let second = tracer.render(2);
        assert!(second > first);
        assert_eq!(tracer.generation(), second);
    }

    #[test]
    fn test_superseded_replies_are_discarded() {
        let mut tracer = idle_tracer(16, 16);
        let coarse = tracer.render(8);
        let fine = tracer.render(1);

        let red = Vec3::new(1.0, 0.0, 0.0);
        let full = Rectangle::new(0.0, 0.0, 16.0, 16.0);
        for _ in 0..4 {
            assert!(!tracer.merge_image(&reply(&tracer, coarse, full, red)));
        }

        assert!(!tracer.has_new_frame_available());
        assert_eq!(tracer.stats().stale_discarded, 4);
        assert_eq!(tracer.stats().merged, 0);
        assert!(tracer.image().pixels().iter().all(|&p| p == Rgba8::BLACK));

        let pixel = Rectangle::new(3.0, 4.0, 1.0, 1.0);
        assert!(tracer.merge_image(&reply(&tracer, fine, pixel, red)));
        assert!(tracer.has_new_frame_available());
        assert_eq!(tracer.image().get(3, 4), Some(color_to_rgba(red, false)));
        assert!(!tracer.has_new_frame_available());
    }

    #[test]
    fn test_new_pass_clears_new_frame_flag() {
        let mut tracer = idle_tracer(4, 4);
        let generation = tracer.render(4);
        let full = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        assert!(tracer.merge_image(&reply(&tracer, generation, full, Vec3::ONE)));

        // The merged tile belongs to the pass being replaced
        tracer.render(2);
        assert_eq!(tracer.stats().merged, 0);
        assert!(!tracer.has_new_frame_available());
    }

    #[test]
    fn test_requests_see_when_their_pass_is_replaced() {
        let mut tracer = idle_tracer(4, 4);
        let first = tracer.render(4);
        assert_eq!(tracer.live_generation.load(Ordering::Acquire), first);

        let second = tracer.render(2);
        assert_eq!(tracer.live_generation.load(Ordering::Acquire), second);
    }

    #[test]
    fn test_replies_from_another_sender_are_discarded() {
        let mut tracer = idle_tracer(4, 4);
        let generation = tracer.render(4);
        let full = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let mut foreign = reply(&tracer, generation, full, Vec3::ONE);
        foreign.sender = SenderId::next();
        assert!(!tracer.merge_image(&foreign));
    }

    #[test]
    fn test_disjoint_tiles_do_not_bleed() {
        let mut tracer = idle_tracer(8, 4);
        let generation = tracer.render(4);

        let left = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let right = Rectangle::new(4.0, 0.0, 4.0, 4.0);
        let (red, green) = (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));

        // Merge order does not matter
        assert!(tracer.merge_image(&reply(&tracer, generation, right, green)));
        assert!(tracer.merge_image(&reply(&tracer, generation, left, red)));

        let image = tracer.image();
        for y in 0..4 {
            for x in 0..8 {
                let expected = if x < 4 { red } else { green };
                assert_eq!(image.get(x, y), Some(color_to_rgba(expected, false)), "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_tick_converges_then_refines() {
        let mut tracer = idle_tracer(4, 4);
        let generation = tracer.render(4);
        let full = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        assert!(tracer.merge_image(&reply(&tracer, generation, full, Vec3::ONE)));

        assert_eq!(tracer.tick(), RenderState::Converged { generation, lod: 4 });
        assert!(!tracer.is_converged());

        // Next tick asks for the finer pass
        let state = tracer.tick();
        assert_eq!(
            state,
            RenderState::Rendering {
                generation: generation + 1,
                lod: 2
            }
        );
        assert_eq!(tracer.stats().expected, 4);
    }

    #[derive(Debug)]
    struct FlatIntegrator(Vec3);

    impl Integrator for FlatIntegrator {
        fn sample(&self, _: &Ray, _: &Scene, _: &Camera, _: u32) -> Sample {
            Sample {
                color: self.0,
                depth: 1.0,
            }
        }
    }

    #[test]
    fn test_tiles_are_shaded_by_the_chosen_integrator() {
        let dispatcher = Arc::new(Dispatcher::new(1).unwrap());
        let green = Vec3::new(0.0, 1.0, 0.0);
        let mut tracer =
            RayTracer::with_dispatcher(Arc::new(scene(4, 4)), RenderConfig::default(), dispatcher)
                .with_integrator(FlatIntegrator(green));
        tracer.render(2);

        let started = Instant::now();
        while tracer.stats().merged < tracer.stats().expected {
            assert!(started.elapsed() < Duration::from_secs(10), "tiles never arrived");
            tracer.poll();
            thread::sleep(Duration::from_millis(1));
        }

        let expected = color_to_rgba(green, false);
        assert!(tracer.image().pixels().iter().all(|&p| p == expected));
    }

    #[test]
    fn test_resize_reallocates_and_restarts() {
        let mut tracer = idle_tracer(4, 4);
        tracer.start();
        let generation = tracer.resize(10, 6);

        assert_eq!((tracer.raster().width(), tracer.raster().height()), (10, 6));
        assert_eq!(tracer.camera().viewport(), lumen_math::UVec2::new(10, 6));
        assert_eq!(tracer.generation(), generation);
        assert_eq!(tracer.level_of_detail(), tracer.config().initial_lod);
    }

    #[test]
    fn test_scene_mut_copies_on_write() {
        let mut tracer = idle_tracer(4, 4);
        tracer.render(4);
        let before = Arc::clone(&tracer.scene);

        tracer.scene_mut().set_background(Vec3::ONE);
        assert_eq!(before.background(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(tracer.scene().background(), Vec3::ONE);
    }
}
