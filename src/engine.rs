//! Engine lifecycle: mount, per-frame update, resize and dispose.
//!
//! The engine is driven by its host: the host owns a frame loop, the engine
//! subscribes to it on mount and cancels the subscription on dispose. One
//! frame runs, in order: clock, wave heights, droplet transitions and spawns,
//! buffer sync, upload, draw.

use std::cell::Cell;
use std::rc::Rc;

use glam::Mat4;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::camera::{CameraRig, Projection, Viewport};
use crate::clock::Clock;
use crate::droplets::{DropletPool, SpawnReport};
use crate::error::{EngineError, Result};
use crate::params::{BokehParams, CameraParams, DropletParams, RenderConfig, WaveParams};
use crate::sync::SceneBuffers;
use crate::theme::ThemeDescriptor;
use crate::wave::{BokehField, WaveField};

/// GPU side of the engine: owns device buffers and issues draws
pub trait RenderBackend {
    /// Create device buffers sized for `buffers` and upload their contents
    fn allocate(&mut self, buffers: &mut SceneBuffers) -> Result<()>;

    /// Upload every dirty array, then clear its dirty flags
    fn upload(&mut self, buffers: &mut SceneBuffers);

    /// Apply new projection parameters (and reconfigure the surface if the size changed)
    fn set_projection(&mut self, projection: &Projection);

    /// Draw one frame with the given view matrix
    fn draw(&mut self, view: Mat4) -> Result<()>;

    /// Destroy every device resource the backend holds, uniforms and pipelines
    /// included
    ///
    /// Afterwards `allocate` and `draw` fail with [`EngineError::Disposed`].
    fn release(&mut self);
}

/// Host capability: invoke subscribers once per display refresh
pub trait FrameScheduler {
    fn subscribe(&mut self) -> FrameSubscription;
}

/// Registration with a host frame loop; cancelled subscriptions never fire again
#[derive(Debug, Clone)]
pub struct FrameSubscription {
    active: Rc<Cell<bool>>,
}

impl FrameSubscription {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn cancel(&self) {
        self.active.set(false);
    }
}

/// Single-threaded frame loop for hosts that drive redraws themselves
#[derive(Debug, Default)]
pub struct FrameLoop {
    subscribers: Vec<Rc<Cell<bool>>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any live subscriber wants the next frame; drops cancelled ones
    pub fn wants_frame(&mut self) -> bool {
        self.subscribers.retain(|s| s.get());
        !self.subscribers.is_empty()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.iter().filter(|s| s.get()).count()
    }
}

impl FrameScheduler for FrameLoop {
    fn subscribe(&mut self) -> FrameSubscription {
        let active = Rc::new(Cell::new(true));
        self.subscribers.push(Rc::clone(&active));
        FrameSubscription { active }
    }
}

/// Tuning for one mount; particle counts come from the theme
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wave: WaveParams,
    pub bokeh: BokehParams,
    pub droplets: DropletParams,
    pub camera: CameraParams,
    pub render: RenderConfig,
    /// Seed for the engine's private RNG
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wave: WaveParams::default(),
            bokeh: BokehParams::default(),
            droplets: DropletParams::default(),
            camera: CameraParams::default(),
            render: RenderConfig::default(),
            seed: 42,
        }
    }
}

/// All simulation state of one engine instance
pub struct Scene {
    clock: Clock,
    wave: WaveField,
    bokeh: BokehField,
    droplets: DropletPool,
    buffers: SceneBuffers,
    rng: StdRng,
}

impl Scene {
    pub fn new(theme: &ThemeDescriptor, config: &EngineConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (extent_x, extent_z) = (config.wave.extent_x, config.wave.extent_z);

        let wave = WaveField::initialize(theme.wave_count, &config.wave, theme, &mut rng);
        let bokeh =
            BokehField::initialize(theme.bokeh_count, &config.bokeh, extent_x, extent_z, &mut rng);
        let droplets = DropletPool::new(
            theme.droplet_count,
            config.droplets.clone(),
            extent_x,
            extent_z,
            &mut rng,
        );
        let buffers = SceneBuffers::new(&wave, &bokeh, &droplets, &mut rng);

        Self {
            clock: Clock::new(config.wave.time_step),
            wave,
            bokeh,
            droplets,
            buffers,
            rng,
        }
    }

    /// Advance the simulation one frame and refresh the buffers
    pub fn step(&mut self) -> SpawnReport {
        let t = self.clock.advance();
        self.wave.step(t);
        let report = self.droplets.step(t, &mut self.rng);
        self.buffers.sync(&self.wave, &self.droplets, t);
        report
    }

    pub fn time(&self) -> f32 {
        self.clock.time()
    }

    pub fn wave(&self) -> &WaveField {
        &self.wave
    }

    pub fn bokeh(&self) -> &BokehField {
        &self.bokeh
    }

    pub fn droplets(&self) -> &DropletPool {
        &self.droplets
    }

    pub fn buffers(&self) -> &SceneBuffers {
        &self.buffers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// A frame failed; the loop is stopped but resources are still held
    Faulted,
    Disposed,
}

/// A mounted engine
///
/// Dropping the handle disposes it.
pub struct EngineHandle<B: RenderBackend> {
    scene: Scene,
    camera: CameraRig,
    projection: Projection,
    camera_params: CameraParams,
    render_config: RenderConfig,
    backend: B,
    subscription: FrameSubscription,
    state: EngineState,
}

impl<B: RenderBackend> EngineHandle<B> {
    /// Build the scene, allocate device buffers and subscribe to the host frame loop
    ///
    /// On failure nothing is registered with the host.
    pub fn mount<S: FrameScheduler>(
        theme: &ThemeDescriptor,
        viewport: Viewport,
        config: EngineConfig,
        mut backend: B,
        scheduler: &mut S,
    ) -> Result<Self> {
        if !theme.enabled {
            return Err(EngineError::Disabled(theme.id.clone()));
        }

        let mut scene = Scene::new(theme, &config);
        let projection = Projection::new(&config.camera, &config.render, viewport);

        backend.allocate(&mut scene.buffers)?;
        backend.set_projection(&projection);

        let subscription = scheduler.subscribe();

        tracing::info!(
            theme = %theme.id,
            wave = theme.wave_count,
            bokeh = theme.bokeh_count,
            droplets = theme.droplet_count,
            width = viewport.width,
            height = viewport.height,
            "Particle engine mounted"
        );

        Ok(Self {
            scene,
            camera: CameraRig::new(config.camera.clone()),
            projection,
            camera_params: config.camera,
            render_config: config.render,
            backend,
            subscription,
            state: EngineState::Running,
        })
    }

    /// Run one frame
    ///
    /// A failed draw stops the loop; the handle must still be disposed.
    pub fn frame(&mut self) -> Result<SpawnReport> {
        if self.state != EngineState::Running || !self.subscription.is_active() {
            return Err(EngineError::Disposed);
        }

        let report = self.scene.step();
        let view = self.camera.view_matrix(self.scene.time());

        self.backend.upload(&mut self.scene.buffers);
        if let Err(e) = self.backend.draw(view) {
            tracing::error!("Frame failed, stopping render loop: {}", e);
            self.subscription.cancel();
            self.state = EngineState::Faulted;
            return Err(e);
        }

        Ok(report)
    }

    /// Recompute projection parameters; particle buffers are untouched
    pub fn on_resize(&mut self, viewport: Viewport) {
        if self.state == EngineState::Disposed || viewport == self.projection.viewport {
            return;
        }

        self.projection = Projection::new(&self.camera_params, &self.render_config, viewport);
        self.backend.set_projection(&self.projection);

        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            pixel_ratio = self.projection.pixel_ratio,
            "Viewport resized"
        );
    }

    /// Stop the frame subscription and release every device resource
    ///
    /// Safe to call any number of times.
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }

        self.subscription.cancel();
        self.backend.release();
        self.state = EngineState::Disposed;

        tracing::info!(time = self.scene.time(), "Particle engine disposed");
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: RenderBackend> Drop for EngineHandle<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct BackendLog {
        allocations: usize,
        uploads: usize,
        projections: Vec<Projection>,
        draws: usize,
        releases: usize,
        uploaded_points: usize,
        /// Device resources currently held, by label
        live: Vec<String>,
    }

    /// Records every call instead of touching a GPU
    struct RecordingBackend {
        log: Rc<RefCell<BackendLog>>,
        fail_allocate: bool,
        fail_draw_at: Option<usize>,
    }

    impl RecordingBackend {
        fn new() -> (Self, Rc<RefCell<BackendLog>>) {
            let log = Rc::new(RefCell::new(BackendLog::default()));
            let backend = Self {
                log: Rc::clone(&log),
                fail_allocate: false,
                fail_draw_at: None,
            };
            (backend, log)
        }
    }

    impl RenderBackend for RecordingBackend {
        fn allocate(&mut self, buffers: &mut SceneBuffers) -> Result<()> {
            if self.fail_allocate {
                return Err(EngineError::BackendUnavailable("no adapter".to_string()));
            }
            let mut log = self.log.borrow_mut();
            if log.releases > 0 {
                return Err(EngineError::Disposed);
            }
            log.allocations += 1;
            log.live = ["globals", "background", "sprite pipeline", "background pipeline"]
                .iter()
                .map(|r| r.to_string())
                .collect();
            for (i, b) in buffers.populations_mut().into_iter().enumerate() {
                for attribute in ["positions", "colors", "sizes", "style"] {
                    log.live.push(format!("population {} {}", i, attribute));
                }
                b.clear_dirty();
            }
            Ok(())
        }

        fn upload(&mut self, buffers: &mut SceneBuffers) {
            let mut log = self.log.borrow_mut();
            log.uploads += 1;
            for b in buffers.populations_mut() {
                if b.dirty().any() {
                    log.uploaded_points += b.len();
                }
                b.clear_dirty();
            }
        }

        fn set_projection(&mut self, projection: &Projection) {
            self.log.borrow_mut().projections.push(*projection);
        }

        fn draw(&mut self, _view: Mat4) -> Result<()> {
            let mut log = self.log.borrow_mut();
            if log.live.is_empty() {
                return Err(EngineError::Disposed);
            }
            log.draws += 1;
            if self.fail_draw_at == Some(log.draws) {
                return Err(EngineError::Surface("device lost".to_string()));
            }
            Ok(())
        }

        fn release(&mut self) {
            let mut log = self.log.borrow_mut();
            log.releases += 1;
            log.live.clear();
        }
    }

    fn small_theme() -> ThemeDescriptor {
        ThemeDescriptor {
            wave_count: 500,
            bokeh_count: 10,
            droplet_count: 40,
            ..ThemeDescriptor::wave()
        }
    }

    fn mount(
        backend: RecordingBackend,
        frames: &mut FrameLoop,
    ) -> Result<EngineHandle<RecordingBackend>> {
        EngineHandle::mount(
            &small_theme(),
            Viewport::new(800, 600),
            EngineConfig::default(),
            backend,
            frames,
        )
    }

    #[test]
    fn test_mount_allocates_and_subscribes() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let engine = mount(backend, &mut frames).unwrap();

        assert!(engine.is_running());
        assert!(frames.wants_frame());
        assert_eq!(log.borrow().allocations, 1);
        assert_eq!(log.borrow().projections.len(), 1);
        assert_eq!(engine.scene().buffers().wave.len(), 500);
        assert_eq!(engine.scene().droplets().len(), 40);
    }

    #[test]
    fn test_disabled_theme_refuses_mount() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let result = EngineHandle::mount(
            &ThemeDescriptor::none(),
            Viewport::new(800, 600),
            EngineConfig::default(),
            backend,
            &mut frames,
        );

        assert!(matches!(result, Err(EngineError::Disabled(id)) if id == "none"));
        assert_eq!(frames.active_subscriptions(), 0);
        assert_eq!(log.borrow().allocations, 0);
    }

    #[test]
    fn test_failed_mount_leaves_host_untouched() {
        let (mut backend, log) = RecordingBackend::new();
        backend.fail_allocate = true;
        let mut frames = FrameLoop::new();

        let result = mount(backend, &mut frames);
        assert!(matches!(result, Err(EngineError::BackendUnavailable(_))));
        assert!(!frames.wants_frame());
        assert!(log.borrow().projections.is_empty());
    }

    #[test]
    fn test_frames_step_upload_and_draw() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();

        for _ in 0..10 {
            assert!(frames.wants_frame());
            engine.frame().unwrap();
        }

        assert!((engine.scene().time() - 0.2).abs() < 1e-5);
        let log = log.borrow();
        assert_eq!(log.uploads, 10);
        assert_eq!(log.draws, 10);
        // Bokeh never changes, every other population re-uploads each frame
        assert_eq!(log.uploaded_points, 10 * (500 + 40 * 12 + 40));
    }

    #[test]
    fn test_dispose_releases_once_and_stops_frames() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();
        engine.frame().unwrap();

        engine.dispose();
        engine.dispose();

        assert_eq!(engine.state(), EngineState::Disposed);
        assert_eq!(log.borrow().releases, 1);
        assert!(!frames.wants_frame());
        assert!(matches!(engine.frame(), Err(EngineError::Disposed)));
        assert_eq!(log.borrow().draws, 1);

        drop(engine);
        assert_eq!(log.borrow().releases, 1);
    }

    #[test]
    fn test_drop_disposes() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let engine = mount(backend, &mut frames).unwrap();

        drop(engine);
        assert_eq!(log.borrow().releases, 1);
        assert!(!frames.wants_frame());
    }

    #[test]
    fn test_dispose_frees_every_device_resource() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();
        engine.frame().unwrap();

        // Four populations with four buffers each, plus shared uniforms and pipelines
        assert_eq!(log.borrow().live.len(), 4 * 4 + 4);
        assert!(log.borrow().live.iter().any(|r| r == "globals"));

        engine.dispose();

        assert!(log.borrow().live.is_empty(), "still held: {:?}", log.borrow().live);
        assert!(matches!(engine.frame(), Err(EngineError::Disposed)));
    }

    #[test]
    fn test_failed_frame_stops_loop_and_dispose_still_succeeds() {
        let (mut backend, log) = RecordingBackend::new();
        backend.fail_draw_at = Some(3);
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();

        engine.frame().unwrap();
        engine.frame().unwrap();
        assert!(matches!(engine.frame(), Err(EngineError::Surface(_))));

        assert_eq!(engine.state(), EngineState::Faulted);
        assert!(!frames.wants_frame());
        assert!(matches!(engine.frame(), Err(EngineError::Disposed)));
        assert_eq!(log.borrow().releases, 0);

        engine.dispose();
        assert_eq!(log.borrow().releases, 1);
        assert_eq!(log.borrow().draws, 3);
    }

    #[test]
    fn test_resize_is_idempotent_and_keeps_buffers() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();
        engine.frame().unwrap();

        let before = engine.scene().buffers().clone();
        let resized = Viewport::new(1920, 1080).with_pixel_ratio(2.0);

        engine.on_resize(resized);
        let projection = *engine.projection();
        engine.on_resize(resized);

        assert_eq!(*engine.projection(), projection);
        assert_eq!(projection.viewport, resized);
        assert_eq!(log.borrow().projections.len(), 2);

        let after = engine.scene().buffers();
        for (a, b) in before.populations().iter().zip(after.populations()) {
            assert_eq!(a.positions(), b.positions());
            assert_eq!(a.colors(), b.colors());
            assert_eq!(a.sizes(), b.sizes());
        }
    }

    #[test]
    fn test_resize_after_dispose_is_ignored() {
        let (backend, log) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();

        engine.dispose();
        engine.on_resize(Viewport::new(100, 100));
        assert_eq!(log.borrow().projections.len(), 1);
    }

    #[test]
    fn test_engines_do_not_share_state() {
        let mut frames = FrameLoop::new();
        let (backend_a, _) = RecordingBackend::new();
        let (backend_b, _) = RecordingBackend::new();
        let mut a = mount(backend_a, &mut frames).unwrap();
        let b = mount(backend_b, &mut frames).unwrap();

        let b_before = b.scene().buffers().clone();
        for _ in 0..20 {
            a.frame().unwrap();
        }

        assert_eq!(b.scene().time(), 0.0);
        assert_eq!(b.scene().buffers().heads.positions(), b_before.heads.positions());
        assert_eq!(frames.active_subscriptions(), 2);

        drop(a);
        assert_eq!(frames.active_subscriptions(), 1);
        assert!(frames.wants_frame());
    }

    #[test]
    fn test_pool_bounds_hold_through_engine_frames() {
        let (backend, _) = RecordingBackend::new();
        let mut frames = FrameLoop::new();
        let mut engine = mount(backend, &mut frames).unwrap();

        for _ in 0..500 {
            engine.frame().unwrap();
            let pool = engine.scene().droplets();
            assert!(pool.active_count() <= pool.len());
            assert!(pool
                .droplets()
                .iter()
                .all(|d| (0.0..=1.0).contains(&d.opacity())));
        }
    }
}
