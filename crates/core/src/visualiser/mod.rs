//! Top-level object tying the preset, the frame loop and the host together.

use crate::analysis::Analyser;
use crate::component::{ComponentId, ComponentRegistry, PresetLoader};
use crate::config::AppConfig;
use crate::pool::SurfacePoolOpts;
use crate::preset::{ComponentConfig, PresetConfig};
use crate::render::Renderer;
use crate::resources::{GateSignal, ResourceGate};
use crate::scheduler::{FrameHost, FrameToken, RenderScheduler, SchedulerState};
use crate::{Result, VisualiserError};

/// What a frame callback ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    /// Stale token, or the scheduler is not active.
    Skipped,
}

pub struct Visualiser<H: FrameHost, A: Analyser> {
    host: H,
    analyser: A,
    registry: ComponentRegistry,
    scheduler: RenderScheduler,
    gate: ResourceGate,
    /// `None` while the graphics context is lost.
    renderer: Option<Renderer>,
    preset: PresetConfig,
    pool: SurfacePoolOpts,
    width: u32,
    height: u32,
    resume_on_restore: bool,
}

impl<H: FrameHost, A: Analyser> Visualiser<H, A> {
    /// Sets up an empty preset. Fails if the host has no graphics context.
    pub fn new(host: H, analyser: A, registry: ComponentRegistry, config: &AppConfig) -> Result<Self> {
        if !host.context_available() {
            return Err(VisualiserError::ContextUnavailable);
        }

        let preset = PresetConfig::default();
        let pool = SurfacePoolOpts {
            capacity: config.pool.capacity,
        };
        let (width, height) = (config.canvas.width, config.canvas.height);
        let tree = PresetLoader::new(&registry).build(&preset)?;

        tracing::info!(width, height, capacity = pool.capacity, "visualiser ready");
        Ok(Self {
            host,
            analyser,
            registry,
            scheduler: RenderScheduler::new(),
            gate: ResourceGate::new(),
            renderer: Some(Renderer::new(tree, pool, width, height)),
            preset,
            pool,
            width,
            height,
            resume_on_restore: false,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn gate(&self) -> &ResourceGate {
        &self.gate
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Builds `config` and swaps it in. A preset that fails to load leaves
    /// the running one untouched.
    pub fn load_preset(&mut self, config: PresetConfig) -> Result<()> {
        let tree = PresetLoader::new(&self.registry).build(&config)?;
        tracing::info!(nodes = tree.len(), "loaded preset");

        match self.renderer.as_mut() {
            Some(renderer) => drop(renderer.replace_tree(tree)),
            // Rebuilt from `self.preset` once the context is back.
            None => drop(tree),
        }

        let signal = self.gate.reset(&config.resources);
        self.preset = config;
        self.apply(signal);
        Ok(())
    }

    /// Snapshot of the running preset, including edits made since load.
    pub fn to_config(&self) -> Result<PresetConfig> {
        match &self.renderer {
            Some(renderer) => renderer.tree().to_config(),
            None => Ok(self.preset.clone()),
        }
    }

    /// Builds a component and inserts it under `parent`.
    pub fn insert_component(
        &mut self,
        parent: ComponentId,
        index: Option<usize>,
        config: &ComponentConfig,
    ) -> Result<ComponentId> {
        let renderer = self
            .renderer
            .as_mut()
            .ok_or(VisualiserError::ContextUnavailable)?;
        PresetLoader::new(&self.registry).insert(renderer.tree_mut(), parent, index, config)
    }

    pub fn start(&mut self) {
        if self.renderer.is_none() {
            self.resume_on_restore = true;
            return;
        }
        self.scheduler.start(&mut self.host, self.gate.is_ready());
    }

    pub fn stop(&mut self) {
        self.resume_on_restore = false;
        self.scheduler.stop(&mut self.host);
    }

    /// Frame callback from the host.
    pub fn on_frame(&mut self, token: FrameToken) -> Result<TickOutcome> {
        if !self.scheduler.begin_tick(token) {
            tracing::trace!(?token, "skipping stale frame");
            return Ok(TickOutcome::Skipped);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(TickOutcome::Skipped);
        };

        let analysis = self.analyser.sample();
        if let Err(err) = renderer.draw_frame(&analysis) {
            tracing::error!(error = %err, "tick failed, stopping");
            self.scheduler.stop(&mut self.host);
            return Err(err);
        }

        self.host.present(renderer.frame());
        self.scheduler.end_tick(&mut self.host);
        Ok(TickOutcome::Rendered)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (self.width, self.height) == (width, height) {
            return;
        }
        tracing::debug!(width, height, "resizing canvas");
        self.width = width;
        self.height = height;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(width, height);
        }
    }

    /// Tears down every GPU-side object. The preset is kept as a config
    /// snapshot and rebuilt by [`Visualiser::context_restored`].
    pub fn context_lost(&mut self) {
        let Some(mut renderer) = self.renderer.take() else {
            return;
        };
        match renderer.tree().to_config() {
            Ok(snapshot) => self.preset = snapshot,
            Err(err) => tracing::warn!(error = %err, "could not snapshot preset, keeping last loaded"),
        }

        self.resume_on_restore = self.scheduler.is_running();
        self.scheduler.stop(&mut self.host);
        renderer.destroy();
        tracing::warn!("graphics context lost");
    }

    pub fn context_restored(&mut self) -> Result<()> {
        if self.renderer.is_some() {
            return Ok(());
        }
        if !self.host.context_available() {
            return Err(VisualiserError::ContextUnavailable);
        }

        let tree = PresetLoader::new(&self.registry).build(&self.preset)?;
        self.renderer = Some(Renderer::new(tree, self.pool, self.width, self.height));
        tracing::info!("graphics context restored");

        if std::mem::take(&mut self.resume_on_restore) {
            self.scheduler.start(&mut self.host, self.gate.is_ready());
        }
        Ok(())
    }

    pub fn resource_loading(&mut self, key: &str) {
        let signal = self.gate.begin(key);
        self.apply(signal);
    }

    pub fn resource_loaded(&mut self, key: &str) {
        let signal = self.gate.loaded(key);
        self.apply(signal);
    }

    pub fn resource_failed(&mut self, key: &str) {
        self.gate.failed_to_load(key);
    }

    fn apply(&mut self, signal: Option<GateSignal>) {
        if let Some(signal) = signal {
            self.scheduler.signal(&mut self.host, signal);
        }
    }
}

impl<H: FrameHost, A: Analyser> std::fmt::Debug for Visualiser<H, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualiser")
            .field("state", &self.scheduler.state())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("renderer", &self.renderer)
            .finish()
    }
}
