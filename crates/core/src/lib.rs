//! Core library for the preset visualiser.
//!
//! A preset is a tree of render components loaded from JSON. Each tick the
//! tree is walked depth-first against one audio analysis snapshot; nested
//! EffectLists draw into pooled offscreen surfaces and blend back into their
//! parent. The [`Visualiser`] drives the tree from host frame callbacks and
//! pauses while preset resources are still loading.

pub mod analysis;
pub mod audio;
pub mod blend;
pub mod buffers;
pub mod component;
pub mod config;
pub mod effects;
pub mod error;
pub mod pool;
pub mod preset;
pub mod registers;
pub mod render;
pub mod resources;
pub mod scheduler;
pub mod surface;
pub mod visualiser;

pub use analysis::{Analyser, AnalysisEngine, AnalysisFrame};
pub use audio::{AnalysisHandle, AudioEngine};
pub use blend::{BlendMode, InputMode};
pub use buffers::NamedBufferStore;
pub use component::{
    Component, ComponentId, ComponentRegistry, ComponentSpec, ComponentTree, DrawContext,
    EffectList, PresetLoader,
};
pub use config::{AppConfig, AudioConfig, CanvasConfig, PoolConfig};
pub use error::{Result, VisualiserError};
pub use pool::{SurfacePool, SurfacePoolOpts, SurfacePoolStats};
pub use preset::{ComponentConfig, PresetConfig, ResourceConfig};
pub use registers::RegisterBank;
pub use render::Renderer;
pub use resources::{GateSignal, ResourceGate};
pub use scheduler::{FrameHost, FrameToken, ManualHost, RenderScheduler, SchedulerState};
pub use surface::{Rgba, Surface};
pub use visualiser::{TickOutcome, Visualiser};
