//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use preset_visualiser_core::{
    AnalysisFrame, AppConfig, CanvasConfig, ComponentRegistry, ManualHost, PoolConfig,
    PresetConfig, Result, Rgba, Surface, TickOutcome, Visualiser,
};

pub type ScriptedAnalyser = Box<dyn FnMut() -> AnalysisFrame>;
pub type TestVisualiser = Visualiser<ManualHost, ScriptedAnalyser>;

pub const RED: Rgba = [1.0, 0.0, 0.0, 1.0];
pub const BLUE: Rgba = [0.0, 0.0, 1.0, 1.0];
pub const MAGENTA: Rgba = [1.0, 0.0, 1.0, 1.0];

pub fn app_config(width: u32, height: u32, capacity: usize) -> AppConfig {
    AppConfig {
        canvas: CanvasConfig { width, height },
        pool: PoolConfig { capacity },
        ..AppConfig::default()
    }
}

/// Analyser that plays back `beats` once, then stays silent.
pub fn beats(beats: &[bool]) -> ScriptedAnalyser {
    let mut script: VecDeque<bool> = beats.iter().copied().collect();
    Box::new(move || AnalysisFrame::with_beat(script.pop_front().unwrap_or(false)))
}

pub fn visualiser(width: u32, height: u32) -> TestVisualiser {
    visualiser_with(app_config(width, height, 4), beats(&[]))
}

pub fn visualiser_with(config: AppConfig, analyser: ScriptedAnalyser) -> TestVisualiser {
    Visualiser::new(
        ManualHost::new(),
        analyser,
        ComponentRegistry::with_builtins(),
        &config,
    )
    .expect("host has a context")
}

pub fn preset(json: &str) -> PresetConfig {
    PresetConfig::from_json(json).expect("fixture preset parses")
}

/// Fires the oldest outstanding frame request, if any.
pub fn tick(vis: &mut TestVisualiser) -> Result<Option<TickOutcome>> {
    match vis.host_mut().take_request() {
        Some(token) => vis.on_frame(token).map(Some),
        None => Ok(None),
    }
}

pub fn last_frame(vis: &TestVisualiser) -> &Surface {
    vis.host().last_frame().expect("a frame was presented")
}

pub fn assert_uniform(frame: &Surface, expected: Rgba) {
    for (i, px) in frame.pixels().iter().enumerate() {
        for c in 0..4 {
            assert!(
                (px[c] - expected[c]).abs() < 1e-5,
                "pixel {i} is {px:?}, expected {expected:?}"
            );
        }
    }
}
