//! Quadrant mirroring with smooth transitions.
//!
//! Quadrants are numbered row-major: 0 top-left, 1 top-right, 2 bottom-left,
//! 3 bottom-right. Each target quadrant either copies one source quadrant
//! (index mode, one sample per pixel) or, while a transition runs, mixes all
//! four with weights that sum to one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::component::{
    bool_value, get_bool, get_u32, u32_value, Component, ComponentSpec, DrawContext, OptionError,
    OptionResult,
};
use crate::preset::Options;
use crate::surface::Surface;
use crate::Result;

pub const NAME: &str = "Mirror";

const IDENTITY: [usize; 4] = [0, 1, 2, 3];

pub(crate) fn spec() -> ComponentSpec {
    ComponentSpec::new(NAME, |options| {
        Ok(Box::new(Mirror::from_options(options)?) as Box<dyn Component>)
    })
    .with_default("topToBottom", true)
    .with_default("bottomToTop", false)
    .with_default("leftToRight", false)
    .with_default("rightToLeft", false)
    .with_default("onBeatRandom", false)
    .with_default("smoothTransition", false)
    .with_default("transitionDuration", 4)
}

/// Which halves are mirrored onto which.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directions {
    pub top_to_bottom: bool,
    pub bottom_to_top: bool,
    pub left_to_right: bool,
    pub right_to_left: bool,
}

impl Directions {
    /// Source quadrant for every target quadrant. Directions apply in a fixed
    /// order and later ones overwrite earlier ones.
    pub fn mapping(self) -> [usize; 4] {
        let mut map = IDENTITY;
        if self.top_to_bottom {
            map[2] = map[0];
            map[3] = map[1];
        }
        if self.bottom_to_top {
            map[0] = map[2];
            map[1] = map[3];
        }
        if self.left_to_right {
            map[1] = map[0];
            map[3] = map[2];
        }
        if self.right_to_left {
            map[0] = map[1];
            map[2] = map[3];
        }
        map
    }

    /// Keeps each enabled direction only if its bit is set in `bits`.
    pub fn gated(self, bits: u8) -> Self {
        Self {
            top_to_bottom: self.top_to_bottom && bits & 0b0001 != 0,
            bottom_to_top: self.bottom_to_top && bits & 0b0010 != 0,
            left_to_right: self.left_to_right && bits & 0b0100 != 0,
            right_to_left: self.right_to_left && bits & 0b1000 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuadrantMap {
    Index([usize; 4]),
    /// `weights[target][source]`
    Weighted([[f32; 4]; 4]),
}

impl QuadrantMap {
    pub fn weights(&self) -> [[f32; 4]; 4] {
        match self {
            QuadrantMap::Index(map) => one_hot(*map),
            QuadrantMap::Weighted(weights) => *weights,
        }
    }
}

fn one_hot(map: [usize; 4]) -> [[f32; 4]; 4] {
    let mut weights = [[0.0; 4]; 4];
    for (target, &source) in map.iter().enumerate() {
        weights[target][source] = 1.0;
    }
    weights
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    target: [usize; 4],
    delta: [[f32; 4]; 4],
    remaining: u32,
}

#[derive(Debug, Clone)]
pub struct Mirror {
    directions: Directions,
    on_beat_random: bool,
    smooth: bool,
    duration: u32,
    map: QuadrantMap,
    transition: Option<Transition>,
    rng: StdRng,
}

impl Mirror {
    pub fn from_options(options: &Options) -> OptionResult<Self> {
        let directions = Directions {
            top_to_bottom: get_bool(options, "topToBottom")?,
            bottom_to_top: get_bool(options, "bottomToTop")?,
            left_to_right: get_bool(options, "leftToRight")?,
            right_to_left: get_bool(options, "rightToLeft")?,
        };
        Ok(Self {
            directions,
            on_beat_random: get_bool(options, "onBeatRandom")?,
            smooth: get_bool(options, "smoothTransition")?,
            duration: get_u32(options, "transitionDuration")?,
            map: QuadrantMap::Index(directions.mapping()),
            transition: None,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the random source used by `onBeatRandom`.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn map(&self) -> &QuadrantMap {
        &self.map
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Points the mirror at a new mapping, blending towards it when smooth
    /// transitions are on. A transition in flight restarts from the current
    /// weights.
    pub fn retarget(&mut self, target: [usize; 4]) {
        let settled = self.transition.is_none() && self.map == QuadrantMap::Index(target);
        if settled {
            return;
        }
        if !self.smooth || self.duration == 0 {
            self.map = QuadrantMap::Index(target);
            self.transition = None;
            return;
        }

        let current = self.map.weights();
        let goal = one_hot(target);
        let steps = self.duration as f32;
        let mut delta = [[0.0; 4]; 4];
        for q in 0..4 {
            for s in 0..4 {
                delta[q][s] = (goal[q][s] - current[q][s]) / steps;
            }
        }
        self.map = QuadrantMap::Weighted(current);
        self.transition = Some(Transition {
            target,
            delta,
            remaining: self.duration,
        });
    }

    /// Moves a running transition one tick forward. The last tick snaps to
    /// the exact target and returns to index mode.
    pub fn advance(&mut self) {
        let Some(transition) = self.transition.as_mut() else {
            return;
        };
        transition.remaining -= 1;
        if transition.remaining == 0 {
            self.map = QuadrantMap::Index(transition.target);
            self.transition = None;
            return;
        }
        if let QuadrantMap::Weighted(weights) = &mut self.map {
            for (row, delta) in weights.iter_mut().zip(transition.delta.iter()) {
                for (w, d) in row.iter_mut().zip(delta.iter()) {
                    *w += d;
                }
            }
        }
    }

    fn on_beat(&mut self) {
        let bits: u8 = self.rng.gen_range(0..16);
        self.retarget(self.directions.gated(bits).mapping());
    }

    fn render(&self, source: &Surface, frame: &mut Surface) {
        let (width, height) = frame.dimensions();
        for y in 0..height {
            let qy = usize::from(y * 2 >= height);
            for x in 0..width {
                let qx = usize::from(x * 2 >= width);
                let target = qy * 2 + qx;
                let sample = |s: usize| {
                    let sx = if s % 2 != qx { width - 1 - x } else { x };
                    let sy = if s / 2 != qy { height - 1 - y } else { y };
                    source.pixel(sx, sy)
                };
                let pixel = match &self.map {
                    QuadrantMap::Index(map) => sample(map[target]),
                    QuadrantMap::Weighted(weights) => {
                        let mut out = [0.0, 0.0, 0.0, 1.0];
                        for (s, &w) in weights[target].iter().enumerate() {
                            if w == 0.0 {
                                continue;
                            }
                            let p = sample(s);
                            for c in 0..3 {
                                out[c] += p[c] * w;
                            }
                        }
                        out
                    }
                };
                frame.set_pixel(x, y, pixel);
            }
        }
    }
}

impl Component for Mirror {
    fn draw(&mut self, ctx: &mut DrawContext<'_>, frame: &mut Surface) -> Result<()> {
        if self.on_beat_random && ctx.analysis.beat {
            self.on_beat();
        }
        self.advance();

        if self.map == QuadrantMap::Index(IDENTITY) {
            return Ok(());
        }

        let mut source = ctx.pool.acquire()?;
        let copied = source.copy_from(frame);
        if copied.is_ok() {
            self.render(&source, frame);
        }
        let released = ctx.pool.release(source);
        copied.and(released)
    }

    fn update_option(&mut self, key: &str, value: &Value) -> OptionResult<()> {
        match key {
            "topToBottom" => self.directions.top_to_bottom = bool_value(key, value)?,
            "bottomToTop" => self.directions.bottom_to_top = bool_value(key, value)?,
            "leftToRight" => self.directions.left_to_right = bool_value(key, value)?,
            "rightToLeft" => self.directions.right_to_left = bool_value(key, value)?,
            "onBeatRandom" => self.on_beat_random = bool_value(key, value)?,
            "smoothTransition" => self.smooth = bool_value(key, value)?,
            "transitionDuration" => self.duration = u32_value(key, value)?,
            _ => return Err(OptionError::unknown(key)),
        }
        if matches!(
            key,
            "topToBottom" | "bottomToTop" | "leftToRight" | "rightToLeft"
        ) {
            self.retarget(self.directions.mapping());
        }
        Ok(())
    }
}
