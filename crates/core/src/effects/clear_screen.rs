use serde_json::Value;

use crate::blend::{blend_color, BlendMode};
use crate::component::{
    blend_value, color_value, get_blend, get_color, get_u32, u32_value, Component, ComponentSpec,
    DrawContext, OptionError, OptionResult,
};
use crate::preset::Options;
use crate::surface::{Rgba, Surface};
use crate::Result;

pub const NAME: &str = "ClearScreen";

pub(crate) fn spec() -> ComponentSpec {
    ComponentSpec::new(NAME, |options| {
        Ok(Box::new(ClearScreen::from_options(options)?) as Box<dyn Component>)
    })
    .with_default("color", "#000000")
    .with_default("blendMode", BlendMode::Replace.as_str())
    .with_default("beatCount", 0)
}

/// Fills the frame with a constant colour, every tick or every Nth beat.
#[derive(Debug, Clone)]
pub struct ClearScreen {
    color: Rgba,
    blend: BlendMode,
    beat_count: u32,
    beats_seen: u32,
}

impl ClearScreen {
    pub fn from_options(options: &Options) -> OptionResult<Self> {
        Ok(Self {
            color: get_color(options, "color")?,
            blend: get_blend(options, "blendMode")?,
            beat_count: get_u32(options, "beatCount")?,
            beats_seen: 0,
        })
    }

    fn due(&mut self, beat: bool) -> bool {
        if self.beat_count == 0 {
            return true;
        }
        if !beat {
            return false;
        }
        self.beats_seen += 1;
        if self.beats_seen >= self.beat_count {
            self.beats_seen = 0;
            true
        } else {
            false
        }
    }
}

impl Component for ClearScreen {
    fn draw(&mut self, ctx: &mut DrawContext<'_>, frame: &mut Surface) -> Result<()> {
        if self.due(ctx.analysis.beat) {
            blend_color(self.blend, self.color, frame);
        }
        Ok(())
    }

    fn update_option(&mut self, key: &str, value: &Value) -> OptionResult<()> {
        match key {
            "color" => self.color = color_value(key, value)?,
            "blendMode" => self.blend = blend_value(key, value)?,
            "beatCount" => {
                self.beat_count = u32_value(key, value)?;
                self.beats_seen = 0;
            }
            _ => return Err(OptionError::unknown(key)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::NamedBufferStore;
    use crate::pool::{SurfacePool, SurfacePoolOpts};
    use crate::registers::RegisterBank;
    use crate::AnalysisFrame;
    use serde_json::json;

    fn draw(effect: &mut ClearScreen, frame: &mut Surface, beat: bool) {
        let mut pool = SurfacePool::new(SurfacePoolOpts::default(), 2, 2);
        let mut buffers = NamedBufferStore::new();
        let mut registers = RegisterBank::new();
        let analysis = AnalysisFrame::with_beat(beat);
        let mut ctx = DrawContext {
            pool: &mut pool,
            buffers: &mut buffers,
            registers: &mut registers,
            analysis: &analysis,
            tick: 0,
        };
        effect.draw(&mut ctx, frame).unwrap();
    }

    fn effect(options: Value) -> ClearScreen {
        let merged = spec()
            .merge_options(options.as_object().unwrap())
            .unwrap();
        ClearScreen::from_options(&merged).unwrap()
    }

    #[test]
    fn fills_every_tick_by_default() {
        let mut clear = effect(json!({ "color": "#00ff00" }));
        let mut frame = Surface::new(2, 2);
        draw(&mut clear, &mut frame, false);
        assert_eq!(frame.pixel(1, 0), [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn clears_on_every_nth_beat() {
        let mut clear = effect(json!({ "color": "#ffffff", "beatCount": 2 }));
        let mut frame = Surface::new(2, 2);

        draw(&mut clear, &mut frame, true);
        assert_eq!(frame.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
        draw(&mut clear, &mut frame, false);
        assert_eq!(frame.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
        draw(&mut clear, &mut frame, true);
        assert_eq!(frame.pixel(0, 0), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_unknown_blend_mode() {
        let mut clear = effect(json!({}));
        let err = clear
            .update_option("blendMode", &json!("SCREEN"))
            .unwrap_err();
        assert_eq!(err.key, "blendMode");
    }
}
