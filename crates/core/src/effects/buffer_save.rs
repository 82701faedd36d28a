use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::blend::BlendMode;
use crate::component::{
    blend_value, get_blend, get_str, get_u32, str_value, u32_value, Component, ComponentSpec,
    DrawContext, OptionError, OptionResult,
};
use crate::preset::Options;
use crate::surface::Surface;
use crate::Result;

pub const NAME: &str = "BufferSave";

pub(crate) fn spec() -> ComponentSpec {
    ComponentSpec::new(NAME, |options| {
        Ok(Box::new(BufferSave::from_options(options)?) as Box<dyn Component>)
    })
    .with_default("action", BufferAction::Save.as_str())
    .with_default("bufferId", 1)
    .with_default("blendMode", BlendMode::Replace.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAction {
    Save,
    Restore,
    /// Alternates every tick, saving first.
    SaveRestore,
    /// Alternates every tick, restoring first.
    RestoreSave,
}

impl BufferAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BufferAction::Save => "SAVE",
            BufferAction::Restore => "RESTORE",
            BufferAction::SaveRestore => "SAVERESTORE",
            BufferAction::RestoreSave => "RESTORESAVE",
        }
    }
}

impl fmt::Display for BufferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BufferAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SAVE" => Ok(BufferAction::Save),
            "RESTORE" => Ok(BufferAction::Restore),
            "SAVERESTORE" => Ok(BufferAction::SaveRestore),
            "RESTORESAVE" => Ok(BufferAction::RestoreSave),
            other => Err(format!("unknown buffer action `{other}`")),
        }
    }
}

/// Saves the frame into, or restores it from, a named buffer.
#[derive(Debug, Clone)]
pub struct BufferSave {
    action: BufferAction,
    buffer_id: u32,
    blend: BlendMode,
    next_is_save: bool,
}

impl BufferSave {
    pub fn from_options(options: &Options) -> OptionResult<Self> {
        let action = parse_action("action", get_str(options, "action")?)?;
        Ok(Self {
            action,
            buffer_id: buffer_id("bufferId", get_u32(options, "bufferId")?)?,
            blend: get_blend(options, "blendMode")?,
            next_is_save: action != BufferAction::RestoreSave,
        })
    }

    fn take_step(&mut self) -> bool {
        match self.action {
            BufferAction::Save => true,
            BufferAction::Restore => false,
            BufferAction::SaveRestore | BufferAction::RestoreSave => {
                let save = self.next_is_save;
                self.next_is_save = !save;
                save
            }
        }
    }
}

fn parse_action(key: &str, text: &str) -> OptionResult<BufferAction> {
    text.parse()
        .map_err(|message: String| OptionError::new(key, message))
}

fn buffer_id(key: &str, id: u32) -> OptionResult<u32> {
    if id == 0 {
        Err(OptionError::new(key, "buffer ids start at 1"))
    } else {
        Ok(id)
    }
}

impl Component for BufferSave {
    fn draw(&mut self, ctx: &mut DrawContext<'_>, frame: &mut Surface) -> Result<()> {
        if self.take_step() {
            ctx.buffers.save(self.buffer_id, self.blend, frame)
        } else {
            let restored = ctx.buffers.restore(self.buffer_id, self.blend, frame)?;
            if !restored {
                tracing::trace!(buffer = self.buffer_id, "restore of unsaved buffer skipped");
            }
            Ok(())
        }
    }

    fn update_option(&mut self, key: &str, value: &Value) -> OptionResult<()> {
        match key {
            "action" => {
                self.action = parse_action(key, str_value(key, value)?)?;
                self.next_is_save = self.action != BufferAction::RestoreSave;
            }
            "bufferId" => self.buffer_id = buffer_id(key, u32_value(key, value)?)?,
            "blendMode" => self.blend = blend_value(key, value)?,
            _ => return Err(OptionError::unknown(key)),
        }
        Ok(())
    }
}
