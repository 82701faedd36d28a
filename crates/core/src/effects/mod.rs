//! Built-in leaf effects.

pub mod buffer_save;
pub mod clear_screen;
pub mod mirror;

pub use buffer_save::{BufferAction, BufferSave};
pub use clear_screen::ClearScreen;
pub use mirror::{Directions, Mirror, QuadrantMap};

use crate::component::ComponentSpec;

pub(crate) fn builtin_specs() -> Vec<ComponentSpec> {
    vec![clear_screen::spec(), buffer_save::spec(), mirror::spec()]
}
