use std::collections::HashMap;

/// Named numeric registers shared by every component of a loaded preset.
///
/// Per-frame expression code reads and writes these. The bank persists across
/// ticks and is emptied when a preset is loaded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegisterBank {
    values: HashMap<String, f64>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unset registers read as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }
}
