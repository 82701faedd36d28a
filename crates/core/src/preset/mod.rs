//! Serializable preset snapshots.
//!
//! A preset is a tree of component entries under an implicit root
//! EffectList, plus the external resources it needs and free-form metadata.
//! Blend and input modes are kept as strings here; the loader validates them
//! so that errors can name the offending entry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub type Options = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetConfig {
    /// Clear the canvas at the start of every tick instead of drawing over
    /// the previous frame.
    #[serde(default)]
    pub clear_frame: bool,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl PresetConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub uris: BTreeMap<String, String>,
}

/// One entry of the component tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_frame: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Options,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentConfig>>,
}

impl ComponentConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            enabled: None,
            clear_frame: None,
            input: None,
            output: None,
            options: Options::new(),
            components: None,
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn with_components(mut self, components: Vec<ComponentConfig>) -> Self {
        self.components = Some(components);
        self
    }
}
