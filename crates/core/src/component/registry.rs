use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::{Component, OptionError, OptionResult, EFFECT_LIST};
use crate::preset::Options;
use crate::{effects, Result, VisualiserError};

/// Builds a component from its merged option map.
pub type Constructor = Rc<dyn Fn(&Options) -> OptionResult<Box<dyn Component>>>;

/// What to do with option keys a component type does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownOptions {
    /// Drop them with a warning.
    #[default]
    Ignore,
    /// Fail the load.
    Reject,
}

/// Registration record for one component type.
#[derive(Clone)]
pub struct ComponentSpec {
    name: String,
    defaults: Options,
    required: Vec<String>,
    unknown_options: UnknownOptions,
    constructor: Constructor,
}

impl ComponentSpec {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Options) -> OptionResult<Box<dyn Component>> + 'static,
    {
        Self {
            name: name.into(),
            defaults: Options::new(),
            required: Vec::new(),
            unknown_options: UnknownOptions::default(),
            constructor: Rc::new(constructor),
        }
    }

    pub fn with_default(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self
    }

    /// Declares an option that has no default and must be supplied.
    pub fn with_required(mut self, key: &str) -> Self {
        self.required.push(key.to_string());
        self
    }

    pub fn with_unknown_options(mut self, policy: UnknownOptions) -> Self {
        self.unknown_options = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    fn declares(&self, key: &str) -> bool {
        self.defaults.contains_key(key) || self.required.iter().any(|k| k == key)
    }

    /// Overlays `given` on the declared defaults.
    pub fn merge_options(&self, given: &Options) -> OptionResult<Options> {
        let mut merged = self.defaults.clone();
        for (key, value) in given {
            if self.declares(key) {
                merged.insert(key.clone(), value.clone());
                continue;
            }
            match self.unknown_options {
                UnknownOptions::Ignore => {
                    tracing::warn!(component = %self.name, key = %key, "ignoring unknown option");
                }
                UnknownOptions::Reject => return Err(OptionError::unknown(key)),
            }
        }

        if let Some(missing) = self.required.iter().find(|k| !merged.contains_key(*k)) {
            return Err(OptionError::new(missing.as_str(), "required option is missing"));
        }
        Ok(merged)
    }

    pub fn construct(&self, options: &Options) -> OptionResult<Box<dyn Component>> {
        (self.constructor)(options)
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("required", &self.required)
            .field("unknown_options", &self.unknown_options)
            .finish()
    }
}

/// Maps component type names to their registration records.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    specs: HashMap<String, ComponentSpec>,
}

impl ComponentRegistry {
    /// An empty registry. Only `EffectList` is understood.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in effect.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in effects::builtin_specs() {
            registry.specs.insert(spec.name().to_string(), spec);
        }
        registry
    }

    /// Adds or replaces a component type.
    pub fn register(&mut self, spec: ComponentSpec) -> Result<()> {
        if spec.name() == EFFECT_LIST {
            return Err(VisualiserError::msg("`EffectList` is built into the tree"));
        }
        if let Some(previous) = self.specs.insert(spec.name().to_string(), spec) {
            tracing::warn!(component = %previous.name(), "replacing registered component type");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        name == EFFECT_LIST || self.specs.contains_key(name)
    }

    /// Registered leaf types, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
