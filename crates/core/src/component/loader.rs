use std::str::FromStr;

use super::{
    ComponentId, ComponentRegistry, ComponentTree, EffectList, Node, NodeBody, OptionError,
    EFFECT_LIST,
};
use crate::preset::{ComponentConfig, Options, PresetConfig};
use crate::{Result, VisualiserError};

/// Instantiates component trees from preset configuration.
#[derive(Debug, Clone, Copy)]
pub struct PresetLoader<'r> {
    registry: &'r ComponentRegistry,
}

impl<'r> PresetLoader<'r> {
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Builds a whole tree. Nothing survives a failed build: components
    /// constructed before the error are destroyed.
    pub fn build(&self, config: &PresetConfig) -> Result<ComponentTree> {
        let mut tree = ComponentTree::new(
            config.clear_frame,
            config.resources.clone(),
            config.meta.clone(),
        );
        let root = tree.root();
        for (i, child) in config.components.iter().enumerate() {
            self.build_node(&mut tree, root, None, child, format!("components[{i}]"))?;
        }
        tracing::debug!(nodes = tree.len(), "built component tree");
        Ok(tree)
    }

    /// Builds `config` and inserts it under `parent` at `index` (appended
    /// when `None`).
    pub fn insert(
        &self,
        tree: &mut ComponentTree,
        parent: ComponentId,
        index: Option<usize>,
        config: &ComponentConfig,
    ) -> Result<ComponentId> {
        let path = format!("{parent}");
        if tree.effect_list(parent)?.is_none() {
            return Err(VisualiserError::config(
                path,
                "only EffectList components can hold children",
            ));
        }
        self.build_node(tree, parent, index, config, path)
    }

    fn build_node(
        &self,
        tree: &mut ComponentTree,
        parent: ComponentId,
        index: Option<usize>,
        config: &ComponentConfig,
        path: String,
    ) -> Result<ComponentId> {
        let enabled = config.enabled.unwrap_or(true);

        let node = if config.kind == EFFECT_LIST {
            let list = EffectList {
                clear_frame: config.clear_frame.unwrap_or(false),
                input: parse_mode(config.input.as_deref(), "input", &path)?,
                output: parse_mode(config.output.as_deref(), "output", &path)?,
            };
            if !config.options.is_empty() {
                tracing::warn!(%path, "EffectList takes no options map, ignoring it");
            }
            Node::new(
                config.kind.clone(),
                config.id.clone(),
                enabled,
                Options::new(),
                NodeBody::List(list),
            )
        } else {
            let spec = self
                .registry
                .get(&config.kind)
                .ok_or_else(|| VisualiserError::UnknownComponent {
                    kind: config.kind.clone(),
                    path: path.clone(),
                })?;
            if config.components.is_some() {
                return Err(VisualiserError::config(
                    path,
                    "only EffectList components can hold children",
                ));
            }
            if config.clear_frame.is_some() || config.input.is_some() || config.output.is_some() {
                tracing::warn!(%path, "ignoring EffectList fields on a leaf component");
            }

            let options = spec
                .merge_options(&config.options)
                .map_err(|err| option_error(&path, err))?;
            let mut component = spec
                .construct(&options)
                .map_err(|err| option_error(&path, err))?;
            if let Err(err) = component.init() {
                component.destroy();
                return Err(err);
            }
            Node::new(
                config.kind.clone(),
                config.id.clone(),
                enabled,
                options,
                NodeBody::Effect(component),
            )
        };

        let id = tree.attach(parent, index, node)?;
        if let Some(children) = &config.components {
            for (i, child) in children.iter().enumerate() {
                let child_path = format!("{path}.components[{i}]");
                if let Err(err) = self.build_node(tree, id, None, child, child_path) {
                    tree.remove(id)?;
                    return Err(err);
                }
            }
        }
        Ok(id)
    }
}

fn parse_mode<T>(value: Option<&str>, field: &str, path: &str) -> Result<T>
where
    T: FromStr<Err = String> + Default,
{
    match value {
        None => Ok(T::default()),
        Some(text) => text
            .parse()
            .map_err(|message: String| VisualiserError::config(format!("{path}.{field}"), message)),
    }
}

fn option_error(path: &str, err: OptionError) -> VisualiserError {
    VisualiserError::config(format!("{path}.options.{}", err.key), err.message)
}
