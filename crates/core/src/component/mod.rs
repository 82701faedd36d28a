//! The component tree.
//!
//! Nodes live in an arena addressed by [`ComponentId`]; each node stores its
//! parent handle and ordered child handles. Leaf effects implement
//! [`Component`]. EffectList containers are interpreted by the tree itself,
//! since drawing them means recursing into the arena.

mod loader;
mod options;
mod registry;

pub use loader::PresetLoader;
pub use options::{
    blend_value, bool_value, color_value, get_blend, get_bool, get_color, get_str, get_u32,
    str_value, u32_value, OptionError, OptionResult,
};
pub use registry::{ComponentRegistry, ComponentSpec, Constructor, UnknownOptions};

use std::fmt;

use serde_json::Value;

use crate::blend::{blend_into, BlendMode, InputMode};
use crate::buffers::NamedBufferStore;
use crate::pool::SurfacePool;
use crate::preset::{ComponentConfig, Options, PresetConfig, ResourceConfig};
use crate::registers::RegisterBank;
use crate::surface::Surface;
use crate::{AnalysisFrame, Result, VisualiserError};

pub const EFFECT_LIST: &str = "EffectList";

/// Everything a component may touch while drawing one tick.
pub struct DrawContext<'a> {
    pub pool: &'a mut SurfacePool,
    pub buffers: &'a mut NamedBufferStore,
    pub registers: &'a mut RegisterBank,
    pub analysis: &'a AnalysisFrame,
    /// Monotonic tick counter, starting at zero for a freshly loaded preset.
    pub tick: u64,
}

/// A leaf render effect.
pub trait Component {
    /// Called once right after construction.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Draws into `frame`. Any surface acquired from `ctx.pool` must be
    /// released before returning, on the error path too.
    fn draw(&mut self, ctx: &mut DrawContext<'_>, frame: &mut Surface) -> Result<()>;

    /// Applies a changed option. Runs before the next draw.
    fn update_option(&mut self, key: &str, value: &Value) -> OptionResult<()>;

    /// Releases persistent state. Called once, after all children are gone.
    fn destroy(&mut self) {}
}

/// Handle into the tree arena. Slots are reused after removal; the
/// generation keeps a handle to a removed node from reaching its successor.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    index: u32,
    generation: u32,
}

impl ComponentId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Composition settings of an EffectList.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectList {
    /// Only observable on the root, where it clears the canvas each tick.
    /// Nested lists always seed their working surface from `input`.
    pub clear_frame: bool,
    pub input: InputMode,
    pub output: BlendMode,
}

pub(crate) enum NodeBody {
    List(EffectList),
    Effect(Box<dyn Component>),
}

pub(crate) struct Node {
    kind: String,
    user_id: Option<String>,
    enabled: bool,
    options: Options,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
    body: NodeBody,
}

impl Node {
    pub(crate) fn new(
        kind: String,
        user_id: Option<String>,
        enabled: bool,
        options: Options,
        body: NodeBody,
    ) -> Self {
        Self {
            kind,
            user_id,
            enabled,
            options,
            parent: None,
            children: Vec::new(),
            body,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed tree of components for one loaded preset.
pub struct ComponentTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ComponentId,
    resources: ResourceConfig,
    meta: Options,
}

impl ComponentTree {
    pub(crate) fn new(clear_frame: bool, resources: ResourceConfig, meta: Options) -> Self {
        let root = Node::new(
            EFFECT_LIST.to_string(),
            None,
            true,
            Options::new(),
            NodeBody::List(EffectList {
                clear_frame,
                input: InputMode::Replace,
                output: BlendMode::Replace,
            }),
        );
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: ComponentId {
                index: 0,
                generation: 0,
            },
            resources,
            meta,
        }
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resources(&self) -> &ResourceConfig {
        &self.resources
    }

    /// Whether the canvas is cleared before every tick.
    pub fn clears_frame(&self) -> bool {
        matches!(
            self.node(self.root).map(|n| &n.body),
            Ok(NodeBody::List(EffectList {
                clear_frame: true,
                ..
            }))
        )
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.node(id).is_ok()
    }

    pub fn parent(&self, id: ComponentId) -> Result<Option<ComponentId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: ComponentId) -> Result<&[ComponentId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn kind(&self, id: ComponentId) -> Result<&str> {
        Ok(&self.node(id)?.kind)
    }

    pub fn options(&self, id: ComponentId) -> Result<&Options> {
        Ok(&self.node(id)?.options)
    }

    pub fn is_enabled(&self, id: ComponentId) -> Result<bool> {
        Ok(self.node(id)?.enabled)
    }

    pub fn effect_list(&self, id: ComponentId) -> Result<Option<EffectList>> {
        match &self.node(id)?.body {
            NodeBody::List(list) => Ok(Some(*list)),
            NodeBody::Effect(_) => Ok(None),
        }
    }

    /// First node, in depth-first declaration order, carrying the user id.
    pub fn find_by_user_id(&self, user_id: &str) -> Option<ComponentId> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id).ok()?;
            if node.user_id.as_deref() == Some(user_id) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// A disabled node is skipped together with its whole subtree. Nothing
    /// is destroyed or reinitialised.
    pub fn set_enabled(&mut self, id: ComponentId, enabled: bool) -> Result<()> {
        self.node_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Assigns one option and runs the component's update handler. EffectLists
    /// accept `clearFrame`, `input` and `output`.
    pub fn set_option(&mut self, id: ComponentId, key: &str, value: Value) -> Result<()> {
        let root = self.root;
        let node = self.node_mut(id)?;
        let applied = match &mut node.body {
            NodeBody::List(list) => match key {
                "clearFrame" => bool_value(key, &value).map(|v| list.clear_frame = v),
                "input" if id != root => str_value(key, &value)
                    .and_then(|s| s.parse::<InputMode>().map_err(|m: String| OptionError::new(key, m)))
                    .map(|v| list.input = v),
                "output" if id != root => blend_value(key, &value).map(|v| list.output = v),
                _ => Err(OptionError::unknown(key)),
            },
            NodeBody::Effect(component) => component.update_option(key, &value),
        };
        applied.map_err(|err| VisualiserError::config(format!("{id}"), err.to_string()))?;

        if matches!(node.body, NodeBody::Effect(_)) {
            node.options.insert(key.to_string(), value);
        }
        Ok(())
    }

    pub(crate) fn attach(
        &mut self,
        parent: ComponentId,
        index: Option<usize>,
        mut node: Node,
    ) -> Result<ComponentId> {
        if !matches!(self.node(parent)?.body, NodeBody::List(_)) {
            return Err(VisualiserError::config(
                format!("{parent}"),
                "only EffectList components can hold children",
            ));
        }
        node.parent = Some(parent);

        let slot_index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                self.slots.len() as u32 - 1
            }
        };
        let slot = &mut self.slots[slot_index as usize];
        slot.node = Some(node);
        let id = ComponentId {
            index: slot_index,
            generation: slot.generation,
        };

        let siblings = &mut self.node_mut(parent)?.children;
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, id);
        Ok(id)
    }

    /// Detaches and destroys a subtree, children before parents.
    pub fn remove(&mut self, id: ComponentId) -> Result<()> {
        if id == self.root {
            return Err(VisualiserError::msg("the root EffectList cannot be removed"));
        }
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|&child| child != id);
        }
        self.destroy_subtree(id);
        Ok(())
    }

    /// Destroys every node, root included. Idempotent.
    pub fn destroy(&mut self) {
        if self.contains(self.root) {
            tracing::debug!(nodes = self.len(), "destroying component tree");
            self.destroy_subtree(self.root);
        }
    }

    fn destroy_subtree(&mut self, id: ComponentId) {
        let Some(slot) = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
        else {
            return;
        };
        let Some(mut node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        for &child in &node.children {
            self.destroy_subtree(child);
        }
        if let NodeBody::Effect(component) = &mut node.body {
            component.destroy();
        }
        self.free.push(id.index);
    }

    /// Draws one tick of the whole tree into the canvas frame.
    pub fn draw(&mut self, ctx: &mut DrawContext<'_>, frame: &mut Surface) -> Result<()> {
        // The root composes straight into the canvas.
        self.draw_children(self.root, ctx, frame)
    }

    fn draw_node(
        &mut self,
        id: ComponentId,
        ctx: &mut DrawContext<'_>,
        frame: &mut Surface,
    ) -> Result<()> {
        let list = {
            let node = self.node_mut(id)?;
            if !node.enabled {
                return Ok(());
            }
            match &mut node.body {
                NodeBody::Effect(component) => return component.draw(ctx, frame),
                NodeBody::List(list) => *list,
            }
        };

        let mut working = ctx.pool.acquire()?;
        let drawn = self.compose_list(id, list, ctx, frame, &mut working);
        let released = ctx.pool.release(working);
        drawn.and(released)
    }

    fn compose_list(
        &mut self,
        id: ComponentId,
        list: EffectList,
        ctx: &mut DrawContext<'_>,
        frame: &mut Surface,
        working: &mut Surface,
    ) -> Result<()> {
        match list.input {
            InputMode::Replace => working.copy_from(frame)?,
            InputMode::Ignore => working.clear(),
        }
        self.draw_children(id, ctx, working)?;
        blend_into(list.output, working, frame)
    }

    fn draw_children(
        &mut self,
        id: ComponentId,
        ctx: &mut DrawContext<'_>,
        frame: &mut Surface,
    ) -> Result<()> {
        let count = self.node(id)?.children.len();
        for i in 0..count {
            let child = self.node(id)?.children[i];
            self.draw_node(child, ctx, frame)?;
        }
        Ok(())
    }

    /// Serializes the whole tree, resources and metadata included.
    pub fn to_config(&self) -> Result<PresetConfig> {
        let root = self.node(self.root)?;
        let components = root
            .children
            .iter()
            .map(|&child| self.component_config(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(PresetConfig {
            clear_frame: self.clears_frame(),
            components,
            resources: self.resources.clone(),
            meta: self.meta.clone(),
        })
    }

    /// Serializes one subtree with every option spelled out.
    pub fn component_config(&self, id: ComponentId) -> Result<ComponentConfig> {
        let node = self.node(id)?;
        let mut config = ComponentConfig::new(node.kind.clone());
        config.id = node.user_id.clone();
        config.enabled = Some(node.enabled);
        config.options = node.options.clone();

        if let NodeBody::List(list) = &node.body {
            config.clear_frame = Some(list.clear_frame);
            config.input = Some(list.input.to_string());
            config.output = Some(list.output.to_string());
            config.components = Some(
                node.children
                    .iter()
                    .map(|&child| self.component_config(child))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        Ok(config)
    }

    fn node(&self, id: ComponentId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(VisualiserError::UnknownNode(id.index))
    }

    fn node_mut(&mut self, id: ComponentId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(VisualiserError::UnknownNode(id.index))
    }
}

impl Drop for ComponentTree {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTree")
            .field("nodes", &self.len())
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::pool::SurfacePoolOpts;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: String,
        log: Log,
    }

    impl Component for Recorder {
        fn draw(&mut self, _ctx: &mut DrawContext<'_>, _frame: &mut Surface) -> Result<()> {
            self.log.borrow_mut().push(format!("draw:{}", self.name));
            Ok(())
        }

        fn update_option(&mut self, key: &str, value: &Value) -> OptionResult<()> {
            match key {
                "name" => {
                    self.name = str_value(key, value)?.to_string();
                    Ok(())
                }
                _ => Err(OptionError::unknown(key)),
            }
        }

        fn destroy(&mut self) {
            self.log.borrow_mut().push(format!("destroy:{}", self.name));
        }
    }

    fn registry(log: &Log) -> ComponentRegistry {
        let log = log.clone();
        let mut registry = ComponentRegistry::with_builtins();
        registry
            .register(
                ComponentSpec::new("Recorder", move |options| {
                    Ok(Box::new(Recorder {
                        name: get_str(options, "name")?.to_string(),
                        log: log.clone(),
                    }) as Box<dyn Component>)
                })
                .with_default("name", "recorder"),
            )
            .unwrap();
        registry
    }

    fn recorder(name: &str) -> ComponentConfig {
        ComponentConfig::new("Recorder").with_option("name", name)
    }

    fn list(children: Vec<ComponentConfig>) -> ComponentConfig {
        ComponentConfig::new(EFFECT_LIST).with_components(children)
    }

    fn preset(components: Vec<ComponentConfig>) -> PresetConfig {
        PresetConfig {
            components,
            ..PresetConfig::default()
        }
    }

    fn draw(tree: &mut ComponentTree) {
        let mut pool = SurfacePool::new(SurfacePoolOpts::default(), 2, 2);
        let mut buffers = NamedBufferStore::new();
        let mut registers = RegisterBank::new();
        let analysis = AnalysisFrame::silent();
        let mut ctx = DrawContext {
            pool: &mut pool,
            buffers: &mut buffers,
            registers: &mut registers,
            analysis: &analysis,
            tick: 0,
        };
        let mut frame = Surface::new(2, 2);
        tree.draw(&mut ctx, &mut frame).unwrap();
        pool.finish_tick().unwrap();
    }

    #[test]
    fn draws_depth_first_in_declaration_order() {
        let log = Log::default();
        let registry = registry(&log);
        let mut tree = PresetLoader::new(&registry)
            .build(&preset(vec![
                list(vec![recorder("a"), list(vec![recorder("b")])]),
                recorder("c"),
            ]))
            .unwrap();

        draw(&mut tree);
        assert_eq!(*log.borrow(), ["draw:a", "draw:b", "draw:c"]);
    }

    #[test]
    fn destroy_runs_once_per_component() {
        let log = Log::default();
        let registry = registry(&log);
        let mut tree = PresetLoader::new(&registry)
            .build(&preset(vec![list(vec![recorder("a"), list(vec![recorder("b")])]), recorder("c")]))
            .unwrap();

        tree.destroy();
        tree.destroy();
        drop(tree);
        assert_eq!(*log.borrow(), ["destroy:a", "destroy:b", "destroy:c"]);
    }

    #[test]
    fn disabled_subtree_is_skipped_but_kept() {
        let log = Log::default();
        let registry = registry(&log);
        let mut outer = list(vec![recorder("a")]);
        outer.id = Some("outer".to_string());
        let mut tree = PresetLoader::new(&registry)
            .build(&preset(vec![outer, recorder("b")]))
            .unwrap();

        let outer = tree.find_by_user_id("outer").unwrap();
        tree.set_enabled(outer, false).unwrap();
        draw(&mut tree);
        assert_eq!(*log.borrow(), ["draw:b"]);

        tree.set_enabled(outer, true).unwrap();
        draw(&mut tree);
        assert_eq!(*log.borrow(), ["draw:b", "draw:a", "draw:b"]);
    }

    #[test]
    fn unknown_type_reports_its_path() {
        let log = Log::default();
        let registry = registry(&log);
        let err = PresetLoader::new(&registry)
            .build(&preset(vec![
                recorder("a"),
                list(vec![ComponentConfig::new("Nope")]),
            ]))
            .unwrap_err();

        match err {
            VisualiserError::UnknownComponent { kind, path } => {
                assert_eq!(kind, "Nope");
                assert_eq!(path, "components[1].components[0]");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*log.borrow(), ["destroy:a"]);
    }

    #[test]
    fn leaf_with_children_is_rejected() {
        let log = Log::default();
        let registry = registry(&log);
        let err = PresetLoader::new(&registry)
            .build(&preset(vec![recorder("a").with_components(vec![recorder("b")])]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn bad_blend_mode_is_a_config_error() {
        let registry = ComponentRegistry::with_builtins();
        let mut bad = list(Vec::new());
        bad.output = Some("SCREEN".to_string());
        let err = PresetLoader::new(&registry)
            .build(&preset(vec![bad]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn serialized_tree_rebuilds_identically() {
        let log = Log::default();
        let registry = registry(&log);
        let mut inner = list(vec![recorder("b")]);
        inner.input = Some("IGNORE".to_string());
        inner.output = Some("ADDITIVE".to_string());
        let config = preset(vec![
            ComponentConfig::new("ClearScreen").with_option("color", "#ff0000"),
            inner,
            recorder("c"),
        ]);

        let first = PresetLoader::new(&registry).build(&config).unwrap().to_config().unwrap();
        let second = PresetLoader::new(&registry).build(&first).unwrap().to_config().unwrap();
        assert_eq!(first, second);

        let inner = &first.components[1];
        assert_eq!(inner.input.as_deref(), Some("IGNORE"));
        assert_eq!(inner.output.as_deref(), Some("ADDITIVE"));
        assert_eq!(first.components[0].options["blendMode"], json!("REPLACE"));
    }

    #[test]
    fn set_option_reaches_lists_and_effects() {
        let log = Log::default();
        let registry = registry(&log);
        let mut tree = PresetLoader::new(&registry)
            .build(&preset(vec![list(vec![recorder("a")])]))
            .unwrap();
        let root = tree.root();
        let inner = tree.children(root).unwrap()[0];
        let leaf = tree.children(inner).unwrap()[0];

        tree.set_option(inner, "output", json!("MULTIPLY")).unwrap();
        assert_eq!(tree.effect_list(inner).unwrap().unwrap().output, BlendMode::Multiply);
        assert!(tree.set_option(root, "input", json!("IGNORE")).is_err());
        tree.set_option(root, "clearFrame", json!(true)).unwrap();
        assert!(tree.clears_frame());

        tree.set_option(leaf, "name", json!("renamed")).unwrap();
        assert_eq!(tree.options(leaf).unwrap()["name"], json!("renamed"));
        assert!(tree.set_option(leaf, "bogus", json!(1)).is_err());

        draw(&mut tree);
        assert_eq!(*log.borrow(), ["draw:renamed"]);
    }

    #[test]
    fn insert_and_remove_subtrees() {
        let log = Log::default();
        let registry = registry(&log);
        let loader = PresetLoader::new(&registry);
        let mut tree = loader.build(&preset(vec![recorder("b")])).unwrap();
        let root = tree.root();

        let first = loader.insert(&mut tree, root, Some(0), &recorder("a")).unwrap();
        let last = loader
            .insert(&mut tree, root, None, &list(vec![recorder("c")]))
            .unwrap();
        assert_eq!(tree.children(root).unwrap()[0], first);
        assert_eq!(tree.parent(last).unwrap(), Some(root));
        assert!(loader.insert(&mut tree, first, None, &recorder("x")).is_err());

        tree.remove(last).unwrap();
        assert!(!tree.contains(last));
        assert_eq!(tree.len(), 3);
        assert!(tree.remove(root).is_err());

        draw(&mut tree);
        assert_eq!(*log.borrow(), ["destroy:c", "draw:a", "draw:b"]);
    }

    #[test]
    fn removed_handles_stay_dead_after_slot_reuse() {
        let log = Log::default();
        let registry = registry(&log);
        let loader = PresetLoader::new(&registry);
        let mut tree = loader.build(&preset(vec![recorder("a")])).unwrap();
        let root = tree.root();
        let old = tree.children(root).unwrap()[0];

        tree.remove(old).unwrap();
        let new = loader.insert(&mut tree, root, None, &recorder("b")).unwrap();

        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(!tree.contains(old));
        assert!(tree.contains(new));
        assert!(matches!(tree.kind(old), Err(VisualiserError::UnknownNode(_))));
        assert!(tree.set_enabled(old, false).is_err());
        assert!(tree.remove(old).is_err());
        assert!(tree.is_enabled(new).unwrap());
        assert_eq!(*log.borrow(), ["destroy:a"]);
    }
}
