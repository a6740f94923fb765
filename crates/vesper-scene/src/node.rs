use std::any::TypeId;
use std::time::Duration;

use crate::component::{Component, ComponentSet};
use crate::handle::NodeId;
use crate::scene::Scene;
use crate::watch::{WatchSet, WatchValue};

/// The lifecycle and logic hooks of a node. Implementations play the role a
/// subclass would: the scene calls these during hierarchy mutation and during
/// step/draw passes. Every hook receives the scene and may mutate it freely,
/// including removing the node itself; the scheduler revalidates liveness
/// around each call.
pub trait NodeBehavior: 'static {
    /// The node was attached under a parent.
    fn on_enter(&mut self, _scene: &mut Scene, _this: NodeId, _parent: NodeId) {}

    /// The node was detached from its parent.
    fn on_depart(&mut self, _scene: &mut Scene, _this: NodeId) {}

    /// The node is being removed. Fires exactly once, before the handle is
    /// invalidated, so `this` still resolves inside the hook.
    fn on_remove(&mut self, _scene: &mut Scene, _this: NodeId) {}

    /// Runs at the top of the node's step pass, before any component.
    fn pre_step(&mut self, _scene: &mut Scene, _this: NodeId, _dt: f32) {}

    /// The node's own step logic, after Before components and children.
    fn on_step(&mut self, _scene: &mut Scene, _this: NodeId, _dt: f32) {}

    /// Runs at the top of the node's draw pass, before any component.
    fn pre_draw(&mut self, _scene: &mut Scene, _this: NodeId) {}

    /// The node's own draw logic, after Before components and children.
    fn on_draw(&mut self, _scene: &mut Scene, _this: NodeId) {}
}

/// One live entity in the scene graph: identity, hierarchy links, component
/// buckets, watches, and pass diagnostics. All mutation goes through the
/// owning [`Scene`]; this type only exposes read access.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: Option<String>,
    pub(crate) priority: i64,
    pub(crate) step_enabled: bool,
    pub(crate) draw_enabled: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// `None` while the behavior is checked out for a callback.
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub(crate) components: ComponentSet,
    pub(crate) watches: WatchSet,
    pub(crate) last_step: Duration,
    pub(crate) last_draw: Duration,
    /// Guards against re-entrant removal while `on_remove` runs.
    pub(crate) removing: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            name: None,
            priority: 0,
            step_enabled: true,
            draw_enabled: true,
            parent: None,
            children: Vec::new(),
            behavior: None,
            components: ComponentSet::new(),
            watches: WatchSet::new(),
            last_step: Duration::ZERO,
            last_draw: Duration::ZERO,
            removing: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// The node's own step flag. See [`Scene::is_stepping`] for the effective
    /// state including ancestors.
    pub fn step_enabled(&self) -> bool {
        self.step_enabled
    }

    pub fn draw_enabled(&self) -> bool {
        self.draw_enabled
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in ascending priority order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Wall time of the node's most recent step pass.
    pub fn last_step(&self) -> Duration {
        self.last_step
    }

    /// Wall time of the node's most recent draw pass.
    pub fn last_draw(&self) -> Duration {
        self.last_draw
    }

    /// First component of type `T` in Before-then-After order, if any.
    pub fn component<T: Component>(&self) -> Option<&T> {
        let key = self.components.first_key_of(TypeId::of::<T>())?;
        self.components
            .entry(key)?
            .slot
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn has_component<T: Component>(&self) -> bool {
        self.components.first_key_of(TypeId::of::<T>()).is_some()
    }

    /// Tags of all attached components, Before bucket first.
    pub fn component_tags(&self) -> Vec<&'static str> {
        self.components.tags()
    }

    pub fn watch(&self, name: &str) -> Option<&WatchValue> {
        self.watches.get(name)
    }

    /// Watches in first-insertion order.
    pub fn watches(&self) -> impl Iterator<Item = (&str, &WatchValue)> {
        self.watches.iter()
    }
}
