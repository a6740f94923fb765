use std::any::TypeId;
use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::component::{Component, Timing};
use crate::error::TokenError;
use crate::handle::{NodeId, SlotAllocator};
use crate::limbo::Limbo;
use crate::node::{Node, NodeBehavior};
use crate::watch::WatchValue;

/// Which traversal a pass runs. The two are structurally identical; step
/// drives simulation hooks, draw drives rendering hooks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Step,
    Draw,
}

/// The scene graph: owns every node slot, the deferred-reclaim queue, and the
/// global name index. All hierarchy mutation and scheduling goes through this
/// type, on a single thread.
///
/// Mutators are tolerant by contract: invalid handles and structural misuse
/// (self-attach, double removal, detaching a non-child) are silent no-ops.
/// Nodes are frequently destroyed out from under long-lived handles; callers
/// check [`Scene::is_alive`] rather than handling errors.
pub struct Scene {
    run: Uuid,
    allocator: SlotAllocator,
    slots: Vec<Option<Node>>,
    limbo: Limbo,
    names: HashMap<String, Vec<NodeId>>,
}

impl Scene {
    pub fn new() -> Self {
        let run = Uuid::new_v4();
        info!("Scene created (run {})", run.simple());
        Self {
            run,
            allocator: SlotAllocator::new(),
            slots: Vec::new(),
            limbo: Limbo::new(),
            names: HashMap::new(),
        }
    }

    /// Identifier of this scene run. Tokens embed it so they fail closed
    /// across runs.
    pub fn run_id(&self) -> Uuid {
        self.run
    }

    // ---- Node lifecycle ----

    /// Create a node with no behavior, no parent, priority 0, both flags set.
    pub fn spawn(&mut self) -> NodeId {
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        debug_assert!(self.slots[idx].is_none());
        self.slots[idx] = Some(Node::new(id));
        trace!("spawned {}", id);
        id
    }

    /// Create a node with the given behavior.
    pub fn spawn_with(&mut self, behavior: impl NodeBehavior) -> NodeId {
        let id = self.spawn();
        if let Some(node) = self.node_mut(id) {
            node.behavior = Some(Box::new(behavior));
        }
        id
    }

    /// Create a node and attach it under `parent`.
    pub fn spawn_child(&mut self, parent: NodeId) -> NodeId {
        let id = self.spawn();
        self.attach(parent, id);
        id
    }

    /// Create a node with the given behavior and attach it under `parent`.
    pub fn spawn_child_with(&mut self, parent: NodeId, behavior: impl NodeBehavior) -> NodeId {
        let id = self.spawn_with(behavior);
        self.attach(parent, id);
        id
    }

    /// Remove a node and its whole subtree. Idempotent. The removal is
    /// logically immediate — `is_alive` flips before this returns — while the
    /// slot payload (behavior, components, watches) is dropped at the next
    /// reclaim point, never inside this call.
    ///
    /// Fires `on_remove` once, then removes children recursively, detaches
    /// from the parent, and retires the node from the name index. If a node
    /// removes itself from inside one of its own behavior hooks, that hook is
    /// the removal's initiator and `on_remove` is not re-entered.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        match self.payload_mut(id) {
            Some(node) if !node.removing => node.removing = true,
            _ => return,
        }
        debug!("removing {}", id);

        self.run_hook(id, |b, s, this| b.on_remove(s, this));

        let kids = self
            .payload(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for kid in kids {
            self.remove(kid);
        }

        if let Some(parent) = self.payload(id).and_then(|n| n.parent) {
            self.detach(parent, id);
        }

        if let Some(name) = self.payload(id).and_then(|n| n.name.clone()) {
            if let Some(ids) = self.names.get_mut(&name) {
                ids.retain(|&n| n != id);
                if ids.is_empty() {
                    self.names.remove(&name);
                }
            }
        }

        if self.allocator.retire(id) {
            self.limbo.defer(id.index());
        }
    }

    /// Drop the payloads of all removed nodes and return their slots to
    /// circulation. Runs automatically at the start of a root step/draw pass
    /// and before global enumeration.
    pub fn flush(&mut self) {
        let mut reclaimed = 0usize;
        while let Some(index) = self.limbo.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.take();
            }
            self.allocator.reclaim(index);
            reclaimed += 1;
        }
        if reclaimed > 0 {
            trace!("reclaimed {} node slot(s)", reclaimed);
        }
    }

    // ---- Access ----

    /// Whether `id` refers to a live node. Flips to `false` the moment the
    /// node is removed and never flips back.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Resolve a handle to its node. Returns `None` for removed nodes, never
    /// a stale view.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    /// Slot payload lookup that also reaches removed-but-unreclaimed nodes.
    /// The payload id check keeps a reused slot from masquerading as its
    /// previous occupant.
    fn payload(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index() as usize)?
            .as_ref()
            .filter(|n| n.id == id)
    }

    fn payload_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index() as usize)?
            .as_mut()
            .filter(|n| n.id == id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.allocator.live()
    }

    pub fn is_empty(&self) -> bool {
        self.allocator.live() == 0
    }

    /// Every live node, lowest slot index first. Flushes the reclaimer first
    /// so recently-removed nodes never appear.
    pub fn nodes(&mut self) -> Vec<NodeId> {
        self.flush();
        self.live_ids()
    }

    pub(crate) fn live_ids(&self) -> Vec<NodeId> {
        (0..self.allocator.slot_count() as u32)
            .filter(|&i| self.allocator.alive[i as usize])
            .map(|i| NodeId::from_raw(i, self.allocator.generations[i as usize]))
            .collect()
    }

    // ---- Hierarchy ----

    /// Move `child` under `parent`, detaching it from any current parent
    /// first. The child is inserted at the position matching its priority;
    /// among equal priorities the newcomer goes last (insertion order —
    /// callers may not rely on any other tie order). Fires `on_enter` on the
    /// child. No-ops: dead handles, self-attach, attaching an ancestor under
    /// its own descendant, re-attaching to the same parent.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.is_alive(parent) || !self.is_alive(child) {
            return;
        }
        if self.node(child).and_then(|n| n.parent) == Some(parent) {
            return;
        }
        if self.is_ancestor(child, parent) {
            return;
        }
        if let Some(old) = self.node(child).and_then(|n| n.parent) {
            self.detach(old, child);
            // on_depart ran arbitrary code; re-validate before linking.
            if !self.is_alive(parent) || !self.is_alive(child) {
                return;
            }
        }

        let priority = match self.node(child) {
            Some(n) => n.priority,
            None => return,
        };
        let pos = {
            let Some(pnode) = self.node(parent) else { return };
            pnode.children.partition_point(|&k| {
                self.node(k).map(|n| n.priority).unwrap_or(i64::MIN) <= priority
            })
        };
        if let Some(pnode) = self.node_mut(parent) {
            pnode.children.insert(pos, child);
        }
        if let Some(cnode) = self.node_mut(child) {
            cnode.parent = Some(parent);
        }
        self.run_hook(child, |b, s, this| b.on_enter(s, this, parent));
    }

    /// Detach `child` from `parent`. No-op unless the child is currently
    /// parented there. Fires `on_depart` on the child. Safe to call from
    /// within an active traversal of the same child list.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return;
        }
        if self.node(child).and_then(|n| n.parent) != Some(parent) {
            return;
        }
        if let Some(pnode) = self.node_mut(parent) {
            pnode.children.retain(|&k| k != child);
        }
        if let Some(cnode) = self.node_mut(child) {
            cnode.parent = None;
        }
        self.run_hook(child, |b, s, this| b.on_depart(s, this));
    }

    /// Whether `a` is an ancestor of `b`.
    fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        let mut cur = self.node(b).and_then(|n| n.parent);
        while let Some(p) = cur {
            if p == a {
                return true;
            }
            cur = self.node(p).and_then(|n| n.parent);
        }
        false
    }

    /// Reassign a node's priority. If parented, the node is repositioned in
    /// its parent's child list; a pure reorder fires no lifecycle hooks. If
    /// unparented, the value simply applies at the next attach.
    pub fn set_priority(&mut self, id: NodeId, priority: i64) {
        let parent = match self.node_mut(id) {
            Some(node) => {
                node.priority = priority;
                node.parent
            }
            None => return,
        };
        let Some(parent) = parent else { return };
        if let Some(pnode) = self.node_mut(parent) {
            pnode.children.retain(|&k| k != id);
        }
        let pos = {
            let Some(pnode) = self.node(parent) else { return };
            pnode.children.partition_point(|&k| {
                self.node(k).map(|n| n.priority).unwrap_or(i64::MIN) <= priority
            })
        };
        if let Some(pnode) = self.node_mut(parent) {
            pnode.children.insert(pos, id);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// The node's children in ascending priority order. Empty for dead ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Flatten the whole subtree below `id`, depth first: each child appears
    /// before its own subtree, children in priority order within each level.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else { return };
        for &child in &node.children {
            if self.is_alive(child) {
                out.push(child);
                self.collect_subtree(child, out);
            }
        }
    }

    // ---- Names ----

    /// Assign a debug name. The first assignment wins: renaming an already
    /// named node is a silent no-op, so subsystems can rely on names being
    /// stable after first assignment.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        let name = name.into();
        let Some(node) = self.node_mut(id) else { return };
        if node.name.is_some() {
            return;
        }
        node.name = Some(name.clone());
        self.names.entry(name).or_default().push(id);
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.name())
    }

    /// All descendants of `root` whose name matches exactly (case sensitive).
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.node(id).and_then(|n| n.name()) == Some(name))
            .collect()
    }

    /// All live nodes anywhere in the scene with this exact name.
    pub fn find_all_by_name(&self, name: &str) -> Vec<NodeId> {
        self.names
            .get(name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.is_alive(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ---- Flags ----

    pub fn set_step_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.node_mut(id) {
            node.step_enabled = enabled;
        }
    }

    pub fn set_draw_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.node_mut(id) {
            node.draw_enabled = enabled;
        }
    }

    /// Effective step state: true only if this node and every ancestor has
    /// its step flag set. False for dead ids.
    pub fn is_stepping(&self, id: NodeId) -> bool {
        self.effective_flag(id, Pass::Step)
    }

    /// Effective draw state, mirroring [`Scene::is_stepping`].
    pub fn is_drawing(&self, id: NodeId) -> bool {
        self.effective_flag(id, Pass::Draw)
    }

    fn effective_flag(&self, id: NodeId, pass: Pass) -> bool {
        let mut cur = Some(id);
        while let Some(at) = cur {
            match self.node(at) {
                Some(node) => {
                    let enabled = match pass {
                        Pass::Step => node.step_enabled,
                        Pass::Draw => node.draw_enabled,
                    };
                    if !enabled {
                        return false;
                    }
                    cur = node.parent;
                }
                None => return false,
            }
        }
        true
    }

    // ---- Components ----

    /// Attach a component to a node in the given bucket and notify it of its
    /// host. Components in the Before bucket run ahead of the node's own
    /// hooks and children; After components run behind them. Within a bucket,
    /// insertion order.
    pub fn add_component(&mut self, id: NodeId, timing: Timing, component: impl Component) {
        let Some(node) = self.node_mut(id) else { return };
        let key = node.components.insert(timing, Box::new(component));
        if let Some(entry) = node.components.entry_mut(key) {
            if let Some(comp) = entry.slot.as_mut() {
                comp.on_attach(id);
            }
        }
    }

    /// Remove the first component with this tag, Before bucket first. Fires
    /// `on_detach` and returns the component; ownership reverts to the
    /// caller, nothing is dropped here.
    pub fn remove_component(&mut self, id: NodeId, tag: &str) -> Option<Box<dyn Component>> {
        let node = self.node_mut(id)?;
        let mut comp = node.components.remove_by_tag(tag)?;
        comp.on_detach();
        Some(comp)
    }

    /// Typed variant of [`Scene::remove_component`].
    pub fn remove_component_of<T: Component>(&mut self, id: NodeId) -> Option<Box<dyn Component>> {
        let node = self.node_mut(id)?;
        let mut comp = node.components.remove_by_type(TypeId::of::<T>())?;
        comp.on_detach();
        Some(comp)
    }

    /// First component of type `T` on the node, in Before-then-After order.
    /// Further components of the same type are reachable only by tag removal.
    pub fn component_ref<T: Component>(&self, id: NodeId) -> Option<&T> {
        self.node(id)?.component::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, id: NodeId) -> Option<&mut T> {
        let node = self.node_mut(id)?;
        let key = node.components.first_key_of(TypeId::of::<T>())?;
        node.components
            .entry_mut(key)?
            .slot
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn has_component<T: Component>(&self, id: NodeId) -> bool {
        self.node(id)
            .map(|n| n.has_component::<T>())
            .unwrap_or(false)
    }

    // ---- Watches ----

    /// Upsert a named debug value on a node.
    pub fn set_watch(&mut self, id: NodeId, name: &str, value: impl Into<WatchValue>) {
        if let Some(node) = self.node_mut(id) {
            node.watches.set(name, value.into());
        }
    }

    pub fn watch(&self, id: NodeId, name: &str) -> Option<&WatchValue> {
        self.node(id).and_then(|n| n.watch(name))
    }

    // ---- Tokens ----

    /// Stable textual form of a handle, round-trippable within this run.
    pub fn token(&self, id: NodeId) -> String {
        format!(
            "n{}v{}@{}",
            id.index(),
            id.generation(),
            self.run.simple()
        )
    }

    /// Parse a token minted by [`Scene::token`]. Fails closed: tokens from a
    /// different run or naming a handle this run never minted are rejected.
    /// A token for a removed node parses fine — the returned handle simply
    /// reads as dead.
    pub fn resolve_token(&self, token: &str) -> Result<NodeId, TokenError> {
        let malformed = || TokenError::Malformed(token.to_string());
        let rest = token.strip_prefix('n').ok_or_else(malformed)?;
        let (index_str, rest) = rest.split_once('v').ok_or_else(malformed)?;
        let (gen_str, run_str) = rest.split_once('@').ok_or_else(malformed)?;
        let index: u32 = index_str.parse().map_err(|_| malformed())?;
        let generation: u32 = gen_str.parse().map_err(|_| malformed())?;
        let run = Uuid::parse_str(run_str).map_err(|_| malformed())?;
        if run != self.run {
            return Err(TokenError::ForeignRun(token.to_string()));
        }
        let id = NodeId::from_raw(index, generation);
        if !self.allocator.minted(id) {
            return Err(TokenError::Unknown(token.to_string()));
        }
        Ok(id)
    }

    // ---- Scheduling ----

    /// Run a step pass over `id` and its subtree. When entered through a
    /// parentless node this first drains the reclaim queue, which is the
    /// only point where removed nodes are physically dropped during
    /// scheduling. A dead handle is a guarded no-op.
    pub fn step(&mut self, id: NodeId, dt: f32) {
        if self.node(id).map(|n| n.parent.is_none()).unwrap_or(false) {
            self.flush();
        }
        self.run_pass(id, Pass::Step, dt);
    }

    /// Run a draw pass over `id` and its subtree. Mirrors [`Scene::step`].
    pub fn draw(&mut self, id: NodeId) {
        if self.node(id).map(|n| n.parent.is_none()).unwrap_or(false) {
            self.flush();
        }
        self.run_pass(id, Pass::Draw, 0.0);
    }

    /// One node's pass: pre hook, Before components, children (snapshotted,
    /// each revalidated), own hook, After components, elapsed time. The
    /// node's liveness is re-checked at every stage boundary — any callback
    /// may have removed it — and the pass aborts the moment it reads dead.
    /// Mutations of the child list during the pass affect the next pass, not
    /// the in-progress snapshot.
    fn run_pass(&mut self, id: NodeId, pass: Pass, dt: f32) {
        let enabled = match self.node(id) {
            Some(node) => match pass {
                Pass::Step => node.step_enabled,
                Pass::Draw => node.draw_enabled,
            },
            None => return,
        };
        if !enabled {
            return;
        }
        let started = Instant::now();

        // Child list snapshot, taken before any callback runs: children
        // added during this pass run next pass, children removed during it
        // are skipped by the per-child liveness re-check below.
        let kids = match self.node(id) {
            Some(node) => node.children.clone(),
            None => return,
        };

        self.run_hook(id, |b, s, this| match pass {
            Pass::Step => b.pre_step(s, this, dt),
            Pass::Draw => b.pre_draw(s, this),
        });
        if !self.is_alive(id) {
            return;
        }

        self.run_bucket(id, Timing::Before, pass, dt);
        if !self.is_alive(id) {
            return;
        }

        for kid in kids {
            if self.is_alive(kid) {
                self.run_pass(kid, pass, dt);
            }
        }
        if !self.is_alive(id) {
            return;
        }

        self.run_hook(id, |b, s, this| match pass {
            Pass::Step => b.on_step(s, this, dt),
            Pass::Draw => b.on_draw(s, this),
        });
        if !self.is_alive(id) {
            return;
        }

        self.run_bucket(id, Timing::After, pass, dt);

        if let Some(node) = self.node_mut(id) {
            let elapsed = started.elapsed();
            match pass {
                Pass::Step => node.last_step = elapsed,
                Pass::Draw => node.last_draw = elapsed,
            }
        }
    }

    /// Check the node's behavior out of its slot, run `f` with the scene,
    /// and restore it. The checkout is what makes it safe for the hook to
    /// mutate the scene arbitrarily — including removing its own node. If
    /// the slot was physically reclaimed while the hook ran, the box is
    /// dropped here instead of restored.
    fn run_hook<F>(&mut self, id: NodeId, f: F)
    where
        F: FnOnce(&mut dyn NodeBehavior, &mut Scene, NodeId),
    {
        let Some(mut behavior) = self.payload_mut(id).and_then(|n| n.behavior.take()) else {
            return;
        };
        f(behavior.as_mut(), self, id);
        if let Some(node) = self.payload_mut(id) {
            node.behavior = Some(behavior);
        }
    }

    /// Run one bucket of a node's components, in insertion order, each
    /// checked out for the duration of its callback. The key snapshot means
    /// components added during the bucket run next pass; removed ones are
    /// skipped. Aborts when the host dies mid-bucket.
    fn run_bucket(&mut self, id: NodeId, timing: Timing, pass: Pass, dt: f32) {
        let keys = match self.node(id) {
            Some(node) => node.components.keys(timing),
            None => return,
        };
        for key in keys {
            if !self.is_alive(id) {
                return;
            }
            let Some(mut comp) = self.take_component(id, key) else {
                continue;
            };
            match pass {
                Pass::Step => comp.step(self, id, dt),
                Pass::Draw => comp.draw(self, id),
            }
            self.restore_component(id, key, comp);
        }
    }

    fn take_component(&mut self, id: NodeId, key: u64) -> Option<Box<dyn Component>> {
        let entry = self.payload_mut(id)?.components.entry_mut(key)?;
        if !entry.slot.as_ref().map(|c| c.active()).unwrap_or(false) {
            return None;
        }
        entry.slot.take()
    }

    fn restore_component(&mut self, id: NodeId, key: u64, comp: Box<dyn Component>) {
        if let Some(node) = self.payload_mut(id) {
            if let Some(entry) = node.components.entry_mut(key) {
                if entry.slot.is_none() {
                    entry.slot = Some(comp);
                }
                return;
            }
        }
        // Entry vanished while the component ran (it removed itself, or the
        // slot was reclaimed): ownership ends here and the box drops.
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
