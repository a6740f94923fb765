use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::handle::NodeId;
use crate::scene::Scene;
use crate::watch::WatchValue;

/// Serializable snapshot of a whole scene, for debugger and console tooling.
/// Taken from live state; holds no handles, so it stays valid after the
/// scene changes.
#[derive(Debug, Serialize)]
pub struct SceneReport {
    pub run: Uuid,
    pub live_nodes: usize,
    pub roots: Vec<NodeReport>,
}

/// One node's slice of a [`SceneReport`].
#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub token: String,
    pub name: Option<String>,
    pub priority: i64,
    pub step_enabled: bool,
    pub draw_enabled: bool,
    pub last_step_us: u128,
    pub last_draw_us: u128,
    pub components: Vec<&'static str>,
    pub watches: BTreeMap<String, WatchValue>,
    pub children: Vec<NodeReport>,
}

impl Scene {
    /// Snapshot every live root and its subtree, roots in slot order,
    /// children in priority order.
    pub fn report(&self) -> SceneReport {
        let roots = self
            .live_ids()
            .into_iter()
            .filter(|&id| self.parent(id).is_none())
            .filter_map(|id| self.node_report(id))
            .collect();
        SceneReport {
            run: self.run_id(),
            live_nodes: self.len(),
            roots,
        }
    }

    /// Snapshot one node and its subtree. `None` for dead handles.
    pub fn node_report(&self, id: NodeId) -> Option<NodeReport> {
        let node = self.node(id)?;
        let children = node
            .children()
            .iter()
            .filter_map(|&child| self.node_report(child))
            .collect();
        Some(NodeReport {
            token: self.token(id),
            name: node.name().map(str::to_string),
            priority: node.priority(),
            step_enabled: node.step_enabled(),
            draw_enabled: node.draw_enabled(),
            last_step_us: node.last_step().as_micros(),
            last_draw_us: node.last_draw().as_micros(),
            components: node.component_tags(),
            watches: node
                .watches()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Timing};
    use std::any::Any;

    struct Marker;

    impl Component for Marker {
        fn tag(&self) -> &'static str {
            "marker"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn report_reflects_hierarchy() {
        let mut scene = Scene::new();
        let root = scene.spawn();
        scene.set_name(root, "world");
        let a = scene.spawn_child(root);
        scene.set_priority(a, 2);
        let b = scene.spawn_child(root);
        scene.set_priority(b, 1);
        scene.add_component(root, Timing::Before, Marker);
        scene.set_watch(root, "tick", 7i64);

        let report = scene.report();
        assert_eq!(report.live_nodes, 3);
        assert_eq!(report.roots.len(), 1);

        let world = &report.roots[0];
        assert_eq!(world.name.as_deref(), Some("world"));
        assert_eq!(world.components, vec!["marker"]);
        assert_eq!(world.children.len(), 2);
        // Children come out in priority order: b (1) before a (2).
        assert_eq!(world.children[0].priority, 1);
        assert_eq!(world.children[1].priority, 2);
        assert_eq!(
            world.watches.get("tick").and_then(|v| v.as_int()),
            Some(7)
        );
        assert_eq!(scene.resolve_token(&world.token), Ok(root));
    }

    #[test]
    fn removed_nodes_never_appear() {
        let mut scene = Scene::new();
        let root = scene.spawn();
        let doomed = scene.spawn_child(root);
        scene.remove(doomed);

        let report = scene.report();
        assert_eq!(report.live_nodes, 1);
        assert!(report.roots[0].children.is_empty());
    }

    #[test]
    fn report_serializes_to_json() {
        let mut scene = Scene::new();
        let root = scene.spawn();
        scene.set_name(root, "solo");
        scene.set_watch(root, "ready", true);

        let json = serde_json::to_string(&scene.report()).expect("report serializes");
        assert!(json.contains("\"solo\""));
        assert!(json.contains("\"ready\":true"));
    }
}
