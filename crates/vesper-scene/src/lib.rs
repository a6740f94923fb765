//! Vesper Scene - entity/component scene graph
//!
//! The core runtime of the Vesper engine: nodes with generational weak
//! handles, priority-ordered step/draw scheduling, Before/After component
//! buckets, and deferred reclamation so that same-pass removal is always
//! safe. Single-threaded by contract; every mutation goes through [`Scene`]
//! on the simulation thread.

mod component;
mod error;
mod handle;
mod inspect;
mod limbo;
mod node;
mod scene;
mod watch;

pub use component::{Component, Timing};
pub use error::TokenError;
pub use handle::NodeId;
pub use inspect::{NodeReport, SceneReport};
pub use node::{Node, NodeBehavior};
pub use scene::Scene;
pub use watch::WatchValue;
