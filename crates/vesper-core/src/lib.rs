//! Vesper Core - foundational types for the Vesper engine
//!
//! This crate provides the pieces shared by every part of the engine:
//! - Frame clock and fixed-timestep accumulation
//! - Frame wall-time statistics for diagnostics

pub mod time;

pub use time::{FrameClock, FrameStats, TimeConfig};
