//! Vesper - a scene-graph engine demo driver
//!
//! Headless frame loop over a small scene: builds a node hierarchy with
//! behaviors and components, steps and draws it for a configured number of
//! frames, then dumps a scene report.

mod settings;

use std::any::Any;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vesper_core::{FrameClock, FrameStats, TimeConfig};
use vesper_scene::{Component, NodeBehavior, NodeId, Scene, Timing};

use crate::settings::EngineSettings;

/// Root behavior: counts simulation ticks into a watch.
struct WorldClock {
    ticks: u64,
}

impl NodeBehavior for WorldClock {
    fn on_step(&mut self, scene: &mut Scene, this: NodeId, _dt: f32) {
        self.ticks += 1;
        scene.set_watch(this, "tick", self.ticks as i64);
    }
}

/// Integrates an angle each step and publishes it as a watch.
struct Spin {
    rate: f32,
    angle: f32,
}

impl Spin {
    fn new(rate: f32) -> Self {
        Self { rate, angle: 0.0 }
    }
}

impl Component for Spin {
    fn tag(&self) -> &'static str {
        "spin"
    }

    fn step(&mut self, scene: &mut Scene, host: NodeId, dt: f32) {
        self.angle = (self.angle + self.rate * dt) % std::f32::consts::TAU;
        scene.set_watch(host, "angle", self.angle);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Publishes the host's previous step duration as a watch.
struct Telemetry;

impl Component for Telemetry {
    fn tag(&self) -> &'static str {
        "telemetry"
    }

    fn step(&mut self, scene: &mut Scene, host: NodeId, _dt: f32) {
        let last = scene
            .node(host)
            .map(|n| n.last_step().as_micros() as i64)
            .unwrap_or(0);
        scene.set_watch(host, "step_us", last);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Removes its host once the timer runs out.
struct Fuse {
    remaining: f32,
}

impl Component for Fuse {
    fn tag(&self) -> &'static str {
        "fuse"
    }

    fn step(&mut self, scene: &mut Scene, host: NodeId, dt: f32) {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            info!("fuse expired, removing {}", host);
            scene.remove(host);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Application state
struct VesperApp {
    scene: Scene,
    clock: FrameClock,
    stats: FrameStats,
    world: NodeId,
}

impl VesperApp {
    fn new(settings: &EngineSettings) -> Self {
        let clock = FrameClock::new(TimeConfig {
            time_scale: settings.scheduler.time_scale,
            ..Default::default()
        });

        let mut scene = Scene::new();
        let world = scene.spawn_with(WorldClock { ticks: 0 });
        scene.set_name(world, "world");

        let sun = scene.spawn_child(world);
        scene.set_name(sun, "sun");
        scene.set_priority(sun, -10);
        scene.add_component(sun, Timing::Before, Spin::new(0.3));

        let planet = scene.spawn_child(world);
        scene.set_name(planet, "planet");
        scene.add_component(planet, Timing::Before, Spin::new(1.7));
        scene.add_component(planet, Timing::After, Telemetry);

        let moon = scene.spawn_child(planet);
        scene.set_name(moon, "moon");
        scene.add_component(moon, Timing::Before, Spin::new(4.2));

        let spark = scene.spawn_child(world);
        scene.set_name(spark, "spark");
        scene.set_priority(spark, 5);
        scene.add_component(spark, Timing::Before, Fuse { remaining: 0.5 });

        Self {
            scene,
            clock,
            stats: FrameStats::new(),
            world,
        }
    }

    /// Run one frame: advance the clock, step and draw the whole tree.
    fn frame(&mut self, raw_delta: f32) -> Duration {
        self.clock.update(raw_delta);
        let started = Instant::now();
        self.scene.step(self.world, self.clock.delta_time);
        self.scene.draw(self.world);
        let elapsed = started.elapsed();
        self.stats.record(elapsed);
        elapsed
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    info!("Starting Vesper engine...");

    let settings = EngineSettings::load();
    let slow_frame = Duration::from_secs_f32(settings.diagnostics.slow_frame_ms / 1000.0);

    let mut app = VesperApp::new(&settings);

    for _ in 0..settings.scheduler.frame_count {
        let elapsed = app.frame(settings.scheduler.frame_delta);
        if settings.diagnostics.warn_slow_frames && elapsed > slow_frame {
            warn!(
                "slow frame {}: {:?}",
                app.clock.frame_count, elapsed
            );
        }
    }
    app.scene.flush();

    info!(
        "Simulated {} frames in {:?} (mean {:?}, max {:?}), {} node(s) live",
        app.stats.frames(),
        app.stats.total(),
        app.stats.mean(),
        app.stats.max(),
        app.scene.len()
    );

    for id in app.scene.find_all_by_name("planet") {
        info!("planet token: {}", app.scene.token(id));
    }

    if settings.diagnostics.dump_report {
        let report = app.scene.report();
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize scene report")?;
        println!("{json}");
    }

    Ok(())
}
