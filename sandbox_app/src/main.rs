//! Headless sandbox simulation
//!
//! Runs a small asteroid field on the scene runtime: drifting asteroids, a gun
//! shooting at random collidable entities and a score kept on the blackboard.
//!
//! Usage: `sandbox [config.toml|config.ron] [frames]`

mod components;

use std::path::PathBuf;

use scene_runtime::foundation::logging::{self, LevelFilter};
use scene_runtime::prelude::*;
use thiserror::Error;

use components::{Gun, Score, ScoreKeeper, WaveSpawner};

const DEFAULT_FRAMES: u64 = 1800;
const FRAME_MS: f64 = 1000.0 / 60.0;

#[derive(Error, Debug)]
enum SandboxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Invalid frame count '{0}'")]
    Frames(String),
}

fn parse_args() -> Result<(Option<PathBuf>, u64), SandboxError> {
    let mut args = std::env::args().skip(1);
    let config = args.next().map(PathBuf::from);
    let frames = match args.next() {
        Some(raw) => raw.parse().map_err(|_| SandboxError::Frames(raw))?,
        None => DEFAULT_FRAMES,
    };
    Ok((config, frames))
}

fn run() -> Result<(), SandboxError> {
    let (config_path, frames) = parse_args()?;
    let config = match config_path {
        Some(path) => {
            log::info!("Loading scene config from {}", path.display());
            SceneConfig::load_from_file(path)?
        }
        None => SceneConfig::default(),
    };
    log::info!(
        "Viewport {}x{}, running {frames} frames",
        config.viewport_width,
        config.viewport_height
    );

    let mut scene = Scene::with_config(config);
    let root = scene.root();
    EntityBuilder::new()
        .tag("director")
        .component(ScoreKeeper)
        .component(Gun::new(250.0))
        .component(WaveSpawner::new(12, 1500.0))
        .build(&mut scene, root)?;

    let mut clock = FrameClock::new();
    for _ in 0..frames {
        let (delta, absolute) = clock.advance(FRAME_MS);
        scene.tick(delta, absolute);

        if clock.frame_count() % 300 == 0 {
            log::info!(
                "t={:.1}s live={} asteroids={} score={}",
                absolute / 1000.0,
                scene.live_count(),
                scene.find_all_by_tag("asteroid").len(),
                scene.blackboard().get::<Score>().map_or(0, |s| s.0)
            );
        }
    }

    let score = scene.blackboard().get::<Score>().map_or(0, |s| s.0);
    log::info!("Final score {score} after {} frames", clock.frame_count());
    scene.clear();
    Ok(())
}

fn main() {
    logging::init_with_level(LevelFilter::Info);

    log::info!("Starting scene sandbox");
    if let Err(err) = run() {
        log::error!("Sandbox failed: {err}");
        std::process::exit(1);
    }
}
