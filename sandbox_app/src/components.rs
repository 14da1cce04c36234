//! Demo components for the sandbox simulation

use rand::Rng;
use scene_runtime::prelude::*;

/// Moves its entity at a constant velocity, wrapping around the viewport
#[derive(Debug, Clone)]
pub struct Drift {
    /// Velocity in units per second
    pub velocity: Vec2,
}

impl Component for Drift {
    fn on_update(&mut self, ctx: &mut Context<'_>, delta: f64, _absolute: f64) -> HookResult {
        let (width, height) = {
            let config = ctx.scene().config();
            (config.viewport_width, config.viewport_height)
        };
        let step = self.velocity * (delta / 1000.0) as f32;
        let Some(entity) = ctx.entity_mut() else {
            return Ok(());
        };
        let node = entity.node_mut();
        node.position += step;
        node.position.x = node.position.x.rem_euclid(width);
        node.position.y = node.position.y.rem_euclid(height);
        Ok(())
    }
}

/// Hit points; destroys the owner when they run out
#[derive(Debug, Clone)]
pub struct Health {
    /// Remaining hit points
    pub hp: i64,
}

impl Component for Health {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        ctx.subscribe(["hit"]);
        Ok(())
    }

    fn on_message(&mut self, ctx: &mut Context<'_>, msg: &Message) -> HookResult {
        // hits are addressed to one entity through the payload
        if msg.payload().as_entity() != Some(ctx.owner()) {
            return Ok(());
        }
        self.hp -= 1;
        if self.hp > 0 {
            return Ok(());
        }

        let owner = ctx.owner();
        let points = ctx.entity().and_then(|e| e.attribute::<u32>("points").copied()).unwrap_or(0);
        ctx.send_message("destroyed", Payload::Int(i64::from(points)));
        ctx.scene_mut().destroy_entity(owner);
        Ok(())
    }
}

/// Running score, shared through the blackboard
#[derive(Debug, Default, Clone, Copy)]
pub struct Score(pub u64);

/// Adds destroyed asteroids' points to the [`Score`]
#[derive(Debug, Default)]
pub struct ScoreKeeper;

impl Component for ScoreKeeper {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        ctx.subscribe(["destroyed"]);
        ctx.scene_mut().blackboard_mut().insert(Score::default());
        Ok(())
    }

    fn on_message(&mut self, ctx: &mut Context<'_>, msg: &Message) -> HookResult {
        let points = msg.payload().as_int().unwrap_or(0).max(0).unsigned_abs();
        ctx.scene_mut().blackboard_mut().get_or_default::<Score>().0 += points;
        Ok(())
    }
}

/// Fires at a random collidable entity every `interval` milliseconds
#[derive(Debug)]
pub struct Gun {
    /// Milliseconds between shots
    pub interval: f64,
    cooldown: f64,
}

impl Gun {
    /// Gun firing every `interval` milliseconds
    pub fn new(interval: f64) -> Self {
        Self { interval, cooldown: interval }
    }
}

impl Component for Gun {
    fn on_update(&mut self, ctx: &mut Context<'_>, delta: f64, _absolute: f64) -> HookResult {
        self.cooldown -= delta;
        if self.cooldown > 0.0 {
            return Ok(());
        }
        self.cooldown += self.interval;

        let targets = ctx.scene().find_all_by_flag(EntityFlags::COLLIDABLE);
        if targets.is_empty() {
            return Ok(());
        }
        let target = targets[rand::thread_rng().gen_range(0..targets.len())];
        ctx.send_message("hit", Payload::Entity(target));
        Ok(())
    }
}

/// Spawns a wave of asteroids on init and again whenever the field is clear
#[derive(Debug)]
pub struct WaveSpawner {
    /// Asteroids per wave
    pub wave_size: usize,
    /// Pause before a new wave, in milliseconds
    pub wave_delay: f64,
    waves: u32,
    pending: bool,
}

impl WaveSpawner {
    /// Spawner producing `wave_size` asteroids per wave
    pub fn new(wave_size: usize, wave_delay: f64) -> Self {
        Self {
            wave_size,
            wave_delay,
            waves: 0,
            pending: false,
        }
    }
}

impl Component for WaveSpawner {
    fn on_init(&mut self, ctx: &mut Context<'_>) -> HookResult {
        spawn_wave(ctx.scene_mut(), self.wave_size)
            .map_err(|e| ComponentError::Failed(e.to_string()))?;
        self.waves = 1;
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, _delta: f64, _absolute: f64) -> HookResult {
        if self.pending || !ctx.scene().find_all_by_tag("asteroid").is_empty() {
            return Ok(());
        }
        self.pending = true;
        self.waves += 1;
        log::info!("Field clear, wave {} in {} ms", self.waves, self.wave_delay);

        let size = self.wave_size;
        let id = ctx.id();
        ctx.invoke_with_delay(self.wave_delay, move |scene| {
            if let Err(err) = spawn_wave(scene, size) {
                log::error!("Failed to spawn wave: {err}");
            }
            if let Some(spawner) = scene.component_mut::<Self>(id) {
                spawner.pending = false;
            }
        });
        Ok(())
    }
}

fn spawn_wave(scene: &mut Scene, count: usize) -> Result<(), BuildError> {
    let mut rng = rand::thread_rng();
    let root = scene.root();
    let mut builder = EntityBuilder::new();
    for _ in 0..count {
        let radius = rng.gen_range(8.0..24.0_f32);
        let hp = if radius > 16.0 { 2 } else { 1 };
        builder
            .tag("asteroid")
            .flag(EntityFlags::COLLIDABLE)
            .content_size(radius * 2.0, radius * 2.0)
            .anchor(0.5, 0.5)
            .relative_pos(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0))
            .attribute("points", if hp > 1 { 20_u32 } else { 50_u32 })
            .component(Drift {
                velocity: Vec2::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0)),
            })
            .component(Health { hp })
            .build(scene, root)?;
    }
    Ok(())
}
