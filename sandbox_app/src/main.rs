//! Sandbox host application
//!
//! Drives a small world through a few dozen frames: a ship carrying a turret,
//! a sound bank that streams in over several frames, and a world system that
//! reports on the population at the end of every frame.

use entity_core::foundation::logging;
use entity_core::foundation::math::translation_of;
use entity_core::prelude::*;

/// Sandbox errors
#[derive(thiserror::Error, Debug)]
enum SandboxError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("world: {0}")]
    World(#[from] EcsError),
}

/// Thrust applied along x every frame
#[derive(Default)]
struct Engine {
    thrust: f32,
}
impl Component for Engine {}

/// Streams in over a few frames
#[derive(Default)]
struct SoundBank {
    chunks_left: u32,
}

impl Component for SoundBank {
    fn on_load(&mut self) -> LoadStatus {
        self.chunks_left = 3;
        LoadStatus::Pending
    }

    fn poll_load(&mut self) -> LoadStatus {
        self.chunks_left = self.chunks_left.saturating_sub(1);
        if self.chunks_left == 0 {
            log::info!("Sound bank streamed in");
            LoadStatus::Loaded
        } else {
            LoadStatus::Pending
        }
    }
}

/// Moves the root of its entity by the engine's thrust
#[derive(Default)]
struct Propulsion {
    root: Option<ComponentId>,
    engine: Option<ComponentId>,
    x: f32,
}

impl EntitySystem for Propulsion {
    fn name(&self) -> &'static str {
        "propulsion"
    }

    fn component_requests(&self) -> RequestedComponents {
        RequestedComponents::new().require("spatial").require("engine")
    }

    fn register_updates(&self, requests: &mut StageRequests) {
        requests.add(UpdateStage::BeforePhysics, 0);
    }

    fn component_was_added(&mut self, component: ComponentHandle) {
        if component.kind == HashedName::new("engine") {
            self.engine = Some(component.id);
        } else {
            self.root.get_or_insert(component.id);
        }
    }

    fn component_was_removed(&mut self, component: ComponentHandle) {
        if self.engine == Some(component.id) {
            self.engine = None;
        }
        if self.root == Some(component.id) {
            self.root = None;
        }
    }

    fn update(&mut self, _stage: UpdateStage, context: &mut EntityContext<'_>) {
        let thrust = self
            .engine
            .and_then(|id| context.component::<Engine>(id))
            .map_or(0.0, |engine| engine.thrust);
        let Some(root) = self.root else {
            return;
        };
        self.x += thrust;
        let transform = Transform::from_position(Vec3::new(self.x, 0.0, 0.0)).to_matrix();
        if let Err(err) = context.set_local_transform(root, transform) {
            log::warn!("Propulsion lost its node: {}", err);
        }
    }
}

/// Logs the world population at the end of each frame
#[derive(Default)]
struct Census {
    engines: usize,
    frames: u64,
}

impl WorldSystem for Census {
    fn name(&self) -> &'static str {
        "census"
    }

    fn component_requests(&self) -> RequestedComponents {
        RequestedComponents::new().require("engine")
    }

    fn register_updates(&self, requests: &mut StageRequests) {
        requests.add(UpdateStage::EndFrame, 100);
    }

    fn system_was_added_to_world(&mut self) {
        log::info!("Census started");
    }

    fn component_was_added(&mut self, _entity: EntityId, _component: ComponentHandle) {
        self.engines += 1;
    }

    fn component_was_removed(&mut self, _entity: EntityId, _component: ComponentHandle) {
        self.engines = self.engines.saturating_sub(1);
    }

    fn update(&mut self, _stage: UpdateStage, context: &mut WorldContext<'_>) {
        self.frames += 1;
        if self.frames % 10 == 0 {
            let dying = context.entities().filter(|(_, e)| e.is_pending_removal()).count();
            log::info!(
                "Frame {}: {} entities ({} dying), {} engines, {} spatial nodes",
                self.frames,
                context.entities().count(),
                dying,
                self.engines,
                context.spatial().len()
            );
        }
    }
}

fn register_sandbox(registries: &mut Registries) {
    registries.components.add(ComponentType::of::<Engine>("engine", true));
    registries.components.add(ComponentType::of::<SoundBank>("sound_bank", false));
    registries
        .entity_systems
        .add(EntitySystemType::new("propulsion", create_propulsion));
    registries.world_systems.add(WorldSystemType::new("census", create_census));
}

fn create_propulsion() -> Box<dyn EntitySystem> {
    Box::<Propulsion>::default()
}

fn create_census() -> Box<dyn WorldSystem> {
    Box::<Census>::default()
}

const DEFAULT_CONFIG_PATH: &str = "sandbox_app/sandbox.toml";

/// Explicit path argument first, then the bundled file, then defaults
fn load_config() -> Result<WorldConfig, SandboxError> {
    if let Some(path) = std::env::args().nth(1) {
        return Ok(WorldConfig::load_from_file(&path)?);
    }
    if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Ok(WorldConfig::load_from_file(DEFAULT_CONFIG_PATH)?);
    }
    Ok(WorldConfig::default())
}

fn run() -> Result<(), SandboxError> {
    let config = load_config()?;
    config.validate()?;
    logging::init_with_filter(&config.log_level);

    let mut registries = Registries::new();
    registries.register_module(register_sandbox);

    let mut world = World::new(config);
    world.add_world_system_by_name(&registries, "census")?;

    let ship = world.create_entity("ship");
    world.create_component(&registries, ship, "spatial", "hull")?;
    let engine = world.create_component(&registries, ship, "engine", "main engine")?;
    world.create_component(&registries, ship, "sound_bank", "engine sounds")?;
    if let Some(engine) = world.component_mut::<Engine>(ship, engine) {
        engine.thrust = 0.5;
    }
    world
        .entity_mut(ship)
        .ok_or(EcsError::UnknownEntity)?
        .add_system_by_name(&registries, "propulsion")?;

    let turret = world.create_entity("turret");
    let mount = Transform::from_position(Vec3::new(0.0, 1.5, 0.0)).to_matrix();
    let barrel = world.add_spatial_component(turret, "mount", mount, Obb::default(), None)?;
    world
        .entity_mut(turret)
        .ok_or(EcsError::UnknownEntity)?
        .set_spatial_parent(Some(ship));

    for id in [ship, turret] {
        world.load_entity(id)?;
        world.activate_entity(id)?;
    }

    for frame in 0..30 {
        if frame == 12 {
            log::info!("Scrapping the turret");
            world.kill_entity(turret)?;
        }
        if let Some(global) = world.global_transform(turret, barrel) {
            log::debug!("Turret at {:?}", translation_of(&global));
        }
        world.run_frame();
    }

    log::info!(
        "Finished after {} frames with {} entities",
        world.frame_count(),
        world.entity_count()
    );
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        log::error!("Sandbox failed: {}", err);
        eprintln!("sandbox: {err}");
        std::process::exit(1);
    }
}
