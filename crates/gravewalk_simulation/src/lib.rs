//! GRAVEWALK Simulation Core
//!
//! ECS-симуляция зомби-AI на Bevy 0.16 (strategic layer).
//!
//! HYBRID ARCHITECTURE:
//! - ECS = strategic layer (state machines, сенсорика, combat-правила)
//! - Engine = tactical layer (физика, рендер, NavMesh) — подключается
//!   через provider-трейты из [`providers`]; headless-реализации дают
//!   полноценную симуляцию без engine.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod combat;
pub mod components;
pub mod logger;
pub mod providers;
pub mod registry;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export базовых типов для удобства
pub use ai::{
    AIPlugin, AIStateType, Providers, RootMotionHandle, SensorEvent, StateContext, StateOverride,
    TriggerPhase, ZombieContext, ZombieMachine, ZombieState,
};
pub use combat::{
    BoneControl, CombatPlugin, DamageEvent, DamageOutcome, DamageTrigger, DamageTriggers, Dead,
    PlayerDamaged, ZombieDied,
};
pub use components::*;
pub use logger::{init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel, LogPrinter};
pub use providers::*;
pub use registry::{Player, PlayerSnapshot, SceneRegistry};

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Fixed timestep 60Hz для simulation tick
        app.insert_resource(Time::<Fixed>::from_hz(60.0));

        // Ресурсы не перетираем, если хост уже вставил свои
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }
        if !app.world().contains_resource::<SceneRegistry>() {
            app.init_resource::<SceneRegistry>();
        }
        if !app.world().contains_resource::<WaypointNetworks>() {
            app.init_resource::<WaypointNetworks>();
        }
        if !app.world().contains_resource::<WorldGeometry>() {
            app.insert_resource(WorldGeometry(Box::new(headless::HeadlessWorld::with_ground())));
        }
        if !app.world().contains_resource::<BloodParticles>() {
            app.insert_resource(BloodParticles(Box::new(headless::HeadlessParticles::default())));
        }

        // Подсистемы (ECS strategic layer)
        app.add_plugins((AIPlugin, CombatPlugin));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0));

    app
}

/// Snapshot мира для сравнения детерминизма
/// (упрощённая версия: Debug-формат компонентов, сортировка по Entity)
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
