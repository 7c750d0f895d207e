//! AI decision-making module
//!
//! Per-agent FSM с сенсорным фьюжном угроз. Машина и состояния — в
//! machine/states, сенсорика — в sensor, событийный вход — в events.

use bevy::prelude::*;

pub mod events;
pub mod machine;
pub mod sensor;
pub mod states;
pub mod systems;

// Re-export основных типов
pub use events::{AggravatorInfo, SensorEvent, StateOverride, TriggerPhase};
pub use machine::{
    params, AIStateType, Providers, RootMotionHandle, StateContext, ZombieContext, ZombieMachine,
};
pub use states::{
    AlertedState, AttackState, FeedingState, IdleState, PatrolState, PursuitState, ZombieState,
};

/// AI Plugin
///
/// Регистрирует AI системы в FixedUpdate, chain для детерминизма:
/// 1. sync_world_colliders — позиции динамических коллайдеров
/// 2. emit_sensor_overlaps — headless trigger-объёмы
/// 3. run_zombie_machines — refresh → sensors → damage → state update
/// 4. spawn_screams — материализация криков
/// 5. drive_locomotion — headless движение к steering target
/// 6. decay_sound_emitters — затухание временных звуков
pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SensorEvent>().add_event::<StateOverride>();

        app.add_systems(
            FixedUpdate,
            (
                systems::sync_world_colliders,
                systems::emit_sensor_overlaps,
                systems::run_zombie_machines,
                systems::spawn_screams,
                systems::drive_locomotion,
                systems::decay_sound_emitters,
            )
                .chain(), // Последовательное выполнение для детерминизма
        );
    }
}
