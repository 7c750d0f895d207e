//! Combat module: урон, hit-реакции, ragdoll и подъём.
//!
//! ECS ответственность:
//! - классификация ударов по регионам тела, здоровье, аккумуляторы
//! - режимы скелета (Animated / Ragdoll / RagdollToAnim)
//! - контактный урон игроку во время атаки
//!
//! Tactical layer (engine) ответственность:
//! - собственно физика сегментов и импульсов
//! - animator evaluation; сюда приходят только параметры/триггеры

use bevy::app::FixedPostUpdate;
use bevy::prelude::*;

pub mod damage;
pub mod ragdoll;

// Re-export основных типов
pub use damage::{
    DamageEvent, DamageOutcome, DamageTrigger, DamageTriggers, Dead, PlayerDamaged, ZombieDied,
};
pub use ragdoll::{blend_amount, BodySnapshot, BoneAlignment, BoneControl, RagdollState, ReanimationTask};

/// Combat Plugin
///
/// FixedUpdate (после AI-машин): подъём из ragdoll, контактный урон,
/// оформление смерти. FixedPostUpdate: IK + root motion + ragdoll blend.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageEvent>()
            .add_event::<PlayerDamaged>()
            .add_event::<ZombieDied>();

        app.add_systems(
            FixedUpdate,
            (
                ragdoll::advance_reanimation,
                damage::update_damage_triggers,
                damage::mark_dead,
            )
                .chain()
                .after(crate::ai::systems::run_zombie_machines),
        );

        app.add_systems(FixedPostUpdate, ragdoll::late_body_phase);
    }
}
