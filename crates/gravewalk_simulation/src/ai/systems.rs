//! AI-системы фиксированного тика.
//!
//! Порядок в FixedUpdate (chain): sync коллайдеров → headless overlap
//! scan → машины состояний (refresh + sensors + damage + update) →
//! спавн криков → locomotion → распад звуков. Поздняя фаза (root
//! motion, ragdoll blend) — в combat::ragdoll.

use bevy::prelude::*;

use crate::combat::damage::{DamageEvent, ZombieDied};
use crate::combat::ragdoll::BoneControl;
use crate::components::{Aggravator, AggravatorKind, SoundDecay, SourceId, WaypointNetworks};
use crate::logger;
use crate::providers::{
    AnimationRig, BloodParticles, Body, NavAgent, Navigation, RagdollBody, Rig, WorldCollider,
    WorldGeometry,
};
use crate::registry::{Player, PlayerSnapshot, SceneRegistry};
use crate::DeterministicRng;

use super::events::{AggravatorInfo, SensorEvent, StateOverride, TriggerPhase};
use super::machine::{Providers, ZombieMachine};

/// Снимки игроков на тик (melee range, damage triggers)
pub(crate) fn collect_players(
    players: &Query<(Entity, &Transform, &Player), Without<ZombieMachine>>,
) -> Vec<PlayerSnapshot> {
    players
        .iter()
        .map(|(entity, transform, player)| PlayerSnapshot {
            entity,
            collider: player.collider,
            position: transform.translation,
            melee_radius: player.melee_radius,
        })
        .collect()
}

/// Sync позиций динамических коллайдеров в raycast-мир
pub fn sync_world_colliders(
    mut geometry: ResMut<WorldGeometry>,
    colliders: Query<(&Transform, &WorldCollider)>,
) {
    for (transform, collider) in colliders.iter() {
        geometry.0.sync_collider(collider, transform.translation);
    }
}

/// Headless-замена trigger-объёмов физики: раздражитель в радиусе
/// сенсора агента порождает SensorEvent(Stay). Engine-сборка шлёт такие
/// события сама из коллбеков.
pub fn emit_sensor_overlaps(
    agents: Query<(Entity, &Transform, &ZombieMachine)>,
    aggravators: Query<(Entity, &Transform, &Aggravator)>,
    mut events: EventWriter<SensorEvent>,
) {
    for (agent, transform, machine) in agents.iter() {
        let sensor = transform.translation + machine.ctx.sensor_offset;
        let radius = machine.ctx.sensor_radius;

        for (other, other_transform, aggravator) in aggravators.iter() {
            if other == agent {
                continue;
            }
            // Звук "дотягивается" собственным радиусом, остальные должны
            // попасть в сенсорную сферу
            let extent = match aggravator.kind {
                AggravatorKind::SoundEmitter { radius } => radius,
                _ => 0.0,
            };
            if sensor.distance(other_transform.translation) <= radius + extent {
                events.write(SensorEvent {
                    agent,
                    phase: TriggerPhase::Stay,
                    other: AggravatorInfo {
                        kind: aggravator.kind,
                        source: aggravator.source,
                        position: other_transform.translation,
                    },
                });
            }
        }
    }
}

/// Основной тик машин: физическая фаза (refresh), синхронная доставка
/// sensor events и урона, переопределения состояний, state update.
#[allow(clippy::too_many_arguments)]
pub fn run_zombie_machines(
    mut agents: Query<(
        Entity,
        &mut Transform,
        &mut ZombieMachine,
        Option<&mut Navigation>,
        Option<&mut Rig>,
        Option<&mut Body>,
    )>,
    players: Query<(Entity, &Transform, &Player), Without<ZombieMachine>>,
    mut sensor_events: EventReader<SensorEvent>,
    mut damage_events: EventReader<DamageEvent>,
    mut overrides: EventReader<StateOverride>,
    mut died: EventWriter<ZombieDied>,
    geometry: Res<WorldGeometry>,
    registry: Res<SceneRegistry>,
    mut particles: ResMut<BloodParticles>,
    networks: Res<WaypointNetworks>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let snapshots = collect_players(&players);
    let sensors: Vec<SensorEvent> = sensor_events.read().cloned().collect();
    let damage: Vec<DamageEvent> = damage_events.read().cloned().collect();
    let forced: Vec<StateOverride> = overrides.read().copied().collect();

    for (entity, mut transform, mut machine, mut nav, mut rig, mut body) in agents.iter_mut() {
        let mut io = Providers {
            entity,
            transform: &mut transform,
            nav: nav.as_mut().map(|n| n.0.as_mut() as &mut dyn NavAgent),
            rig: rig.as_mut().map(|r| r.0.as_mut() as &mut dyn AnimationRig),
            body: body.as_mut().map(|b| b.0.as_mut() as &mut dyn RagdollBody),
            raycast: geometry.0.as_ref(),
            registry: &registry,
            particles: particles.0.as_mut(),
            waypoints: &networks,
            players: &snapshots,
            rng: &mut rng.rng,
            dt: time.delta_secs(),
            now: time.elapsed_secs(),
        };

        // Sync позиции агента в provider'ы до принятия решений
        let position = io.transform.translation;
        let rotation = io.transform.rotation;
        let dt = io.dt;
        if let Some(nav) = io.nav.as_mut() {
            nav.sync_position(position);
        }
        if let Some(rig) = io.rig.as_mut() {
            rig.sync_origin(position, rotation, dt);
        }

        machine.fixed_refresh(&mut io);

        for event in sensors.iter().filter(|e| e.agent == entity) {
            machine.deliver_trigger_event(&mut io, event.phase, &event.other);
        }

        for hit in damage.iter().filter(|d| d.target == entity) {
            let outcome = machine.take_damage(&mut io, hit);
            if outcome.died {
                died.write(ZombieDied { entity });
            }
        }

        for forced_state in forced.iter().filter(|o| o.agent == entity) {
            machine.set_state_override(&mut io, forced_state.state);
        }

        machine.update(&mut io);
    }
}

/// Materialize запросов крика в звуковые эмиттеры мира
pub fn spawn_screams(mut commands: Commands, mut agents: Query<(Entity, &mut ZombieMachine)>) {
    for (entity, mut machine) in agents.iter_mut() {
        let Some(position) = machine.ctx.pending_scream.take() else {
            continue;
        };
        let radius = machine.ctx.stats.scream_radius;
        commands.spawn((
            Transform::from_translation(position),
            Aggravator {
                kind: AggravatorKind::SoundEmitter { radius },
                source: SourceId::fresh(),
            },
            SoundDecay { remaining: 2.0 },
        ));
        logger::log(&format!("🔊 {:?} кричит (radius {:.1})", entity, radius));
    }
}

/// Headless locomotion: двигаем Transform к steering target со скоростью
/// контекста. Root motion вместо этого кормит nav velocity.
pub fn drive_locomotion(
    mut agents: Query<(&mut Transform, &mut Navigation, &ZombieMachine)>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    for (mut transform, mut nav, machine) in agents.iter_mut() {
        let nav = nav.0.as_mut();

        if machine.ctx.ragdoll.bone_control != BoneControl::Animated {
            continue;
        }
        if !nav.is_enabled() || !nav.position_control() {
            continue;
        }

        if machine.ctx.use_root_position() {
            transform.translation += nav.velocity() * dt;
        } else {
            if !nav.has_path() {
                continue;
            }
            let to_target = nav.steering_target() - transform.translation;
            let distance = to_target.length();
            if distance < 1e-4 {
                continue;
            }
            let step = (machine.ctx.speed * dt).min(distance);
            transform.translation += to_target / distance * step;
        }

        nav.sync_position(transform.translation);
    }
}

/// Затухание временных источников звука
pub fn decay_sound_emitters(
    mut commands: Commands,
    mut emitters: Query<(Entity, &mut SoundDecay)>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();
    for (entity, mut decay) in emitters.iter_mut() {
        decay.remaining -= dt;
        if decay.remaining <= 0.0 {
            commands.entity(entity).despawn();
        }
    }
}
