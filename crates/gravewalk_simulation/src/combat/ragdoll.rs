//! Ragdoll recovery: подъём из физической симуляции обратно в анимацию.
//!
//! Режимы тела строго по циклу Animated → Ragdoll → RagdollToAnim →
//! Animated. Подъём — одноразовая задача с ожиданием: новый запрос
//! вытесняет незавершённый. Blend-фаза исполняется в FixedPostUpdate,
//! после animator evaluation.

use bevy::prelude::*;

use crate::ai::machine::{params, AIStateType, Providers, ZombieMachine};
use crate::ai::systems::collect_players;
use crate::components::WaypointNetworks;
use crate::logger;
use crate::providers::{
    layers, AnimationRig, BloodParticles, Body, Bone, LayerMask, NavAgent, Navigation, RagdollBody,
    Rig, WorldGeometry,
};
use crate::registry::{Player, SceneRegistry};
use crate::DeterministicRng;

/// Режим управления скелетом. Ровно один активен в каждый момент.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum BoneControl {
    #[default]
    Animated,
    Ragdoll,
    RagdollToAnim,
}

/// Какая ось root bone смотрит "вперёд" у конкретной модели
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoneAlignment {
    XAxis,
    YAxis,
    #[default]
    ZAxis,
    XAxisInverted,
    YAxisInverted,
    ZAxisInverted,
}

/// Поза сегмента на момент начала подъёма
#[derive(Debug, Clone, Copy)]
pub struct BodySnapshot {
    pub segment: usize,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Одноразовая задача ожидания перед подъёмом
#[derive(Debug, Clone, Copy)]
pub struct ReanimationTask {
    pub remaining: f32,
}

/// Состояние ragdoll-подсистемы в контексте агента
#[derive(Debug)]
pub struct RagdollState {
    pub bone_control: BoneControl,
    pub snapshots: Vec<BodySnapshot>,
    pub hip_position: Vec3,
    pub feet_position: Vec3,
    pub head_position: Vec3,
    /// Момент начала RagdollToAnim
    pub recovery_started_at: f32,
    /// Окно mecanim-перехода, в котором корректируем root и поворот
    pub mecanim_transition_time: f32,
    pub task: Option<ReanimationTask>,
}

impl Default for RagdollState {
    fn default() -> Self {
        Self {
            bone_control: BoneControl::Animated,
            snapshots: Vec::new(),
            hip_position: Vec3::ZERO,
            feet_position: Vec3::ZERO,
            head_position: Vec3::ZERO,
            recovery_started_at: f32::MIN,
            mecanim_transition_time: 0.1,
            task: None,
        }
    }
}

/// Линейный blend-фактор подъёма, клампится в [0, 1]
pub fn blend_amount(now: f32, recovery_start: f32, transition: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    ((now - recovery_start - transition) / duration).clamp(0.0, 1.0)
}

impl ZombieMachine {
    /// Продвигает задачу подъёма; по истечении ожидания фиксирует позу
    /// ragdoll и запускает RagdollToAnim.
    pub fn tick_reanimation(&mut self, io: &mut Providers) {
        if self.ctx.ragdoll.bone_control != BoneControl::Ragdoll {
            return;
        }
        let Some(task) = self.ctx.ragdoll.task.as_mut() else {
            return;
        };
        task.remaining -= io.dt;
        if task.remaining > 0.0 {
            return;
        }
        self.ctx.ragdoll.task = None;

        if io.body.is_none() || io.rig.is_none() {
            logger::log_warning(&format!(
                "{:?}: нет body/rig provider'а, подъём из ragdoll невозможен",
                io.entity
            ));
            return;
        }

        self.ctx.ragdoll.recovery_started_at = io.now;

        // Обратно в kinematic: дальше позами владеет анимация + blend
        if let Some(body) = io.body.as_mut() {
            body.set_kinematic(true);
        }
        self.ctx.ragdoll.bone_control = BoneControl::RagdollToAnim;

        // Снимок позы ragdoll до включения animator'а
        if let Some(body) = io.body.as_mut() {
            let mut snapshots = Vec::with_capacity(body.segment_count());
            for index in 0..body.segment_count() {
                let (position, rotation) = body.segment_transform(index);
                snapshots.push(BodySnapshot { segment: index, position, rotation });
            }
            self.ctx.ragdoll.snapshots = snapshots;
            self.ctx.ragdoll.hip_position = body.segment_transform(body.root_index()).0;
        }

        if let Some(rig) = io.rig.as_mut() {
            self.ctx.ragdoll.head_position = rig.bone_position(Bone::Head);
            self.ctx.ragdoll.feet_position =
                (rig.bone_position(Bone::LeftFoot) + rig.bone_position(Bone::RightFoot)) * 0.5;
            rig.set_enabled(true);
        }

        // Знак оси root bone решает, встаём со спины или с живота
        let forward_test = io
            .body
            .as_ref()
            .map(|body| match self.ctx.root_bone_alignment {
                BoneAlignment::XAxis => body.root_right().y,
                BoneAlignment::YAxis => body.root_up().y,
                BoneAlignment::ZAxis => body.root_forward().y,
                BoneAlignment::XAxisInverted => -body.root_right().y,
                BoneAlignment::YAxisInverted => -body.root_up().y,
                BoneAlignment::ZAxisInverted => -body.root_forward().y,
            })
            .unwrap_or(1.0);

        if let Some(rig) = io.rig.as_mut() {
            if forward_test >= 0.0 {
                rig.set_trigger(params::REANIMATE_FROM_BACK);
            } else {
                rig.set_trigger(params::REANIMATE_FROM_FRONT);
            }
        }

        logger::log(&format!("🧟 {:?} начинает подъём из ragdoll", io.entity));
    }

    /// Поздняя фаза RagdollToAnim: коррекция root'а с ground snap'ом,
    /// выравнивание осей и blend поз сегментов к анимации.
    pub fn late_blend(&mut self, io: &mut Providers) {
        if self.ctx.ragdoll.bone_control != BoneControl::RagdollToAnim {
            return;
        }

        let started = self.ctx.ragdoll.recovery_started_at;
        let transition = self.ctx.ragdoll.mecanim_transition_time;

        if io.now <= started + transition {
            // Сдвигаем агент так, чтобы animated root совпал с ragdoll hip
            let mut new_root = io.transform.translation;
            if let Some(body) = io.body.as_ref() {
                let root_now = body.segment_transform(body.root_index()).0;
                new_root += self.ctx.ragdoll.hip_position - root_now;
            }

            // Ground probe вниз, игнорируя собственные коллайдеры
            let hits = io.raycast.raycast_all(
                new_root + Vec3::Y * 0.25,
                Vec3::NEG_Y,
                f32::MAX,
                LayerMask(layers::GEOMETRY),
            );
            let mut ground_y = f32::MIN;
            for hit in &hits {
                let own = hit.rigid_body.and_then(|rb| io.registry.machine_for(rb)) == Some(io.entity);
                if !own {
                    ground_y = ground_y.max(hit.point.y);
                }
            }
            if ground_y > f32::MIN {
                new_root.y = ground_y;
            }

            // NavMesh-точка предпочтительнее сырого hit'а
            let base_offset = io.nav.as_ref().map(|nav| nav.base_offset()).unwrap_or(0.0);
            let sampled = io.nav.as_ref().and_then(|nav| nav.sample_navmesh(new_root, 25.0));
            io.transform.translation = match sampled {
                Some(point) => point + Vec3::Y * base_offset,
                None => new_root + Vec3::Y * base_offset,
            };

            // Горизонтальный доворот: ось head→feet анимации на ось ragdoll
            if let Some(rig) = io.rig.as_ref() {
                let mut ragdoll_direction = self.ctx.ragdoll.head_position - self.ctx.ragdoll.feet_position;
                ragdoll_direction.y = 0.0;

                let mean_feet =
                    (rig.bone_position(Bone::LeftFoot) + rig.bone_position(Bone::RightFoot)) * 0.5;
                let mut animated_direction = rig.bone_position(Bone::Head) - mean_feet;
                animated_direction.y = 0.0;

                if animated_direction.length_squared() > 1e-6 && ragdoll_direction.length_squared() > 1e-6 {
                    let correction = Quat::from_rotation_arc(
                        animated_direction.normalize(),
                        ragdoll_direction.normalize(),
                    );
                    io.transform.rotation = io.transform.rotation * correction;
                }
            }
        }

        let blend = blend_amount(io.now, started, transition, self.ctx.stats.reanimation_blend_time);

        if let Some(body) = io.body.as_mut() {
            let root = body.root_index();
            for snapshot in &self.ctx.ragdoll.snapshots {
                let (current_position, current_rotation) = body.segment_transform(snapshot.segment);
                // Позиция blend'ится только у root-сегмента
                let position = if snapshot.segment == root {
                    snapshot.position.lerp(current_position, blend)
                } else {
                    current_position
                };
                let rotation = snapshot.rotation.slerp(current_rotation, blend);
                body.set_segment_transform(snapshot.segment, position, rotation);
            }
        }

        if blend >= 1.0 {
            self.ctx.ragdoll.bone_control = BoneControl::Animated;
            if let Some(nav) = io.nav.as_mut() {
                nav.set_enabled(true);
            }
            if let Some(body) = io.body.as_mut() {
                body.set_capsule_enabled(true);
            }
            // После подъёма всегда переоцениваем мир
            self.force_state(io, AIStateType::Alerted);
        }
    }
}

/// Query-кортеж агента для систем этого модуля
type AgentQuery = (
    Entity,
    &'static mut Transform,
    &'static mut ZombieMachine,
    Option<&'static mut Navigation>,
    Option<&'static mut Rig>,
    Option<&'static mut Body>,
);

/// Продвижение задач подъёма (FixedUpdate, после run_zombie_machines)
#[allow(clippy::too_many_arguments)]
pub fn advance_reanimation(
    mut agents: Query<AgentQuery>,
    players: Query<(Entity, &Transform, &Player), Without<ZombieMachine>>,
    geometry: Res<WorldGeometry>,
    registry: Res<SceneRegistry>,
    mut particles: ResMut<BloodParticles>,
    networks: Res<WaypointNetworks>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let snapshots = collect_players(&players);

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
        machine.tick_reanimation(&mut io);
    }
}

/// Поздняя фаза: IK, root motion, ragdoll blend (FixedPostUpdate)
#[allow(clippy::too_many_arguments)]
pub fn late_body_phase(
    mut agents: Query<AgentQuery>,
    players: Query<(Entity, &Transform, &Player), Without<ZombieMachine>>,
    geometry: Res<WorldGeometry>,
    registry: Res<SceneRegistry>,
    mut particles: ResMut<BloodParticles>,
    networks: Res<WaypointNetworks>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let snapshots = collect_players(&players);
    let dt = time.delta_secs();

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
            dt,
            now: time.elapsed_secs(),
        };

        // IK после animator evaluation
        machine.animator_ik(&mut io);

        // Root motion: анимация ведёт позицию/поворот по refcount'ам
        if machine.ctx.ragdoll.bone_control == BoneControl::Animated && dt > 0.0 {
            let use_position = machine.ctx.use_root_position();
            let use_rotation = machine.ctx.use_root_rotation();

            let root = io
                .rig
                .as_ref()
                .map(|rig| (rig.root_delta_position(), rig.root_rotation()));
            if let Some((delta_position, root_rotation)) = root {
                if use_position {
                    if let Some(nav) = io.nav.as_mut() {
                        nav.set_velocity(delta_position / dt);
                    }
                }
                if use_rotation {
                    io.transform.rotation = root_rotation;
                }
            }
        }

        machine.late_blend(&mut io);
    }
}
