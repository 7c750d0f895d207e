//! Provider seams — узкие контракты к tactical layer (engine).
//!
//! Симуляция не знает, кто считает пути, анимацию и физику: NavMesh
//! backend, engine animator и ragdoll подставляются через trait objects.
//! Отсутствие provider'а у агента — не ошибка: зависимые операции
//! деградируют в guarded no-op.
//!
//! Headless-реализации для тестов и standalone прогонов — в
//! [`headless`].

use bevy::prelude::*;

use crate::components::SourceId;

pub mod headless;

/// Физические слои мира (битовая маска)
pub mod layers {
    pub const DEFAULT: u32 = 1 << 0;
    pub const PLAYER: u32 = 1 << 1;
    pub const AI_BODY_PART: u32 = 1 << 2;
    pub const VISUAL_AGGRAVATOR: u32 = 1 << 3;
    pub const GEOMETRY: u32 = 1 << 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const fn contains(self, layer: u32) -> bool {
        self.0 & layer != 0
    }
}

/// Статус пути, который сообщает навигационный backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStatus {
    #[default]
    Complete,
    /// Путь доводит только до части маршрута
    Partial,
    Invalid,
}

/// Locomotion provider: аналог NavMeshAgent.
///
/// Position и rotation контролируются независимо — state'ы часто
/// оставляют позицию агенту, а поворот делают сами.
pub trait NavAgent: Send + Sync {
    fn set_destination(&mut self, target: Vec3);
    fn resume(&mut self);
    fn stop(&mut self);
    fn is_stopped(&self) -> bool;

    fn path_pending(&self) -> bool;
    fn path_stale(&self) -> bool;
    fn has_path(&self) -> bool;
    fn path_status(&self) -> PathStatus;

    /// Ближайшая точка маршрута, к которой сейчас ведёт steering
    fn steering_target(&self) -> Vec3;
    /// Желаемое направление движения (unit vector или ноль)
    fn desired_velocity(&self) -> Vec3;
    fn remaining_distance(&self) -> f32;

    /// Velocity override — root motion кормит агент скоростью анимации
    fn set_velocity(&mut self, velocity: Vec3);
    fn velocity(&self) -> Vec3;

    fn set_control(&mut self, position: bool, rotation: bool);
    fn position_control(&self) -> bool;
    fn rotation_control(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;

    /// Вертикальный offset капсулы над NavMesh
    fn base_offset(&self) -> f32;
    /// Ближайшая валидная точка NavMesh (ground snap при реанимации)
    fn sample_navmesh(&self, position: Vec3, max_distance: f32) -> Option<Vec3>;
    /// Sync позиции агента в backend (engine-реализации могут игнорировать)
    fn sync_position(&mut self, position: Vec3);
}

/// Скелетные кости, которые читает симуляция
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bone {
    Head,
    LeftFoot,
    RightFoot,
}

/// Animation provider: параметры, триггеры, layers, root motion.
pub trait AnimationRig: Send + Sync {
    fn set_float(&mut self, param: &str, value: f32);
    fn get_float(&self, param: &str) -> f32;
    fn set_bool(&mut self, param: &str, value: bool);
    fn get_bool(&self, param: &str) -> bool;
    fn set_int(&mut self, param: &str, value: i32);
    fn get_int(&self, param: &str) -> i32;
    fn set_trigger(&mut self, param: &str);

    fn set_layer_weight(&mut self, layer: &str, weight: f32);
    /// Активен ли именованный стейт на именованном layer'е
    fn is_state_active(&self, layer: &str, state: &str) -> bool;

    fn bone_position(&self, bone: Bone) -> Vec3;
    fn set_look_at(&mut self, position: Vec3, weight: f32);

    fn set_enabled(&mut self, enabled: bool);
    fn is_enabled(&self) -> bool;

    /// Смещение root'а за тик, когда анимация двигает тело
    fn root_delta_position(&self) -> Vec3;
    /// Поворот root'а после evaluation этого тика
    fn root_rotation(&self) -> Quat;
    /// Sync origin агента в rig (для вычисления bone positions)
    fn sync_origin(&mut self, position: Vec3, rotation: Quat, dt: f32);
}

/// Регион тела для классификации урона
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRegion {
    Head,
    UpperBody,
    LowerBody,
}

/// Ragdoll provider: сегменты тела с физикой.
///
/// Сегменты либо kinematic (анимация ведёт), либо свободны (ragdoll) —
/// всегда все разом, частичный ragdoll не поддерживается.
pub trait RagdollBody: Send + Sync {
    fn segment_count(&self) -> usize;
    fn segment_id(&self, index: usize) -> SourceId;
    fn segment_region(&self, index: usize) -> BodyRegion;
    fn segment_index(&self, id: SourceId) -> Option<usize>;

    fn segment_transform(&self, index: usize) -> (Vec3, Quat);
    fn set_segment_transform(&mut self, index: usize, position: Vec3, rotation: Quat);

    fn set_kinematic(&mut self, kinematic: bool);
    fn is_kinematic(&self) -> bool;
    fn apply_impulse(&mut self, index: usize, impulse: Vec3);

    /// Индекс hip/root сегмента
    fn root_index(&self) -> usize;
    /// Базис root bone в world space (для теста "лежит на спине/животе")
    fn root_right(&self) -> Vec3;
    fn root_up(&self) -> Vec3;
    fn root_forward(&self) -> Vec3;

    /// Основная капсула locomotion-коллизии
    fn set_capsule_enabled(&mut self, enabled: bool);
    fn capsule_enabled(&self) -> bool;
}

/// Hit луча; сортировку по дистанции провайдер не гарантирует
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub collider: SourceId,
    /// Rigidbody, которому принадлежит коллайдер (body parts)
    pub rigid_body: Option<SourceId>,
    pub layer: u32,
}

/// Physics/world query provider
pub trait WorldRaycast: Send + Sync {
    /// Все пересечения луча в пределах max_distance по маске слоёв
    fn raycast_all(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask) -> Vec<RayHit>;

    /// Sync позиции динамического коллайдера (engine игнорирует — он сам
    /// владеет позициями)
    fn sync_collider(&mut self, _collider: &WorldCollider, _position: Vec3) {}
}

/// Cosmetic effect sink: fire-and-forget частицы
pub trait ParticleSink: Send + Sync {
    fn emit(&mut self, position: Vec3, rotation: Quat, count: u32);
}

/// Динамический коллайдер entity в raycast-мире
#[derive(Component, Debug, Clone, Copy)]
pub struct WorldCollider {
    pub id: SourceId,
    pub radius: f32,
    pub layer: u32,
    pub rigid_body: Option<SourceId>,
}

// --- Компоненты/ресурсы-обёртки над trait objects ---

/// Per-agent навигация
#[derive(Component)]
pub struct Navigation(pub Box<dyn NavAgent>);

/// Per-agent анимационный rig
#[derive(Component)]
pub struct Rig(pub Box<dyn AnimationRig>);

/// Per-agent ragdoll-тело
#[derive(Component)]
pub struct Body(pub Box<dyn RagdollBody>);

/// Статическая геометрия + динамические коллайдеры мира
#[derive(Resource)]
pub struct WorldGeometry(pub Box<dyn WorldRaycast>);

/// Кровавые партиклы (урон, кормёжка)
#[derive(Resource)]
pub struct BloodParticles(pub Box<dyn ParticleSink>);
