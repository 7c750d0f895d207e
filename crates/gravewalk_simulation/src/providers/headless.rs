//! Headless-реализации provider'ов.
//!
//! Заменяют engine в тестах и standalone прогонах: прямолинейная
//! навигация без NavMesh, rig-заглушка на параметрах, ragdoll из
//! сфер-сегментов, raycast-мир из сфер + ground plane. Этого достаточно,
//! чтобы вся AI-логика исполнялась и проверялась end-to-end.

use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::components::SourceId;

use super::{
    layers, AnimationRig, Bone, BodyRegion, LayerMask, NavAgent, ParticleSink, PathStatus,
    RagdollBody, RayHit, WorldCollider, WorldRaycast,
};

// --- Навигация ---

/// Прямолинейный NavAgent: путь всегда прямой и всегда Complete.
#[derive(Debug, Clone)]
pub struct HeadlessNav {
    position: Vec3,
    destination: Option<Vec3>,
    stopped: bool,
    enabled: bool,
    update_position: bool,
    update_rotation: bool,
    velocity: Vec3,
    base_offset: f32,
}

impl Default for HeadlessNav {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            destination: None,
            stopped: false,
            enabled: true,
            update_position: true,
            update_rotation: true,
            velocity: Vec3::ZERO,
            base_offset: 0.0,
        }
    }
}

impl NavAgent for HeadlessNav {
    fn set_destination(&mut self, target: Vec3) {
        self.destination = Some(target);
    }

    fn resume(&mut self) {
        self.stopped = false;
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn path_pending(&self) -> bool {
        false
    }

    fn path_stale(&self) -> bool {
        false
    }

    fn has_path(&self) -> bool {
        self.destination.is_some() && !self.stopped
    }

    fn path_status(&self) -> PathStatus {
        PathStatus::Complete
    }

    fn steering_target(&self) -> Vec3 {
        self.destination.unwrap_or(self.position)
    }

    fn desired_velocity(&self) -> Vec3 {
        match self.destination {
            Some(destination) => (destination - self.position).normalize_or_zero(),
            None => Vec3::ZERO,
        }
    }

    fn remaining_distance(&self) -> f32 {
        match self.destination {
            Some(destination) => self.position.distance(destination),
            None => 0.0,
        }
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_control(&mut self, position: bool, rotation: bool) {
        self.update_position = position;
        self.update_rotation = rotation;
    }

    fn position_control(&self) -> bool {
        self.update_position
    }

    fn rotation_control(&self) -> bool {
        self.update_rotation
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn base_offset(&self) -> f32 {
        self.base_offset
    }

    fn sample_navmesh(&self, position: Vec3, _max_distance: f32) -> Option<Vec3> {
        // NavMesh headless-мира — вся ground plane y = 0
        Some(Vec3::new(position.x, 0.0, position.z))
    }

    fn sync_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

// --- Анимация ---

/// Rig-заглушка: хранит параметры, имитирует animator controller.
///
/// Feeding-стейты считаются активными по соответствующим bool-параметрам,
/// root rotation синтезируется из `Seeking` (turn-on-spot анимации).
pub struct HeadlessRig {
    floats: HashMap<String, f32>,
    bools: HashMap<String, bool>,
    ints: HashMap<String, i32>,
    fired_triggers: Vec<String>,
    layer_weights: HashMap<String, f32>,
    look_at: Option<(Vec3, f32)>,
    enabled: bool,
    origin: Vec3,
    rotation: Quat,
    dt: f32,
    /// Скорость разворота turn-on-spot анимаций (рад/сек)
    turn_rate: f32,
}

impl Default for HeadlessRig {
    fn default() -> Self {
        Self {
            floats: HashMap::new(),
            bools: HashMap::new(),
            ints: HashMap::new(),
            fired_triggers: Vec::new(),
            layer_weights: HashMap::new(),
            look_at: None,
            enabled: true,
            origin: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            dt: 0.0,
            turn_rate: 2.5,
        }
    }
}

impl HeadlessRig {
    /// Срабатывал ли триггер хоть раз (для тестов)
    pub fn was_triggered(&self, param: &str) -> bool {
        self.fired_triggers.iter().any(|t| t == param)
    }
}

impl AnimationRig for HeadlessRig {
    fn set_float(&mut self, param: &str, value: f32) {
        self.floats.insert(param.to_string(), value);
    }

    fn get_float(&self, param: &str) -> f32 {
        self.floats.get(param).copied().unwrap_or(0.0)
    }

    fn set_bool(&mut self, param: &str, value: bool) {
        self.bools.insert(param.to_string(), value);
    }

    fn get_bool(&self, param: &str) -> bool {
        self.bools.get(param).copied().unwrap_or(false)
    }

    fn set_int(&mut self, param: &str, value: i32) {
        self.ints.insert(param.to_string(), value);
    }

    fn get_int(&self, param: &str) -> i32 {
        self.ints.get(param).copied().unwrap_or(0)
    }

    fn set_trigger(&mut self, param: &str) {
        self.fired_triggers.push(param.to_string());
    }

    fn set_layer_weight(&mut self, layer: &str, weight: f32) {
        self.layer_weights.insert(layer.to_string(), weight);
    }

    fn is_state_active(&self, layer: &str, state: &str) -> bool {
        use crate::ai::machine::params;

        if !self.enabled || layer != params::CINEMATIC_LAYER {
            return false;
        }

        let feeding = self.get_bool(params::FEEDING);
        let crawling = self.get_bool(params::CRAWLING);
        match state {
            params::FEEDING_STATE => feeding && !crawling,
            params::CRAWL_FEEDING_STATE => feeding && crawling,
            _ => false,
        }
    }

    fn bone_position(&self, bone: Bone) -> Vec3 {
        // Приближённый скелет: голова на 1.7м, стопы у origin
        match bone {
            Bone::Head => self.origin + Vec3::Y * 1.7,
            Bone::LeftFoot => self.origin + self.rotation * Vec3::X * -0.15,
            Bone::RightFoot => self.origin + self.rotation * Vec3::X * 0.15,
        }
    }

    fn set_look_at(&mut self, position: Vec3, weight: f32) {
        self.look_at = Some((position, weight));
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn root_delta_position(&self) -> Vec3 {
        if !self.enabled {
            return Vec3::ZERO;
        }
        let speed = self.get_float(crate::ai::machine::params::SPEED);
        self.rotation * Vec3::NEG_Z * speed * self.dt
    }

    fn root_rotation(&self) -> Quat {
        if !self.enabled {
            return self.rotation;
        }
        let seeking = self.get_int(crate::ai::machine::params::SEEKING);
        self.rotation * Quat::from_rotation_y(seeking as f32 * self.turn_rate * self.dt)
    }

    fn sync_origin(&mut self, position: Vec3, rotation: Quat, dt: f32) {
        self.origin = position;
        self.rotation = rotation;
        self.dt = dt;
    }
}

// --- Ragdoll ---

#[derive(Debug, Clone)]
struct HeadlessSegment {
    id: SourceId,
    region: BodyRegion,
    position: Vec3,
    rotation: Quat,
}

/// Ragdoll из поз-хранилища сегментов; физики нет, но позы читаются,
/// пишутся и смещаются импульсами — blend-логика работает целиком.
pub struct HeadlessRagdoll {
    segments: Vec<HeadlessSegment>,
    kinematic: bool,
    capsule_enabled: bool,
    root: usize,
    basis: Quat,
}

impl HeadlessRagdoll {
    /// Стандартный humanoid: голова, грудь, hip (root), две ноги
    pub fn humanoid() -> Self {
        let make = |region, offset: Vec3| HeadlessSegment {
            id: SourceId::fresh(),
            region,
            position: offset,
            rotation: Quat::IDENTITY,
        };
        Self {
            segments: vec![
                make(BodyRegion::Head, Vec3::Y * 1.7),
                make(BodyRegion::UpperBody, Vec3::Y * 1.3),
                make(BodyRegion::LowerBody, Vec3::Y * 0.9),
                make(BodyRegion::LowerBody, Vec3::new(-0.15, 0.45, 0.0)),
                make(BodyRegion::LowerBody, Vec3::new(0.15, 0.45, 0.0)),
            ],
            kinematic: true,
            capsule_enabled: true,
            root: 2,
            basis: Quat::IDENTITY,
        }
    }

    /// Повернуть базис root bone (тесты укладывают тело на спину/живот)
    pub fn set_basis(&mut self, basis: Quat) {
        self.basis = basis;
    }
}

impl RagdollBody for HeadlessRagdoll {
    fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn segment_id(&self, index: usize) -> SourceId {
        self.segments[index].id
    }

    fn segment_region(&self, index: usize) -> BodyRegion {
        self.segments[index].region
    }

    fn segment_index(&self, id: SourceId) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }

    fn segment_transform(&self, index: usize) -> (Vec3, Quat) {
        let segment = &self.segments[index];
        (segment.position, segment.rotation)
    }

    fn set_segment_transform(&mut self, index: usize, position: Vec3, rotation: Quat) {
        let segment = &mut self.segments[index];
        segment.position = position;
        segment.rotation = rotation;
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.kinematic = kinematic;
    }

    fn is_kinematic(&self) -> bool {
        self.kinematic
    }

    fn apply_impulse(&mut self, index: usize, impulse: Vec3) {
        if self.kinematic {
            return;
        }
        // Упрощённая физика: импульс сразу смещает сегмент
        self.segments[index].position += impulse * 0.05;
    }

    fn root_index(&self) -> usize {
        self.root
    }

    fn root_right(&self) -> Vec3 {
        self.basis * Vec3::X
    }

    fn root_up(&self) -> Vec3 {
        self.basis * Vec3::Y
    }

    fn root_forward(&self) -> Vec3 {
        self.basis * Vec3::Z
    }

    fn set_capsule_enabled(&mut self, enabled: bool) {
        self.capsule_enabled = enabled;
    }

    fn capsule_enabled(&self) -> bool {
        self.capsule_enabled
    }
}

// --- Raycast-мир ---

#[derive(Debug, Clone)]
struct SphereBlocker {
    id: SourceId,
    center: Vec3,
    radius: f32,
    layer: u32,
    rigid_body: Option<SourceId>,
}

/// Мир из сфер-коллайдеров + бесконечная ground plane y = 0.
///
/// Лучи, начинающиеся внутри сферы, её не задевают (как backface в
/// engine-физике) — поэтому собственная капсула агента не загораживает
/// ему обзор.
pub struct HeadlessWorld {
    blockers: Vec<SphereBlocker>,
    ground: bool,
}

impl HeadlessWorld {
    pub fn new() -> Self {
        Self { blockers: Vec::new(), ground: false }
    }

    pub fn with_ground() -> Self {
        Self { blockers: Vec::new(), ground: true }
    }

    /// Статический блокер (стены, препятствия)
    pub fn add_blocker(&mut self, id: SourceId, center: Vec3, radius: f32, layer: u32, rigid_body: Option<SourceId>) {
        self.blockers.push(SphereBlocker { id, center, radius, layer, rigid_body });
    }
}

impl Default for HeadlessWorld {
    fn default() -> Self {
        Self::with_ground()
    }
}

impl WorldRaycast for HeadlessWorld {
    fn raycast_all(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask) -> Vec<RayHit> {
        let mut hits = Vec::new();
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return hits;
        }

        for blocker in &self.blockers {
            if !mask.contains(blocker.layer) {
                continue;
            }
            let oc = origin - blocker.center;
            let b = oc.dot(direction);
            let c = oc.length_squared() - blocker.radius * blocker.radius;
            let discriminant = b * b - c;
            if discriminant < 0.0 {
                continue;
            }
            let t = -b - discriminant.sqrt();
            if t <= 0.0 || t > max_distance {
                continue;
            }
            hits.push(RayHit {
                distance: t,
                point: origin + direction * t,
                collider: blocker.id,
                rigid_body: blocker.rigid_body,
                layer: blocker.layer,
            });
        }

        if self.ground && mask.contains(layers::GEOMETRY) && direction.y < -1e-6 && origin.y > 0.0 {
            let t = origin.y / -direction.y;
            if t <= max_distance {
                hits.push(RayHit {
                    distance: t,
                    point: origin + direction * t,
                    collider: SourceId(0),
                    rigid_body: None,
                    layer: layers::GEOMETRY,
                });
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn sync_collider(&mut self, collider: &WorldCollider, position: Vec3) {
        if let Some(existing) = self.blockers.iter_mut().find(|b| b.id == collider.id) {
            existing.center = position;
            return;
        }
        self.add_blocker(collider.id, position, collider.radius, collider.layer, collider.rigid_body);
    }
}

// --- Частицы ---

/// Счётчик всплесков; общий handle позволяет тестам читать эмиссию
#[derive(Default)]
pub struct HeadlessParticles {
    emitted: Arc<AtomicUsize>,
}

impl HeadlessParticles {
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.emitted)
    }
}

impl ParticleSink for HeadlessParticles {
    fn emit(&mut self, _position: Vec3, _rotation: Quat, count: u32) {
        self.emitted.fetch_add(count as usize, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_straight_line_path() {
        let mut nav = HeadlessNav::default();
        nav.sync_position(Vec3::ZERO);
        assert!(!nav.has_path());

        nav.set_destination(Vec3::new(10.0, 0.0, 0.0));
        assert!(nav.has_path());
        assert_eq!(nav.path_status(), PathStatus::Complete);
        assert_eq!(nav.steering_target(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(nav.remaining_distance(), 10.0);
        assert_eq!(nav.desired_velocity(), Vec3::X);

        nav.stop();
        assert!(!nav.has_path());
    }

    #[test]
    fn test_raycast_orders_hits_by_distance() {
        let mut world = HeadlessWorld::new();
        world.add_blocker(SourceId(10), Vec3::new(5.0, 0.0, 0.0), 0.5, layers::PLAYER, None);
        world.add_blocker(SourceId(11), Vec3::new(2.0, 0.0, 0.0), 0.5, layers::DEFAULT, None);

        let hits = world.raycast_all(
            Vec3::ZERO,
            Vec3::X,
            20.0,
            LayerMask(layers::PLAYER | layers::DEFAULT),
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].collider, SourceId(11));
        assert_eq!(hits[1].collider, SourceId(10));
    }

    #[test]
    fn test_raycast_ignores_sphere_ray_starts_inside() {
        let mut world = HeadlessWorld::new();
        world.add_blocker(SourceId(10), Vec3::ZERO, 1.0, layers::AI_BODY_PART, None);

        let hits = world.raycast_all(Vec3::ZERO, Vec3::X, 20.0, LayerMask(layers::AI_BODY_PART));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_raycast_layer_mask_filters() {
        let mut world = HeadlessWorld::new();
        world.add_blocker(SourceId(10), Vec3::new(3.0, 0.0, 0.0), 0.5, layers::VISUAL_AGGRAVATOR, None);

        let hits = world.raycast_all(Vec3::ZERO, Vec3::X, 20.0, LayerMask(layers::PLAYER));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_ground_plane_hit() {
        let world = HeadlessWorld::with_ground();
        let hits = world.raycast_all(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, f32::MAX, LayerMask(layers::GEOMETRY));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].point.y, 0.0);
    }

    #[test]
    fn test_ragdoll_segment_lookup() {
        let body = HeadlessRagdoll::humanoid();
        let head_id = body.segment_id(0);
        assert_eq!(body.segment_index(head_id), Some(0));
        assert_eq!(body.segment_region(0), BodyRegion::Head);
        assert_eq!(body.segment_region(body.root_index()), BodyRegion::LowerBody);
        assert!(body.segment_index(SourceId(999_999)).is_none());
    }

    #[test]
    fn test_ragdoll_impulse_only_when_free() {
        let mut body = HeadlessRagdoll::humanoid();
        let before = body.segment_transform(0).0;
        body.apply_impulse(0, Vec3::X * 10.0);
        assert_eq!(body.segment_transform(0).0, before, "kinematic сегмент не двигается");

        body.set_kinematic(false);
        body.apply_impulse(0, Vec3::X * 10.0);
        assert!(body.segment_transform(0).0.x > before.x);
    }
}
