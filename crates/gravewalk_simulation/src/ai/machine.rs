//! State Machine Core — владеет контекстом агента и гоняет состояния.
//!
//! `ZombieMachine` — один компонент на агента: closed-set словарь
//! состояний (tag → Box<dyn ZombieState>), текущий tag и мутабельный
//! `ZombieContext`. Состояния получают на каждый hook срез
//! [`StateContext`] (контекст + provider'ы) и никогда не владеют
//! машиной.
//!
//! Порядок тика (см. AIPlugin): fixed_refresh → sensor events → damage →
//! state update. Поздняя фаза (root motion, ragdoll blend) — в
//! FixedPostUpdate.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use crate::combat::ragdoll::{BoneAlignment, BoneControl, RagdollState};
use crate::components::{Threat, ThreatKind, WaypointNetworks, ZombieStats};
use crate::logger;
use crate::providers::{AnimationRig, NavAgent, RagdollBody, ParticleSink, WorldRaycast};
use crate::registry::{PlayerSnapshot, SceneRegistry};

use super::states::ZombieState;

/// Теги состояний AI. Значение enum'а уходит в animator параметр `State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum AIStateType {
    None,
    #[default]
    Idle,
    Alerted,
    Patrol,
    Attack,
    Feeding,
    Pursuit,
    Dead,
}

impl AIStateType {
    pub fn as_animator_value(self) -> i32 {
        self as i32
    }
}

/// Имена animator-параметров и layers (контракт с rig'ом)
pub mod params {
    pub const SPEED: &str = "Speed";
    pub const SEEKING: &str = "Seeking";
    pub const FEEDING: &str = "Feeding";
    pub const ATTACK: &str = "Attack";
    pub const CRAWLING: &str = "Crawling";
    pub const SCREAMING: &str = "Screaming";
    pub const SCREAM: &str = "Scream";
    pub const HIT: &str = "Hit";
    pub const HIT_TYPE: &str = "HitType";
    pub const STATE: &str = "State";
    pub const LOWER_BODY_DAMAGE: &str = "Lower Body Damage";
    pub const UPPER_BODY_DAMAGE: &str = "Upper Body Damage";
    pub const REANIMATE_FROM_BACK: &str = "Reanimate From Back";
    pub const REANIMATE_FROM_FRONT: &str = "Reanimate From Front";
    pub const MELEE_CONTACT: &str = "Melee Contact";

    pub const LOWER_BODY_LAYER: &str = "Lower Body";
    pub const UPPER_BODY_LAYER: &str = "Upper Body";
    pub const CINEMATIC_LAYER: &str = "Cinematic";
    pub const FEEDING_STATE: &str = "Feeding State";
    pub const CRAWL_FEEDING_STATE: &str = "Crawl Feeding State";
}

/// Триггер-сфера вокруг текущего target'а (порог "дошёл")
#[derive(Debug, Clone, Copy, Default)]
struct TargetTrigger {
    enabled: bool,
    position: Vec3,
    radius: f32,
}

/// Мутабельный контекст агента. Владеет им исключительно ZombieMachine.
#[derive(Debug)]
pub struct ZombieContext {
    pub stats: ZombieStats,

    /// Снимки угроз текущего тика (чистятся в fixed_refresh)
    pub visual_threat: Threat,
    pub audio_threat: Threat,

    target: Threat,
    trigger: TargetTrigger,
    is_target_reached: bool,
    pub stopping_distance: f32,

    root_position_refs: i32,
    root_rotation_refs: i32,

    pub in_melee_range: bool,
    pub cinematic_enabled: bool,

    // Animator-facing значения
    pub speed: f32,
    pub seeking: i32,
    pub feeding: bool,
    pub attack_type: i32,
    pub(crate) screaming: f32,
    /// Запрос крика: позиция эмиттера, подберёт система spawn_screams
    pub pending_scream: Option<Vec3>,

    /// Сенсор относительно позиции агента
    pub sensor_offset: Vec3,
    pub sensor_radius: f32,

    pub waypoint_network: usize,
    pub random_patrol: bool,
    pub current_waypoint: Option<usize>,

    pub root_bone_alignment: BoneAlignment,
    pub ragdoll: RagdollState,
}

impl Default for ZombieContext {
    fn default() -> Self {
        Self {
            stats: ZombieStats::default(),
            visual_threat: Threat::cleared(),
            audio_threat: Threat::cleared(),
            target: Threat::cleared(),
            trigger: TargetTrigger::default(),
            is_target_reached: false,
            stopping_distance: 1.0,
            root_position_refs: 0,
            root_rotation_refs: 0,
            in_melee_range: false,
            cinematic_enabled: false,
            speed: 0.0,
            seeking: 0,
            feeding: false,
            attack_type: 0,
            screaming: 0.0,
            pending_scream: None,
            sensor_offset: Vec3::ZERO,
            sensor_radius: 10.0,
            waypoint_network: 0,
            random_patrol: false,
            current_waypoint: None,
            root_bone_alignment: BoneAlignment::ZAxis,
            ragdoll: RagdollState::default(),
        }
    }
}

impl ZombieContext {
    pub fn target(&self) -> Threat {
        self.target
    }

    pub fn target_kind(&self) -> ThreatKind {
        self.target.kind
    }

    pub fn is_target_reached(&self) -> bool {
        self.is_target_reached
    }

    /// Перезаписывает target и переставляет trigger-сферу на него
    pub fn set_target(&mut self, threat: Threat) {
        self.set_target_with_radius(threat, self.stopping_distance);
    }

    pub fn set_target_with_radius(&mut self, threat: Threat, radius: f32) {
        self.target = threat;
        self.trigger.enabled = true;
        self.trigger.position = threat.position;
        self.trigger.radius = radius;
    }

    pub fn clear_target(&mut self) {
        self.target.clear();
        self.trigger.enabled = false;
    }

    /// Аддитивный запрос root motion; симметричный вызов с минусом
    /// обязателен на каждом пути выхода (см. RootMotionHandle)
    pub fn add_root_motion_request(&mut self, position: i32, rotation: i32) {
        self.root_position_refs += position;
        self.root_rotation_refs += rotation;
    }

    pub fn use_root_position(&self) -> bool {
        self.root_position_refs > 0
    }

    pub fn use_root_rotation(&self) -> bool {
        self.root_rotation_refs > 0
    }

    pub fn is_screaming(&self) -> bool {
        self.screaming > 0.1
    }
}

/// Пара (position, rotation) для scoped-захвата root motion.
///
/// `acquire`/`release` идемпотентны: повторный acquire без release —
/// no-op, поэтому любой путь выхода безопасен.
#[derive(Debug, Clone, Default)]
pub struct RootMotionHandle {
    position: i32,
    rotation: i32,
    held: bool,
}

impl RootMotionHandle {
    pub fn new(position: i32, rotation: i32) -> Self {
        Self { position, rotation, held: false }
    }

    pub fn acquire(&mut self, ctx: &mut ZombieContext) {
        if !self.held {
            ctx.add_root_motion_request(self.position, self.rotation);
            self.held = true;
        }
    }

    pub fn release(&mut self, ctx: &mut ZombieContext) {
        if self.held {
            ctx.add_root_motion_request(-self.position, -self.rotation);
            self.held = false;
        }
    }
}

/// Provider'ы и ресурсы тика, собранные для одного агента.
///
/// `nav`/`rig`/`body` опциональны — отсутствующий collaborator даёт
/// guarded no-op, не панику.
pub struct Providers<'w> {
    pub entity: Entity,
    pub transform: &'w mut Transform,
    pub nav: Option<&'w mut dyn NavAgent>,
    pub rig: Option<&'w mut dyn AnimationRig>,
    pub body: Option<&'w mut dyn RagdollBody>,
    pub raycast: &'w dyn WorldRaycast,
    pub registry: &'w SceneRegistry,
    pub particles: &'w mut dyn ParticleSink,
    pub waypoints: &'w WaypointNetworks,
    pub players: &'w [PlayerSnapshot],
    pub rng: &'w mut ChaCha8Rng,
    pub dt: f32,
    pub now: f32,
}

/// Срез машины, который видит состояние внутри hook'а
pub struct StateContext<'a, 'w> {
    pub ctx: &'a mut ZombieContext,
    pub io: &'a mut Providers<'w>,
}

impl StateContext<'_, '_> {
    pub fn position(&self) -> Vec3 {
        self.io.transform.translation
    }

    pub fn forward(&self) -> Vec3 {
        *self.io.transform.forward()
    }

    pub fn sensor_position(&self) -> Vec3 {
        self.io.transform.translation + self.ctx.sensor_offset
    }

    pub fn nav_control(&mut self, position: bool, rotation: bool) {
        if let Some(nav) = self.io.nav.as_mut() {
            nav.set_control(position, rotation);
        }
    }

    pub fn set_destination(&mut self, target: Vec3) {
        if let Some(nav) = self.io.nav.as_mut() {
            nav.set_destination(target);
        }
    }

    pub fn nav_resume(&mut self) {
        if let Some(nav) = self.io.nav.as_mut() {
            nav.resume();
        }
    }

    pub fn nav_stop(&mut self) {
        if let Some(nav) = self.io.nav.as_mut() {
            nav.stop();
        }
    }

    /// Текущая (или следующая при `increment`) патрульная точка.
    /// Сайд-эффект: делает её target'ом. Пустая/отсутствующая сеть —
    /// no-op с нулевым вектором.
    pub fn waypoint_position(&mut self, increment: bool) -> Vec3 {
        let count = self
            .io
            .waypoints
            .get(self.ctx.waypoint_network)
            .map(|n| n.len())
            .unwrap_or(0);
        if count == 0 {
            return Vec3::ZERO;
        }

        match self.ctx.current_waypoint {
            None => {
                let first = if self.ctx.random_patrol {
                    self.io.rng.gen_range(0..count)
                } else {
                    0
                };
                self.ctx.current_waypoint = Some(first);
            }
            Some(_) if increment => self.next_waypoint(count),
            Some(_) => {}
        }

        let index = self.ctx.current_waypoint.unwrap_or(0);
        let Some(position) = self
            .io
            .waypoints
            .get(self.ctx.waypoint_network)
            .and_then(|n| n.waypoints.get(index))
            .copied()
        else {
            return Vec3::ZERO;
        };

        let distance = self.io.transform.translation.distance(position);
        self.ctx.set_target(Threat::new(
            ThreatKind::Waypoint,
            None,
            position,
            distance,
            self.io.now,
        ));
        position
    }

    fn next_waypoint(&mut self, count: usize) {
        let Some(current) = self.ctx.current_waypoint else {
            return;
        };
        if self.ctx.random_patrol && count > 1 {
            // Перебрасываем, пока не выпадет другая точка
            let mut next = current;
            while next == current {
                next = self.io.rng.gen_range(0..count);
            }
            self.ctx.current_waypoint = Some(next);
        } else {
            self.ctx.current_waypoint = Some(if current + 1 == count { 0 } else { current + 1 });
        }
    }

    /// Крик: триггерит анимацию и просит мир заспавнить звуковой эмиттер.
    /// false — крик невозможен (нет rig'а или включён cinematic override).
    pub fn scream(&mut self) -> bool {
        if self.ctx.is_screaming() {
            return true;
        }
        if self.ctx.cinematic_enabled {
            return false;
        }
        let position = self.io.transform.translation;
        let Some(rig) = self.io.rig.as_mut() else {
            return false;
        };
        rig.set_trigger(params::SCREAM);
        self.ctx.pending_scream = Some(position);
        true
    }
}

/// Машина состояний одного зомби
#[derive(Component)]
pub struct ZombieMachine {
    pub(crate) states: HashMap<AIStateType, Box<dyn ZombieState>>,
    pub(crate) current: AIStateType,
    pub(crate) started: bool,
    pub ctx: ZombieContext,
}

impl ZombieMachine {
    pub fn new(initial: AIStateType) -> Self {
        Self {
            states: HashMap::new(),
            current: initial,
            started: false,
            ctx: ZombieContext::default(),
        }
    }

    pub fn with_state(mut self, state: Box<dyn ZombieState>) -> Self {
        self.states.insert(state.state_type(), state);
        self
    }

    /// Полный набор из шести состояний с default-тюнингом
    pub fn standard(initial: AIStateType) -> Self {
        use super::states::*;

        Self::new(initial)
            .with_state(Box::new(IdleState::default()))
            .with_state(Box::new(AlertedState::default()))
            .with_state(Box::new(PatrolState::default()))
            .with_state(Box::new(PursuitState::default()))
            .with_state(Box::new(AttackState::default()))
            .with_state(Box::new(FeedingState::default()))
    }

    pub fn current_state(&self) -> AIStateType {
        self.current
    }

    pub(crate) fn run_hook<R>(
        &mut self,
        tag: AIStateType,
        io: &mut Providers,
        f: impl FnOnce(&mut dyn ZombieState, &mut StateContext) -> R,
    ) -> Option<R> {
        let Self { states, ctx, .. } = self;
        let state = states.get_mut(&tag)?;
        let mut sc = StateContext { ctx, io };
        Some(f(state.as_mut(), &mut sc))
    }

    /// Физическая фаза: чистит угрозы, пересчитывает дистанции и края
    /// "дошёл до target'а", обновляет melee range. Строго ДО sensor
    /// events и state update.
    pub fn fixed_refresh(&mut self, io: &mut Providers) {
        self.ctx.visual_threat.clear();
        self.ctx.audio_threat.clear();

        let position = io.transform.translation;
        if self.ctx.target.kind != ThreatKind::None {
            self.ctx.target.distance = position.distance(self.ctx.target.position);
        }

        let reached =
            self.ctx.trigger.enabled && position.distance(self.ctx.trigger.position) <= self.ctx.trigger.radius;
        let was_reached = self.ctx.is_target_reached;
        self.ctx.is_target_reached = reached;
        if reached != was_reached {
            let current = self.current;
            self.run_hook(current, io, |state, sc| state.on_destination_reached(sc, reached));
        }

        self.ctx.in_melee_range = io
            .players
            .iter()
            .any(|player| player.position.distance(position) <= player.melee_radius);
    }

    /// Синхронная доставка trigger event'а текущему состоянию
    pub fn deliver_trigger_event(
        &mut self,
        io: &mut Providers,
        phase: super::events::TriggerPhase,
        other: &super::events::AggravatorInfo,
    ) {
        let current = self.current;
        self.run_hook(current, io, |state, sc| state.on_trigger_event(sc, phase, other));
    }

    /// Переменная фаза: animator sync, истощение satisfaction, update
    /// текущего состояния и переход.
    pub fn update(&mut self, io: &mut Providers) {
        if !self.started {
            self.started = true;
            let current = self.current;
            self.run_hook(current, io, |state, sc| state.on_enter(sc));
        }

        self.sync_animator(io);
        self.deplete_satisfaction(io.dt);

        if self.ctx.ragdoll.bone_control != BoneControl::Animated {
            return;
        }

        let current = self.current;
        let Some(next) = self.run_hook(current, io, |state, sc| state.on_update(sc)) else {
            return;
        };
        if next != self.current {
            self.change_state(io, next);
        }
    }

    /// Внешний принудительный перевод состояния (cinematics, скрипты)
    pub fn set_state_override(&mut self, io: &mut Providers, state: AIStateType) {
        if state != self.current && self.states.contains_key(&state) {
            self.force_state(io, state);
        }
    }

    fn change_state(&mut self, io: &mut Providers, next: AIStateType) {
        let adopted = if self.states.contains_key(&next) {
            next
        } else if self.states.contains_key(&AIStateType::Idle) {
            AIStateType::Idle
        } else {
            logger::log_warning(&format!(
                "FSM: {:?} вернул {:?} без обработчика, остаёмся в {:?}",
                io.entity, next, self.current
            ));
            return;
        };

        self.force_state(io, adopted);
    }

    /// Exit текущего → enter нового, без валидации. Используется также
    /// damage-подсистемой при выходе из ragdoll.
    pub(crate) fn force_state(&mut self, io: &mut Providers, next: AIStateType) {
        let old = self.current;
        self.run_hook(old, io, |state, sc| state.on_exit(sc));
        self.current = next;
        self.run_hook(next, io, |state, sc| state.on_enter(sc));
        logger::log(&format!("FSM: {:?} {:?} → {:?}", io.entity, old, next));
    }

    /// IK-фаза (после animator evaluation)
    pub fn animator_ik(&mut self, io: &mut Providers) {
        let current = self.current;
        self.run_hook(current, io, |state, sc| state.on_animator_ik(sc));
    }

    fn sync_animator(&mut self, io: &mut Providers) {
        let current = self.current;
        let ctx = &mut self.ctx;
        let Some(rig) = io.rig.as_mut() else {
            return;
        };
        rig.set_float(params::SPEED, ctx.speed);
        rig.set_bool(params::FEEDING, ctx.feeding);
        rig.set_int(params::SEEKING, ctx.seeking);
        rig.set_int(params::ATTACK, ctx.attack_type);
        rig.set_int(params::STATE, current.as_animator_value());

        ctx.screaming = if ctx.cinematic_enabled {
            0.0
        } else {
            rig.get_float(params::SCREAMING)
        };
    }

    /// satisfaction тает со скоростью движения в кубе; клампится в нуле
    pub(crate) fn deplete_satisfaction(&mut self, dt: f32) {
        let speed = self.ctx.speed;
        let stats = &mut self.ctx.stats;
        stats.satisfaction =
            (stats.satisfaction - (stats.depletion_rate * dt / 100.0) * speed.powi(3)).max(0.0);
    }

    /// Веса damage-layers и damage-параметры animator'а
    pub(crate) fn update_animator_damage(&mut self, io: &mut Providers) {
        let stats = &self.ctx.stats;
        let lower = stats.lower_body_damage;
        let upper = stats.upper_body_damage;
        let limp = stats.limp_threshold;
        let crawl = stats.crawl_threshold;
        let upper_threshold = stats.upper_body_threshold;
        let crawling = stats.is_crawling();

        let Some(rig) = io.rig.as_mut() else {
            return;
        };
        rig.set_layer_weight(
            params::LOWER_BODY_LAYER,
            if lower > limp && lower < crawl { 1.0 } else { 0.0 },
        );
        rig.set_layer_weight(
            params::UPPER_BODY_LAYER,
            if upper > upper_threshold && lower < crawl { 1.0 } else { 0.0 },
        );
        rig.set_bool(params::CRAWLING, crawling);
        rig.set_int(params::LOWER_BODY_DAMAGE, lower);
        rig.set_int(params::UPPER_BODY_DAMAGE, upper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_type_animator_values_are_stable() {
        assert_eq!(AIStateType::None.as_animator_value(), 0);
        assert_eq!(AIStateType::Idle.as_animator_value(), 1);
        assert_eq!(AIStateType::Dead.as_animator_value(), 7);
    }

    #[test]
    fn test_set_target_places_trigger() {
        let mut ctx = ZombieContext::default();
        let threat = Threat::new(ThreatKind::VisualPlayer, None, Vec3::new(3.0, 0.0, 0.0), 3.0, 0.0);
        ctx.set_target(threat);

        assert_eq!(ctx.target_kind(), ThreatKind::VisualPlayer);
        assert!(ctx.trigger.enabled);
        assert_eq!(ctx.trigger.radius, ctx.stopping_distance);
        assert_eq!(ctx.trigger.position, Vec3::new(3.0, 0.0, 0.0));

        ctx.set_target_with_radius(threat, 4.5);
        assert_eq!(ctx.trigger.radius, 4.5);

        ctx.clear_target();
        assert_eq!(ctx.target_kind(), ThreatKind::None);
        assert!(!ctx.trigger.enabled);
    }

    #[test]
    fn test_root_motion_refcounts_additive() {
        let mut ctx = ZombieContext::default();
        assert!(!ctx.use_root_position());

        // Два перекрывающихся animation layer'а
        ctx.add_root_motion_request(1, 1);
        ctx.add_root_motion_request(1, 0);
        assert!(ctx.use_root_position());
        assert!(ctx.use_root_rotation());

        ctx.add_root_motion_request(-1, -1);
        assert!(ctx.use_root_position());
        assert!(!ctx.use_root_rotation());

        ctx.add_root_motion_request(-1, 0);
        assert!(!ctx.use_root_position());
    }

    #[test]
    fn test_root_motion_handle_idempotent() {
        let mut ctx = ZombieContext::default();
        let mut handle = RootMotionHandle::new(0, 1);

        handle.acquire(&mut ctx);
        handle.acquire(&mut ctx); // повторный acquire — no-op
        assert!(ctx.use_root_rotation());

        handle.release(&mut ctx);
        handle.release(&mut ctx);
        assert!(!ctx.use_root_rotation());
    }

    #[test]
    fn test_satisfaction_depletion_formula() {
        let mut machine = ZombieMachine::new(AIStateType::Patrol);
        machine.ctx.speed = 2.0;
        machine.ctx.stats.satisfaction = 1.0;
        machine.ctx.stats.depletion_rate = 0.1;

        machine.deplete_satisfaction(1.0);
        // 0.1 * 1.0 * 2^3 / 100 = 0.008
        assert!((machine.ctx.stats.satisfaction - 0.992).abs() < 1e-6);
    }

    #[test]
    fn test_satisfaction_clamped_at_zero() {
        let mut machine = ZombieMachine::new(AIStateType::Patrol);
        machine.ctx.speed = 10.0;
        machine.ctx.stats.satisfaction = 0.001;

        for _ in 0..100 {
            machine.deplete_satisfaction(1.0);
        }
        assert_eq!(machine.ctx.stats.satisfaction, 0.0);
    }
}
