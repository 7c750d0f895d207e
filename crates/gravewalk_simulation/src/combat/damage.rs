//! Damage-подсистема: классификация попаданий, hit-реакции, переход в
//! ragdoll, смерть.

use bevy::prelude::*;

use crate::ai::machine::{params, AIStateType, Providers, ZombieMachine};
use crate::ai::states::find_signed_angle;
use crate::components::{Aggravator, AggravatorKind, SourceId};
use crate::logger;
use crate::providers::{layers, BloodParticles, BodyRegion, Rig, WorldCollider};
use crate::registry::Player;
use serde::{Deserialize, Serialize};

use super::ragdoll::{BoneControl, ReanimationTask};

/// Входящий удар по зомби
#[derive(Event, Debug, Clone)]
pub struct DamageEvent {
    pub target: Entity,
    /// Мировая точка попадания
    pub position: Vec3,
    pub force: Vec3,
    pub amount: i32,
    /// Сегмент тела, в который пришёлся удар
    pub body_part: SourceId,
    /// Откуда бил атакующий (тест "удар в спину")
    pub instigator_position: Vec3,
    /// -1/1 — явная подсказка направления, 0 — вычислить по углу
    pub hit_direction: i32,
}

/// Зомби зацепил игрока контактным триггером атаки
#[derive(Event, Debug, Clone)]
pub struct PlayerDamaged {
    pub player: Entity,
    pub amount: f32,
    pub position: Vec3,
}

/// Здоровье зомби дошло до нуля
#[derive(Event, Debug, Clone, Copy)]
pub struct ZombieDied {
    pub entity: Entity,
}

/// Маркер мёртвого агента; труп остаётся в мире как еда
#[derive(Component, Debug)]
pub struct Dead;

/// Итог обработки одного удара
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageOutcome {
    pub died: bool,
    pub ragdolled: bool,
}

/// Контактный объём атаки, привязанный к animator-параметру.
/// Пока параметр > 0.9 (фаза замаха с контактом), игрок в пределах
/// reach получает урон.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageTrigger {
    pub parameter: String,
    pub damage: f32,
    pub reach: f32,
    pub particle_burst: u32,
}

impl Default for DamageTrigger {
    fn default() -> Self {
        Self {
            parameter: params::MELEE_CONTACT.to_string(),
            damage: 0.1,
            reach: 1.2,
            particle_burst: 10,
        }
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct DamageTriggers(pub Vec<DamageTrigger>);

impl ZombieMachine {
    /// Обработка удара. Решает animated hit-реакция vs ragdoll, копит
    /// региональный урон, при необходимости планирует реанимацию.
    pub fn take_damage(&mut self, io: &mut Providers, hit: &DamageEvent) -> DamageOutcome {
        // Кровь в точке попадания, best-effort
        io.particles.emit(hit.position, Quat::IDENTITY, 60);

        let hit_strength = hit.force.length();
        let mut outcome = DamageOutcome::default();
        let was_alive = self.ctx.stats.health > 0;

        // --- Уже в ragdoll: копим урон и перезапускаем подъём ---
        if self.ctx.ragdoll.bone_control == BoneControl::Ragdoll {
            let mut region = None;
            if let Some(body) = io.body.as_mut() {
                if let Some(index) = body.segment_index(hit.body_part) {
                    if hit_strength > 1.0 {
                        body.apply_impulse(index, hit.force);
                    }
                    region = Some(body.segment_region(index));
                }
            }
            let Some(region) = region else {
                return outcome;
            };

            match region {
                BodyRegion::Head => {
                    self.ctx.stats.health = (self.ctx.stats.health - hit.amount).max(0);
                }
                BodyRegion::UpperBody => self.ctx.stats.upper_body_damage += hit.amount,
                BodyRegion::LowerBody => self.ctx.stats.lower_body_damage += hit.amount,
            }
            self.update_animator_damage(io);

            if self.ctx.stats.health > 0 {
                // Новый запрос подъёма вытесняет текущий
                self.ctx.ragdoll.task = Some(ReanimationTask {
                    remaining: self.ctx.stats.reanimation_wait_time,
                });
            } else {
                self.current = AIStateType::Dead;
                self.ctx.ragdoll.task = None;
                outcome.died = was_alive;
            }
            return outcome;
        }

        // --- Animated: классифицируем попадание ---
        let attacker_local =
            io.transform.rotation.inverse() * (hit.instigator_position - io.transform.translation);

        let mut should_ragdoll = hit_strength > 1.0;
        let mut region = None;
        if let Some(body) = io.body.as_mut() {
            if let Some(index) = body.segment_index(hit.body_part) {
                region = Some(body.segment_region(index));
            }
        }

        match region {
            Some(BodyRegion::Head) => {
                self.ctx.stats.health = (self.ctx.stats.health - hit.amount).max(0);
                if self.ctx.stats.health == 0 {
                    should_ragdoll = true;
                }
            }
            Some(BodyRegion::UpperBody) => {
                self.ctx.stats.upper_body_damage += hit.amount;
                self.update_animator_damage(io);
            }
            Some(BodyRegion::LowerBody) => {
                // Подрубленные ноги всегда роняют
                self.ctx.stats.lower_body_damage += hit.amount;
                self.update_animator_damage(io);
                should_ragdoll = true;
            }
            None => {}
        }

        // forward = -Z: положительный local z — атакующий за спиной
        if self.ctx.ragdoll.bone_control != BoneControl::Animated
            || self.ctx.stats.is_crawling()
            || self.ctx.cinematic_enabled
            || attacker_local.z > 0.0
        {
            should_ragdoll = true;
        }

        if !should_ragdoll {
            // Направленная hit-реакция из фиксированной таблицы вариантов
            let angle = if hit.hit_direction == 0 {
                let to_hit = (hit.position - io.transform.translation).normalize_or_zero();
                find_signed_angle(to_hit, *io.transform.forward())
            } else {
                0.0
            };

            let hit_type = match region {
                Some(BodyRegion::Head) => {
                    if angle < -10.0 || hit.hit_direction == -1 {
                        1
                    } else if angle > 10.0 || hit.hit_direction == 1 {
                        3
                    } else {
                        2
                    }
                }
                Some(BodyRegion::UpperBody) => {
                    if angle < -20.0 || hit.hit_direction == -1 {
                        4
                    } else if angle > 20.0 || hit.hit_direction == 1 {
                        6
                    } else {
                        5
                    }
                }
                _ => 0,
            };

            if let Some(rig) = io.rig.as_mut() {
                rig.set_int(params::HIT_TYPE, hit_type);
                rig.set_trigger(params::HIT);
            }
            return outcome;
        }

        // --- Форсированный ragdoll ---
        let current = self.current;
        self.run_hook(current, io, |state, sc| state.on_exit(sc));
        self.current = AIStateType::None;

        if let Some(nav) = io.nav.as_mut() {
            nav.set_enabled(false);
        }
        if let Some(rig) = io.rig.as_mut() {
            rig.set_enabled(false);
        }
        self.ctx.in_melee_range = false;

        if let Some(body) = io.body.as_mut() {
            body.set_capsule_enabled(false);
            // Все сегменты в свободную симуляцию
            body.set_kinematic(false);
            if hit_strength > 1.0 {
                if let Some(index) = body.segment_index(hit.body_part) {
                    body.apply_impulse(index, hit.force);
                }
            }
        }

        self.ctx.ragdoll.bone_control = BoneControl::Ragdoll;
        outcome.ragdolled = true;
        logger::log(&format!("💥 {:?} упал в ragdoll (hit {:.1})", io.entity, hit_strength));

        if self.ctx.stats.health > 0 {
            self.ctx.ragdoll.task = Some(ReanimationTask {
                remaining: self.ctx.stats.reanimation_wait_time,
            });
        } else {
            self.current = AIStateType::Dead;
            self.ctx.ragdoll.task = None;
            outcome.died = was_alive;
        }
        outcome
    }
}

/// Контактный урон игроку во время фазы атаки
pub fn update_damage_triggers(
    agents: Query<(Entity, &Transform, &ZombieMachine, &Rig, &DamageTriggers)>,
    players: Query<(Entity, &Transform, &Player), Without<ZombieMachine>>,
    mut damaged: EventWriter<PlayerDamaged>,
    mut particles: ResMut<BloodParticles>,
) {
    for (entity, transform, machine, rig, triggers) in agents.iter() {
        if machine.ctx.ragdoll.bone_control != BoneControl::Animated {
            continue;
        }
        for trigger in &triggers.0 {
            if rig.0.get_float(&trigger.parameter) <= 0.9 {
                continue;
            }
            for (player_entity, player_transform, _) in players.iter() {
                if transform.translation.distance(player_transform.translation) <= trigger.reach {
                    damaged.write(PlayerDamaged {
                        player: player_entity,
                        amount: trigger.damage,
                        position: player_transform.translation,
                    });
                    particles.0.emit(
                        player_transform.translation,
                        transform.rotation,
                        trigger.particle_burst,
                    );
                    logger::log(&format!("🩸 {:?} зацепил игрока {:?}", entity, player_entity));
                }
            }
        }
    }
}

/// Смерть: маркер Dead, труп становится едой для остальных
pub fn mark_dead(mut commands: Commands, mut died: EventReader<ZombieDied>) {
    for event in died.read() {
        let Ok(mut entity_commands) = commands.get_entity(event.entity) else {
            continue;
        };
        let source = SourceId::fresh();
        entity_commands.insert((
            Dead,
            Aggravator { kind: AggravatorKind::Food, source },
            WorldCollider {
                id: source,
                radius: 0.5,
                layer: layers::VISUAL_AGGRAVATOR,
                rigid_body: None,
            },
        ));
        logger::log_info(&format!("💀 {:?} мёртв, труп оставлен как еда", event.entity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::machine::ZombieMachine;
    use crate::combat::ragdoll::{blend_amount, BoneControl};
    use crate::providers::{AnimationRig, NavAgent, RagdollBody};
    use crate::testkit::Harness;

    fn hit(body_part: SourceId, force: Vec3, amount: i32) -> DamageEvent {
        DamageEvent {
            target: Entity::PLACEHOLDER,
            position: Vec3::new(0.0, 0.0, -1.0),
            force,
            amount,
            body_part,
            // Атакующий прямо перед лицом (forward = -Z)
            instigator_position: Vec3::new(0.0, 0.0, -2.0),
            hit_direction: 0,
        }
    }

    #[test]
    fn test_weak_frontal_upper_body_hit_stays_animated() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let upper = harness.body.segment_id(1);

        {
            let mut io = harness.providers();
            let outcome = machine.take_damage(&mut io, &hit(upper, Vec3::new(0.0, 0.0, 0.5), 40));
            assert!(!outcome.ragdolled);
            assert!(!outcome.died);
        }

        assert_eq!(machine.ctx.stats.upper_body_damage, 40);
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Animated);
        // Фронтальный удар в корпус — средний вариант реакции
        assert_eq!(harness.rig.get_int(params::HIT_TYPE), 5);
        assert!(harness.rig.was_triggered(params::HIT));
    }

    #[test]
    fn test_strong_lower_body_hit_forces_ragdoll() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let leg = harness.body.segment_id(3);

        {
            let mut io = harness.providers();
            let outcome = machine.take_damage(&mut io, &hit(leg, Vec3::new(0.0, 0.0, 5.0), 20));
            assert!(outcome.ragdolled);
        }

        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Ragdoll);
        assert!(machine.ctx.ragdoll.task.is_some(), "подъём запланирован");
        assert!(!harness.nav.is_enabled());
        assert!(!harness.rig.is_enabled());
        assert!(!harness.body.capsule_enabled());
        assert!(!harness.body.is_kinematic(), "сегменты в свободной симуляции");
        assert!(!machine.ctx.in_melee_range);
    }

    #[test]
    fn test_weak_lower_body_hit_still_ragdolls() {
        // Подрубленные ноги роняют независимо от силы удара
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let leg = harness.body.segment_id(4);

        let mut io = harness.providers();
        let outcome = machine.take_damage(&mut io, &hit(leg, Vec3::new(0.0, 0.0, 0.2), 10));
        assert!(outcome.ragdolled);
    }

    #[test]
    fn test_hit_from_behind_forces_ragdoll() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let upper = harness.body.segment_id(1);

        let mut io = harness.providers();
        let mut event = hit(upper, Vec3::new(0.0, 0.0, 0.3), 10);
        event.instigator_position = Vec3::new(0.0, 0.0, 3.0); // за спиной
        let outcome = machine.take_damage(&mut io, &event);
        assert!(outcome.ragdolled);
    }

    #[test]
    fn test_head_damage_to_zero_is_lethal() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let head = harness.body.segment_id(0);

        let mut io = harness.providers();
        let outcome = machine.take_damage(&mut io, &hit(head, Vec3::new(0.0, 0.0, 0.1), 100));

        assert!(outcome.died);
        assert!(outcome.ragdolled);
        assert_eq!(machine.ctx.stats.health, 0);
        assert_eq!(machine.current, AIStateType::Dead);
        assert!(machine.ctx.ragdoll.task.is_none(), "мёртвые не встают");
    }

    #[test]
    fn test_redamage_in_ragdoll_resets_timer_not_mode() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let leg = harness.body.segment_id(3);
        let upper = harness.body.segment_id(1);

        {
            let mut io = harness.providers();
            machine.take_damage(&mut io, &hit(leg, Vec3::new(0.0, 0.0, 5.0), 10));
        }
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Ragdoll);

        // Почти дождались подъёма
        machine.ctx.ragdoll.task = Some(ReanimationTask { remaining: 0.2 });

        {
            let mut io = harness.providers();
            machine.take_damage(&mut io, &hit(upper, Vec3::new(0.0, 0.0, 0.1), 5));
        }

        // Таймер перезапущен, режим не изменился
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Ragdoll);
        let remaining = machine.ctx.ragdoll.task.as_ref().map(|t| t.remaining);
        assert_eq!(remaining, Some(machine.ctx.stats.reanimation_wait_time));
        assert_eq!(machine.ctx.stats.upper_body_damage, 5);
    }

    #[test]
    fn test_bone_control_one_way_cycle() {
        let mut machine = ZombieMachine::standard(AIStateType::Patrol);
        let mut harness = Harness::new();
        let leg = harness.body.segment_id(3);

        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Animated);

        {
            let mut io = harness.providers();
            machine.take_damage(&mut io, &hit(leg, Vec3::new(0.0, 0.0, 5.0), 10));
        }
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Ragdoll);

        // Ожидание истекло → RagdollToAnim
        machine.ctx.ragdoll.task = Some(ReanimationTask { remaining: 0.01 });
        harness.now = 5.0;
        {
            let mut io = harness.providers();
            machine.tick_reanimation(&mut io);
        }
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::RagdollToAnim);
        assert!(harness.rig.is_enabled());
        assert!(harness.body.is_kinematic());
        assert!(
            harness.rig.was_triggered(params::REANIMATE_FROM_BACK)
                || harness.rig.was_triggered(params::REANIMATE_FROM_FRONT)
        );

        // Blend дошёл до 1.0 → Animated, машина в Alerted
        harness.now = 5.0 + 0.1 + machine.ctx.stats.reanimation_blend_time + 0.5;
        {
            let mut io = harness.providers();
            machine.late_blend(&mut io);
        }
        assert_eq!(machine.ctx.ragdoll.bone_control, BoneControl::Animated);
        assert_eq!(machine.current, AIStateType::Alerted);
        assert!(harness.nav.is_enabled());
        assert!(harness.body.capsule_enabled());
    }

    #[test]
    fn test_blend_factor_midpoint() {
        // 0.75с после окна перехода при длительности 1.5с → 0.5
        let start = 20.0;
        let blend = blend_amount(start + 0.1 + 0.75, start, 0.1, 1.5);
        assert!((blend - 0.5).abs() < 1e-6);
    }
}
