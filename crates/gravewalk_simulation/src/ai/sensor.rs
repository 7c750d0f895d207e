//! Sensor Evaluator — фьюжн стимулов в VisualThreat/AudioThreat.
//!
//! Приоритеты и tie-break'и фиксированы: игрок бьёт всё; фонарь не
//! перебивает игрока; звук берётся строго более близкий; еда — только
//! когда нет ни игрока, ни света, ни звука, и агент голоден. Визуальные
//! кандидаты дополнительно проходят конус FOV + raycast на прямую
//! видимость.

use bevy::prelude::*;

use crate::components::{AggravatorKind, ThreatKind};
use crate::providers::{layers, LayerMask, RayHit};

use super::events::{AggravatorInfo, TriggerPhase};
use super::machine::StateContext;

/// Ниже этой сытости зомби интересуется едой
pub const MIN_SATISFACTION: f32 = 0.9;

/// Маска видимости игрока: default + player + чужие body parts
pub const PLAYER_VISIBILITY_MASK: LayerMask =
    LayerMask(layers::DEFAULT | layers::PLAYER | layers::AI_BODY_PART);

/// Маска видимости прочих визуальных раздражителей
pub const VISUAL_AGGRAVATOR_MASK: LayerMask =
    LayerMask(layers::DEFAULT | layers::PLAYER | layers::AI_BODY_PART | layers::VISUAL_AGGRAVATOR);

/// Обновляет угрозы агента по одному trigger event'у.
/// Exit ничего не регистрирует. Отвергнутый кандидат не трогает то, что
/// уже сохранено.
pub fn evaluate_threat(sc: &mut StateContext, phase: TriggerPhase, other: &AggravatorInfo) {
    if phase == TriggerPhase::Exit {
        return;
    }

    let current = sc.ctx.visual_threat.kind;

    match other.kind {
        AggravatorKind::Player => {
            let distance = sc.sensor_position().distance(other.position);
            let closer_player =
                current == ThreatKind::VisualPlayer && distance < sc.ctx.visual_threat.distance;
            if (current != ThreatKind::VisualPlayer || closer_player)
                && collider_is_visible(sc, other, PLAYER_VISIBILITY_MASK)
            {
                let now = sc.io.now;
                sc.ctx.visual_threat.set(
                    ThreatKind::VisualPlayer,
                    Some(other.source),
                    other.position,
                    distance,
                    now,
                );
            }
        }

        AggravatorKind::Flashlight { beam_depth } => {
            if current == ThreatKind::VisualPlayer || beam_depth <= 0.0 {
                return;
            }
            let distance = sc.sensor_position().distance(other.position);
            // Чем длиннее луч и ближе источник, тем сильнее раздражение
            let aggravation = distance / beam_depth;
            if aggravation <= sc.ctx.stats.sight && aggravation <= sc.ctx.stats.intelligence {
                let now = sc.io.now;
                sc.ctx.visual_threat.set(
                    ThreatKind::VisualLight,
                    Some(other.source),
                    other.position,
                    distance,
                    now,
                );
            }
        }

        AggravatorKind::SoundEmitter { radius } => {
            if radius <= 0.0 {
                return;
            }
            let distance = (other.position - sc.sensor_position()).length();

            // 0 в центре источника, 1 на границе радиуса; плохой слух
            // сжимает эффективный радиус
            let mut factor = distance / radius;
            factor += factor * (1.0 - sc.ctx.stats.hearing);
            if factor > 1.0 {
                return;
            }

            if distance < sc.ctx.audio_threat.distance {
                let now = sc.io.now;
                sc.ctx.audio_threat.set(
                    ThreatKind::Audio,
                    Some(other.source),
                    other.position,
                    distance,
                    now,
                );
            }
        }

        AggravatorKind::Food => {
            if current == ThreatKind::VisualPlayer
                || current == ThreatKind::VisualLight
                || sc.ctx.stats.satisfaction > MIN_SATISFACTION
                || sc.ctx.audio_threat.kind != ThreatKind::None
            {
                return;
            }
            let distance = other.position.distance(sc.sensor_position());
            if distance < sc.ctx.visual_threat.distance
                && collider_is_visible(sc, other, VISUAL_AGGRAVATOR_MASK)
            {
                let now = sc.io.now;
                sc.ctx.visual_threat.set(
                    ThreatKind::VisualFood,
                    Some(other.source),
                    other.position,
                    distance,
                    now,
                );
            }
        }
    }
}

/// Конус FOV + луч на прямую видимость.
///
/// Кандидат видим, если угол к нему не больше половины FOV и ближайший
/// hit луча (длиной sensor_radius × sight), не принадлежащий телу самого
/// агента, — это сам кандидат.
pub fn collider_is_visible(sc: &StateContext, other: &AggravatorInfo, mask: LayerMask) -> bool {
    let head = sc.sensor_position();
    let direction = other.position - head;

    let angle = if direction.length_squared() < 1e-8 {
        0.0
    } else {
        direction.angle_between(sc.forward()).to_degrees()
    };
    if angle > sc.ctx.stats.fov * 0.5 {
        return false;
    }

    let range = sc.ctx.sensor_radius * sc.ctx.stats.sight;
    let hits = sc
        .io
        .raycast
        .raycast_all(head, direction.normalize_or_zero(), range, mask);

    let mut closest: Option<&RayHit> = None;
    for hit in &hits {
        if hit.distance >= closest.map(|c| c.distance).unwrap_or(f32::MAX) {
            continue;
        }
        // Собственные body parts не загораживают обзор
        if hit.layer & layers::AI_BODY_PART != 0 {
            let owner = hit.rigid_body.and_then(|rb| sc.io.registry.machine_for(rb));
            if owner == Some(sc.io.entity) {
                continue;
            }
        }
        closest = Some(hit);
    }

    closest.map(|hit| hit.collider == other.source).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::machine::{StateContext, ZombieContext};
    use crate::components::SourceId;
    use crate::testkit::Harness;

    fn context() -> ZombieContext {
        let mut ctx = ZombieContext::default();
        // Видимость на весь сенсорный радиус, чтобы геометрия тестов была простой
        ctx.stats.sight = 1.0;
        ctx
    }

    fn player_info(position: Vec3) -> AggravatorInfo {
        AggravatorInfo {
            kind: AggravatorKind::Player,
            source: SourceId(100),
            position,
        }
    }

    #[test]
    fn test_player_accepted_when_visible() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(100), Vec3::new(0.0, 0.0, -4.0), 0.3, layers::PLAYER, None);

        let mut ctx = context();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        evaluate_threat(&mut sc, TriggerPhase::Stay, &player_info(Vec3::new(0.0, 0.0, -4.0)));

        assert_eq!(ctx.visual_threat.kind, ThreatKind::VisualPlayer);
        assert!((ctx.visual_threat.distance - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_player_outside_fov_rejected() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(100), Vec3::new(0.0, 0.0, 4.0), 0.3, layers::PLAYER, None);

        let mut ctx = context();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        // Игрок за спиной (forward = -Z)
        evaluate_threat(&mut sc, TriggerPhase::Stay, &player_info(Vec3::new(0.0, 0.0, 4.0)));

        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);
    }

    #[test]
    fn test_player_occluded_by_wall_rejected() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(100), Vec3::new(0.0, 0.0, -4.0), 0.3, layers::PLAYER, None);
        // Стена между сенсором и игроком
        harness
            .world
            .add_blocker(SourceId(55), Vec3::new(0.0, 0.0, -2.0), 0.5, layers::DEFAULT, None);

        let mut ctx = context();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        evaluate_threat(&mut sc, TriggerPhase::Stay, &player_info(Vec3::new(0.0, 0.0, -4.0)));

        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);
    }

    #[test]
    fn test_own_body_part_does_not_occlude() {
        let mut harness = Harness::new();
        let capsule = SourceId(70);
        harness
            .world
            .add_blocker(capsule, Vec3::new(0.0, 0.0, -1.0), 0.4, layers::AI_BODY_PART, Some(capsule));
        harness
            .world
            .add_blocker(SourceId(100), Vec3::new(0.0, 0.0, -4.0), 0.3, layers::PLAYER, None);
        harness.registry.register_machine(capsule, Entity::PLACEHOLDER);

        let mut ctx = context();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        evaluate_threat(&mut sc, TriggerPhase::Stay, &player_info(Vec3::new(0.0, 0.0, -4.0)));

        assert_eq!(ctx.visual_threat.kind, ThreatKind::VisualPlayer);
    }

    #[test]
    fn test_exit_phase_registers_nothing() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(100), Vec3::new(0.0, 0.0, -4.0), 0.3, layers::PLAYER, None);

        let mut ctx = context();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        evaluate_threat(&mut sc, TriggerPhase::Exit, &player_info(Vec3::new(0.0, 0.0, -4.0)));

        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);
    }

    #[test]
    fn test_flashlight_does_not_override_player() {
        let mut harness = Harness::new();
        let mut ctx = context();
        ctx.visual_threat.set(ThreatKind::VisualPlayer, Some(SourceId(100)), Vec3::NEG_Z, 1.0, 0.0);

        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        let light = AggravatorInfo {
            kind: AggravatorKind::Flashlight { beam_depth: 10.0 },
            source: SourceId(101),
            position: Vec3::new(0.0, 0.0, -2.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &light);

        assert_eq!(ctx.visual_threat.kind, ThreatKind::VisualPlayer);
    }

    #[test]
    fn test_flashlight_aggravation_factor() {
        let mut harness = Harness::new();
        let mut ctx = context();
        // min(sight, intelligence) = 0.5
        ctx.stats.sight = 1.0;
        ctx.stats.intelligence = 0.5;

        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        // factor = 2 / 10 = 0.2 ≤ 0.5 → принимается, raycast не нужен
        let near = AggravatorInfo {
            kind: AggravatorKind::Flashlight { beam_depth: 10.0 },
            source: SourceId(101),
            position: Vec3::new(0.0, 0.0, -2.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &near);
        assert_eq!(ctx.visual_threat.kind, ThreatKind::VisualLight);

        // factor = 8 / 10 = 0.8 > 0.5 → слабое раздражение, угроза прежняя
        ctx.visual_threat.clear();
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        let far = AggravatorInfo {
            kind: AggravatorKind::Flashlight { beam_depth: 10.0 },
            source: SourceId(101),
            position: Vec3::new(0.0, 0.0, -8.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &far);
        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);
    }

    #[test]
    fn test_audio_accepts_only_strictly_closer() {
        let mut harness = Harness::new();
        let mut ctx = context();
        ctx.audio_threat.set(ThreatKind::Audio, Some(SourceId(200)), Vec3::new(0.0, 0.0, -5.0), 5.0, 0.0);

        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        // Дальше сохранённого — отклоняется
        let farther = AggravatorInfo {
            kind: AggravatorKind::SoundEmitter { radius: 20.0 },
            source: SourceId(201),
            position: Vec3::new(0.0, 0.0, -6.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &farther);
        assert_eq!(ctx.audio_threat.source, Some(SourceId(200)));

        // Ближе — заменяет
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        let closer = AggravatorInfo {
            kind: AggravatorKind::SoundEmitter { radius: 20.0 },
            source: SourceId(202),
            position: Vec3::new(0.0, 0.0, -4.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &closer);
        assert_eq!(ctx.audio_threat.source, Some(SourceId(202)));
        assert!((ctx.audio_threat.distance - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_bad_hearing_shrinks_audio_range() {
        let mut harness = Harness::new();
        let mut ctx = context();
        ctx.stats.hearing = 0.5;

        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };

        // factor = 15/20 × (1 + 0.5) = 1.125 > 1 → не слышно
        let sound = AggravatorInfo {
            kind: AggravatorKind::SoundEmitter { radius: 20.0 },
            source: SourceId(200),
            position: Vec3::new(0.0, 0.0, -15.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &sound);
        assert_eq!(ctx.audio_threat.kind, ThreatKind::None);
    }

    #[test]
    fn test_food_tiebreak_by_distance() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(300), Vec3::new(0.0, 0.0, -8.0), 0.5, layers::VISUAL_AGGRAVATOR, None);

        let mut ctx = context();
        ctx.stats.satisfaction = 0.5;
        ctx.visual_threat.set(ThreatKind::VisualFood, Some(SourceId(301)), Vec3::new(0.0, 0.0, -10.0), 10.0, 0.0);

        // Кандидат на 12м — дальше сохранённых 10м, угроза не меняется
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        let farther = AggravatorInfo {
            kind: AggravatorKind::Food,
            source: SourceId(300),
            position: Vec3::new(0.0, 0.0, -12.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &farther);
        assert_eq!(ctx.visual_threat.distance, 10.0);
        assert_eq!(ctx.visual_threat.source, Some(SourceId(301)));

        // Кандидат на 8м и видим — заменяет
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        let closer = AggravatorInfo {
            kind: AggravatorKind::Food,
            source: SourceId(300),
            position: Vec3::new(0.0, 0.0, -8.0),
        };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &closer);
        assert_eq!(ctx.visual_threat.kind, ThreatKind::VisualFood);
        assert!((ctx.visual_threat.distance - 8.0).abs() < 1e-4);
        assert_eq!(ctx.visual_threat.source, Some(SourceId(300)));
    }

    #[test]
    fn test_food_ignored_when_sated_or_audio_pending() {
        let mut harness = Harness::new();
        harness
            .world
            .add_blocker(SourceId(300), Vec3::new(0.0, 0.0, -4.0), 0.5, layers::VISUAL_AGGRAVATOR, None);

        let food = AggravatorInfo {
            kind: AggravatorKind::Food,
            source: SourceId(300),
            position: Vec3::new(0.0, 0.0, -4.0),
        };

        // Сытый зомби еду игнорирует
        let mut ctx = context();
        ctx.stats.satisfaction = 0.95;
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &food);
        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);

        // Голодный, но со звуковой угрозой — тоже
        let mut ctx = context();
        ctx.stats.satisfaction = 0.5;
        ctx.audio_threat.set(ThreatKind::Audio, Some(SourceId(200)), Vec3::NEG_Z, 1.0, 0.0);
        let mut io = harness.providers();
        let mut sc = StateContext { ctx: &mut ctx, io: &mut io };
        evaluate_threat(&mut sc, TriggerPhase::Stay, &food);
        assert_eq!(ctx.visual_threat.kind, ThreatKind::None);
    }
}
