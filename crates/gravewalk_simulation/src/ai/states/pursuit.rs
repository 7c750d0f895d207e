//! Pursuit — преследование текущего target'а.
//!
//! Repath дросселируется интервалом clamp(distance × multiplier, min,
//! max): чем ближе цель, тем чаще пересчитываем путь. Преследование
//! ограничено по времени — по истечении зомби сдаётся и уходит в Patrol.

use bevy::prelude::*;

use crate::ai::machine::{AIStateType, StateContext};
use crate::components::ThreatKind;
use crate::providers::PathStatus;
use serde::{Deserialize, Serialize};

use super::{look_rotation, ZombieState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PursuitState {
    pub speed: f32,
    pub slerp_speed: f32,
    pub repath_distance_multiplier: f32,
    pub repath_visual_min_duration: f32,
    pub repath_visual_max_duration: f32,
    pub repath_audio_min_duration: f32,
    pub repath_audio_max_duration: f32,
    /// Максимальная длительность преследования до отказа
    pub max_duration: f32,

    #[serde(skip)]
    timer: f32,
    #[serde(skip)]
    repath_timer: f32,
}

impl Default for PursuitState {
    fn default() -> Self {
        Self {
            speed: 2.0,
            slerp_speed: 5.0,
            repath_distance_multiplier: 0.035,
            repath_visual_min_duration: 0.05,
            repath_visual_max_duration: 5.0,
            repath_audio_min_duration: 0.25,
            repath_audio_max_duration: 5.0,
            max_duration: 40.0,
            timer: 0.0,
            repath_timer: 0.0,
        }
    }
}

/// Интервал между repath'ами как функция дистанции до цели
pub fn repath_interval(distance: f32, multiplier: f32, min: f32, max: f32) -> f32 {
    (distance * multiplier).clamp(min, max)
}

impl ZombieState for PursuitState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Pursuit
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        sc.nav_control(true, false);
        sc.ctx.speed = self.speed;
        sc.ctx.seeking = 0;
        sc.ctx.feeding = false;
        sc.ctx.attack_type = 0;

        self.timer = 0.0;
        self.repath_timer = 0.0;

        let target = sc.ctx.target().position;
        sc.set_destination(target);
        sc.nav_resume();
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
        self.timer += sc.io.dt;
        self.repath_timer += sc.io.dt;

        // Слишком долго гоняемся — сдаёмся
        if self.timer > self.max_duration {
            return AIStateType::Patrol;
        }

        // Догнали игрока до melee-дистанции
        if sc.ctx.target_kind() == ThreatKind::VisualPlayer && sc.ctx.in_melee_range {
            return AIStateType::Attack;
        }

        // Дошли до источника интереса
        if sc.ctx.is_target_reached() {
            match sc.ctx.target_kind() {
                ThreatKind::Audio | ThreatKind::VisualLight => {
                    sc.ctx.clear_target();
                    return AIStateType::Alerted; // ищем причину на месте
                }
                ThreatKind::VisualFood => {
                    return AIStateType::Feeding;
                }
                _ => {}
            }
        }

        let (pending, path_invalid, desired) = match sc.io.nav.as_ref() {
            Some(nav) => (
                nav.path_pending(),
                nav.path_stale()
                    || (!nav.has_path() && !nav.path_pending())
                    || nav.path_status() != PathStatus::Complete,
                nav.desired_velocity(),
            ),
            None => (false, false, Vec3::ZERO),
        };

        // Путь развалился — пробуем переобнаружить цель из Alerted
        if path_invalid {
            return AIStateType::Alerted;
        }

        if pending {
            sc.ctx.speed = 0.0;
        } else {
            sc.ctx.speed = self.speed;

            if !sc.ctx.use_root_rotation()
                && sc.ctx.target_kind() == ThreatKind::VisualPlayer
                && sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer
                && sc.ctx.is_target_reached()
            {
                // Вплотную к игроку — смотрим прямо на него, без slerp'а
                let mut target_position = sc.ctx.target().position;
                target_position.y = sc.position().y;
                sc.io.transform.rotation = look_rotation(target_position - sc.position());
            } else if !sc.ctx.use_root_rotation() && !sc.ctx.is_target_reached() {
                if desired.length_squared() > 1e-8 {
                    let current = sc.io.transform.rotation;
                    let target = look_rotation(desired);
                    sc.io.transform.rotation =
                        current.slerp(target, (sc.io.dt * self.slerp_speed).min(1.0));
                }
            } else if sc.ctx.is_target_reached() {
                return AIStateType::Alerted;
            }
        }

        // Игрок в поле зрения — обновляем цель и остаёмся в погоне
        if sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer {
            if sc.ctx.target().position != sc.ctx.visual_threat.position {
                let interval = repath_interval(
                    sc.ctx.visual_threat.distance,
                    self.repath_distance_multiplier,
                    self.repath_visual_min_duration,
                    self.repath_visual_max_duration,
                );
                if interval < self.repath_timer {
                    let position = sc.ctx.visual_threat.position;
                    sc.set_destination(position);
                    self.repath_timer = 0.0;
                }
            }
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Pursuit;
        }

        // Цель — последняя известная позиция игрока: ничто её не перебивает
        if sc.ctx.target_kind() == ThreatKind::VisualPlayer {
            return AIStateType::Pursuit;
        }

        if sc.ctx.visual_threat.kind == ThreatKind::VisualLight {
            match sc.ctx.target_kind() {
                // Свет приоритетнее звука и еды
                ThreatKind::Audio | ThreatKind::VisualFood => {
                    let threat = sc.ctx.visual_threat;
                    sc.ctx.set_target(threat);
                    return AIStateType::Alerted;
                }
                ThreatKind::VisualLight => {
                    if sc.ctx.target().source == sc.ctx.visual_threat.source {
                        if sc.ctx.target().position != sc.ctx.visual_threat.position {
                            let interval = repath_interval(
                                sc.ctx.visual_threat.distance,
                                self.repath_distance_multiplier,
                                self.repath_visual_min_duration,
                                self.repath_visual_max_duration,
                            );
                            if interval < self.repath_timer {
                                let position = sc.ctx.visual_threat.position;
                                sc.set_destination(position);
                                self.repath_timer = 0.0;
                            }
                        }
                        let threat = sc.ctx.visual_threat;
                        sc.ctx.set_target(threat);
                        return AIStateType::Pursuit;
                    }
                    // Другой источник света — переоцениваем из Alerted
                    let threat = sc.ctx.visual_threat;
                    sc.ctx.set_target(threat);
                    return AIStateType::Alerted;
                }
                _ => {}
            }
        } else if sc.ctx.audio_threat.kind == ThreatKind::Audio {
            match sc.ctx.target_kind() {
                ThreatKind::VisualFood => {
                    let threat = sc.ctx.audio_threat;
                    sc.ctx.set_target(threat);
                    return AIStateType::Alerted;
                }
                ThreatKind::Audio => {
                    if sc.ctx.target().source == sc.ctx.audio_threat.source {
                        if sc.ctx.target().position != sc.ctx.audio_threat.position {
                            let interval = repath_interval(
                                sc.ctx.audio_threat.distance,
                                self.repath_distance_multiplier,
                                self.repath_audio_min_duration,
                                self.repath_audio_max_duration,
                            );
                            if interval < self.repath_timer {
                                let position = sc.ctx.audio_threat.position;
                                sc.set_destination(position);
                                self.repath_timer = 0.0;
                            }
                        }
                        let threat = sc.ctx.audio_threat;
                        sc.ctx.set_target(threat);
                        return AIStateType::Pursuit;
                    }
                    let threat = sc.ctx.audio_threat;
                    sc.ctx.set_target(threat);
                    return AIStateType::Alerted;
                }
                _ => {}
            }
        }

        AIStateType::Pursuit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repath_interval_clamped() {
        // distance 100 × 0.035 = 3.5 внутри [0.05, 5.0]
        assert_eq!(repath_interval(100.0, 0.035, 0.05, 5.0), 3.5);

        // Вплотную — не чаще min
        assert_eq!(repath_interval(0.1, 0.035, 0.05, 5.0), 0.05);

        // Далеко — не реже max
        assert_eq!(repath_interval(1000.0, 0.035, 0.05, 5.0), 5.0);
    }

    #[test]
    fn test_default_tunables() {
        let state = PursuitState::default();
        assert_eq!(state.repath_distance_multiplier, 0.035);
        assert_eq!(state.max_duration, 40.0);
    }
}
