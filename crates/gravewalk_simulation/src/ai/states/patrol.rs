//! Patrol — обход waypoint-сети, пока мир спокоен.

use bevy::prelude::*;

use crate::ai::machine::{AIStateType, StateContext};
use crate::components::ThreatKind;
use crate::providers::PathStatus;
use serde::{Deserialize, Serialize};

use super::{look_rotation, ZombieState};

/// Тюнинг патруля (конфигурация, не контекст)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatrolState {
    /// Порог угла к маршруту, после которого разворачиваемся на месте
    pub turn_on_spot_threshold: f32,
    pub slerp_speed: f32,
    pub speed: f32,
}

impl Default for PatrolState {
    fn default() -> Self {
        Self {
            turn_on_spot_threshold: 80.0,
            slerp_speed: 5.0,
            speed: 1.0,
        }
    }
}

impl ZombieState for PatrolState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Patrol
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        sc.nav_control(true, false);
        sc.ctx.speed = self.speed;
        sc.ctx.seeking = 0;
        sc.ctx.feeding = false;
        sc.ctx.attack_type = 0;

        let waypoint = sc.waypoint_position(false);
        sc.set_destination(waypoint);
        sc.nav_resume();
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
        // Игрок — высший приоритет
        if sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Pursuit;
        }

        if sc.ctx.visual_threat.kind == ThreatKind::VisualLight {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Alerted;
        }

        if sc.ctx.audio_threat.kind == ThreatKind::Audio {
            let threat = sc.ctx.audio_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Alerted;
        }

        // Еда отвлекает только если голод перевешивает крюк до неё
        if sc.ctx.visual_threat.kind == ThreatKind::VisualFood {
            let hunger = 1.0 - sc.ctx.stats.satisfaction;
            if hunger > sc.ctx.visual_threat.distance / sc.ctx.sensor_radius {
                let threat = sc.ctx.visual_threat;
                sc.ctx.set_target(threat);
                return AIStateType::Alerted;
            }
        }

        let (pending, path_invalid, steering, desired) = match sc.io.nav.as_ref() {
            Some(nav) => (
                nav.path_pending(),
                nav.path_stale()
                    || (!nav.has_path() && !nav.path_pending())
                    || nav.path_status() != PathStatus::Complete,
                nav.steering_target(),
                nav.desired_velocity(),
            ),
            None => (false, false, sc.position(), Vec3::ZERO),
        };

        if pending {
            sc.ctx.speed = 0.0;
            return AIStateType::Patrol;
        }
        sc.ctx.speed = self.speed;

        // Слишком большой доворот к маршруту плавно не выполнить —
        // разворачиваемся на месте через Alerted
        let to_steering = steering - sc.position();
        if to_steering.length_squared() > 1e-8 {
            let angle = sc.forward().angle_between(to_steering).to_degrees();
            if angle > self.turn_on_spot_threshold {
                return AIStateType::Alerted;
            }
        }

        if !sc.ctx.use_root_rotation() && desired.length_squared() > 1e-8 {
            let current = sc.io.transform.rotation;
            let target = look_rotation(desired);
            sc.io.transform.rotation = current.slerp(target, (sc.io.dt * self.slerp_speed).min(1.0));
        }

        // Потерянный/битый путь — перепрокладываем к следующей точке
        if path_invalid {
            let waypoint = sc.waypoint_position(true);
            sc.set_destination(waypoint);
        }

        AIStateType::Patrol
    }

    fn on_destination_reached(&mut self, sc: &mut StateContext, reached: bool) {
        if !reached {
            return;
        }
        if sc.ctx.target_kind() == ThreatKind::Waypoint {
            let waypoint = sc.waypoint_position(true);
            sc.set_destination(waypoint);
        }
    }
}
