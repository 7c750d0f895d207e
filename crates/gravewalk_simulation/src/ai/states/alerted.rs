//! Alerted — поиск источника тревоги разворотом на месте.
//!
//! Fallback-состояние: сюда попадают при потере цели, после подъёма из
//! ragdoll и при слишком крутом довороте в патруле. Каждый тик
//! переоценивает высшую угрозу; таймер поиска истёк — возврат к
//! маршруту.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::machine::{AIStateType, RootMotionHandle, StateContext};
use crate::components::ThreatKind;

use super::{find_signed_angle, look_rotation, ZombieState};

#[derive(Debug, Clone)]
pub struct AlertedState {
    /// Длительность поиска до возврата в Patrol
    pub max_duration: f32,
    /// Доворот к waypoint'у, при котором можно снова идти
    pub waypoint_angle_threshold: f32,
    /// Доворот к звуку/свету, при котором начинаем Pursuit
    pub threat_angle_threshold: f32,
    /// Период смены направления разворота
    pub direction_change_time: f32,
    pub slerp_speed: f32,

    timer: f32,
    direction_change_timer: f32,
    /// Turn-on-spot анимации ведут поворот тела
    root_rotation: RootMotionHandle,
}

impl Default for AlertedState {
    fn default() -> Self {
        Self {
            max_duration: 10.0,
            waypoint_angle_threshold: 90.0,
            threat_angle_threshold: 10.0,
            direction_change_time: 1.5,
            slerp_speed: 45.0,
            timer: 0.0,
            direction_change_timer: 0.0,
            root_rotation: RootMotionHandle::new(0, 1),
        }
    }
}

impl ZombieState for AlertedState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Alerted
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        sc.nav_control(true, false);
        sc.ctx.speed = 0.0;
        sc.ctx.seeking = 0;
        sc.ctx.feeding = false;
        sc.ctx.attack_type = 0;

        self.timer = self.max_duration;
        self.direction_change_timer = 0.0;
        // Turn-on-spot анимации есть только при живом rig'е
        if sc.io.rig.is_some() {
            self.root_rotation.acquire(sc.ctx);
        }

        // Увидел игрока — шанс заорать и поднять округу
        if sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer {
            let chance = sc.ctx.stats.scream_chance;
            if sc.io.rng.gen::<f32>() < chance {
                sc.scream();
            }
        }
    }

    fn on_exit(&mut self, sc: &mut StateContext) {
        self.root_rotation.release(sc.ctx);
        sc.ctx.seeking = 0;
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
        self.timer -= sc.io.dt;
        self.direction_change_timer += sc.io.dt;

        // Поиск затянулся — возвращаемся на маршрут
        if self.timer <= 0.0 {
            let waypoint = sc.waypoint_position(false);
            sc.set_destination(waypoint);
            sc.nav_resume();
            self.timer = self.max_duration;
        }

        if sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Pursuit;
        }

        if sc.ctx.audio_threat.kind == ThreatKind::Audio {
            let threat = sc.ctx.audio_threat;
            sc.ctx.set_target(threat);
            self.timer = self.max_duration;
        }

        if sc.ctx.visual_threat.kind == ThreatKind::VisualLight {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            self.timer = self.max_duration;
        }

        // Еда берётся без проверки сытости: сенсор уже отфильтровал
        // сытых, а крюк до неё здесь не оцениваем
        if sc.ctx.visual_threat.kind == ThreatKind::VisualFood {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Pursuit;
        }

        let target = sc.ctx.target();
        match target.kind {
            ThreatKind::Audio | ThreatKind::VisualLight => {
                let angle = find_signed_angle(sc.forward(), target.position - sc.position());
                if angle.abs() <= self.threat_angle_threshold {
                    return AIStateType::Pursuit;
                }

                if self.direction_change_timer > self.direction_change_time {
                    // Сообразительные разворачиваются в нужную сторону,
                    // остальные — куда попало
                    let seeking = if sc.io.rng.gen::<f32>() < sc.ctx.stats.intelligence {
                        angle.signum() as i32
                    } else if sc.io.rng.gen::<bool>() {
                        1
                    } else {
                        -1
                    };
                    sc.ctx.seeking = seeking;
                    self.direction_change_timer = 0.0;
                }
            }
            ThreatKind::Waypoint => {
                let steering = sc
                    .io
                    .nav
                    .as_ref()
                    .map(|nav| nav.steering_target())
                    .unwrap_or(target.position);
                let angle = find_signed_angle(sc.forward(), steering - sc.position());
                if angle.abs() <= self.waypoint_angle_threshold {
                    return AIStateType::Patrol;
                }
                if self.direction_change_timer > self.direction_change_time {
                    sc.ctx.seeking = angle.signum() as i32;
                    self.direction_change_timer = 0.0;
                }
            }
            _ => {}
        }

        // Нет root motion (headless без turn-анимаций) — доворачиваем сами
        if !sc.ctx.use_root_rotation() {
            let to_target = sc.ctx.target().position - sc.position();
            if to_target.length_squared() > 1e-8 {
                let current = sc.io.transform.rotation;
                sc.io.transform.rotation =
                    current.slerp(look_rotation(to_target), (sc.io.dt * self.slerp_speed / 45.0).min(1.0));
            }
        }

        AIStateType::Alerted
    }
}
