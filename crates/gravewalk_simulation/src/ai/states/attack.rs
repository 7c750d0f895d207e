//! Attack — ближний бой, пока игрок в melee-диапазоне.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::machine::{AIStateType, StateContext};
use crate::components::ThreatKind;
use serde::{Deserialize, Serialize};

use super::{look_rotation, ZombieState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackState {
    pub speed: f32,
    pub stopping_distance: f32,
    pub look_at_weight: f32,
    pub look_at_angle_threshold: f32,
    pub slerp_speed: f32,

    #[serde(skip)]
    current_look_at_weight: f32,
}

impl Default for AttackState {
    fn default() -> Self {
        Self {
            speed: 0.0,
            stopping_distance: 1.0,
            look_at_weight: 0.7,
            look_at_angle_threshold: 15.0,
            slerp_speed: 5.0,
            current_look_at_weight: 0.0,
        }
    }
}

impl ZombieState for AttackState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Attack
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        sc.nav_control(true, false);
        sc.ctx.seeking = 0;
        sc.ctx.feeding = false;
        // Вариант атаки перебрасывается каждый тик, пока дерёмся
        sc.ctx.attack_type = sc.io.rng.gen_range(1..100);
        sc.ctx.speed = self.speed;
        self.current_look_at_weight = 0.0;
    }

    fn on_exit(&mut self, sc: &mut StateContext) {
        sc.ctx.attack_type = 0;
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
        let distance = sc.position().distance(sc.ctx.target().position);
        sc.ctx.speed = if distance < self.stopping_distance { 0.0 } else { self.speed };

        if sc.ctx.visual_threat.kind == ThreatKind::VisualPlayer {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);

            if !sc.ctx.in_melee_range {
                return AIStateType::Pursuit;
            }

            if !sc.ctx.use_root_rotation() {
                let mut target_position = sc.ctx.target().position;
                target_position.y = sc.position().y;
                let desired = look_rotation(target_position - sc.position());
                let current = sc.io.transform.rotation;
                sc.io.transform.rotation =
                    current.slerp(desired, (sc.io.dt * self.slerp_speed).min(1.0));
            }

            sc.ctx.attack_type = sc.io.rng.gen_range(1..100);
            return AIStateType::Attack;
        }

        // Игрок пропал из визуального слота — доворачиваемся на последнюю
        // позицию и уходим переобнаруживать
        if !sc.ctx.use_root_rotation() {
            let mut target_position = sc.ctx.target().position;
            target_position.y = sc.position().y;
            sc.io.transform.rotation = look_rotation(target_position - sc.position());
        }

        AIStateType::Alerted
    }

    fn on_animator_ik(&mut self, sc: &mut StateContext) {
        let target_position = sc.ctx.target().position;
        let to_target = target_position - sc.position();
        if to_target.length_squared() < 1e-8 {
            return;
        }
        let within = sc.forward().angle_between(to_target).to_degrees() < self.look_at_angle_threshold;

        let goal = if within { self.look_at_weight } else { 0.0 };
        self.current_look_at_weight += (goal - self.current_look_at_weight) * sc.io.dt.min(1.0);

        let weight = self.current_look_at_weight;
        if let Some(rig) = sc.io.rig.as_mut() {
            rig.set_look_at(target_position + Vec3::Y, weight);
        }
    }
}
