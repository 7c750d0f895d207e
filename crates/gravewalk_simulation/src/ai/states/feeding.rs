//! Feeding — кормёжка на достигнутой еде.
//!
//! Скорость 0; тело мягко подтягивается к туше (голова как якорь);
//! satisfaction восполняется, только пока rig подтверждает активную
//! feeding-анимацию.

use bevy::prelude::*;

use crate::ai::machine::{params, AIStateType, StateContext};
use crate::components::ThreatKind;
use crate::providers::Bone;
use serde::{Deserialize, Serialize};

use super::{look_rotation, ZombieState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingState {
    pub slerp_speed: f32,
    /// Интервал косметических всплесков крови (сек)
    pub blood_burst_time: f32,
    pub blood_burst_amount: u32,

    #[serde(skip)]
    timer: f32,
}

impl Default for FeedingState {
    fn default() -> Self {
        Self {
            slerp_speed: 5.0,
            blood_burst_time: 0.1,
            blood_burst_amount: 10,
            timer: 0.0,
        }
    }
}

impl ZombieState for FeedingState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Feeding
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        self.timer = 0.0;

        sc.ctx.feeding = true;
        sc.ctx.seeking = 0;
        sc.ctx.speed = 0.0;
        sc.ctx.attack_type = 0;

        sc.nav_control(true, false);
    }

    fn on_exit(&mut self, sc: &mut StateContext) {
        sc.ctx.feeding = false;
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
        self.timer += sc.io.dt;

        // Наелись — возвращаемся к маршруту через Alerted
        if sc.ctx.stats.satisfaction > 0.9 {
            sc.waypoint_position(false);
            return AIStateType::Alerted;
        }

        // Любая не-пищевая угроза прерывает кормёжку
        if sc.ctx.visual_threat.kind != ThreatKind::None
            && sc.ctx.visual_threat.kind != ThreatKind::VisualFood
        {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Alerted;
        }

        if sc.ctx.audio_threat.kind == ThreatKind::Audio {
            let threat = sc.ctx.audio_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Alerted;
        }

        let feeding_active = sc
            .io
            .rig
            .as_ref()
            .map(|rig| {
                rig.is_state_active(params::CINEMATIC_LAYER, params::FEEDING_STATE)
                    || rig.is_state_active(params::CINEMATIC_LAYER, params::CRAWL_FEEDING_STATE)
            })
            .unwrap_or(false);

        if feeding_active {
            let replenish = sc.ctx.stats.replenish_rate;
            sc.ctx.stats.satisfaction =
                (sc.ctx.stats.satisfaction + sc.io.dt * replenish / 100.0).min(1.0);

            if self.timer > self.blood_burst_time {
                let mouth = sc
                    .io
                    .rig
                    .as_ref()
                    .map(|rig| rig.bone_position(Bone::Head))
                    .unwrap_or(sc.position());
                let rotation = sc.io.transform.rotation;
                sc.io.particles.emit(mouth, rotation, self.blood_burst_amount);
                self.timer = 0.0;
            }
        }

        if !sc.ctx.use_root_rotation() {
            let mut target_position = sc.ctx.target().position;
            target_position.y = sc.position().y;
            let to_target = target_position - sc.position();
            if to_target.length_squared() > 1e-8 {
                let current = sc.io.transform.rotation;
                sc.io.transform.rotation =
                    current.slerp(look_rotation(to_target), (sc.io.dt * self.slerp_speed).min(1.0));
            }
        }

        // Корректирующее подтягивание: голова должна лежать на туше
        if let Some(rig) = sc.io.rig.as_ref() {
            let head = rig.bone_position(Bone::Head);
            let head_to_target = sc.ctx.target().position - head;
            let position = sc.io.transform.translation;
            sc.io.transform.translation =
                position.lerp(position + head_to_target, sc.io.dt.min(1.0));
        }

        AIStateType::Feeding
    }
}
