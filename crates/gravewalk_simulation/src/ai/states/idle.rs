//! Idle — стоим и ждём; стартовое состояние по умолчанию.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::machine::{AIStateType, StateContext};
use crate::components::ThreatKind;

use super::ZombieState;

#[derive(Debug, Clone)]
pub struct IdleState {
    /// Диапазон времени простоя (сек)
    pub idle_time_range: (f32, f32),

    timer: f32,
}

impl Default for IdleState {
    fn default() -> Self {
        Self {
            idle_time_range: (5.0, 15.0),
            timer: 0.0,
        }
    }
}

impl ZombieState for IdleState {
    fn state_type(&self) -> AIStateType {
        AIStateType::Idle
    }

    fn on_enter(&mut self, sc: &mut StateContext) {
        let (min, max) = self.idle_time_range;
        self.timer = if max > min { sc.io.rng.gen_range(min..max) } else { min };

        sc.nav_control(true, false);
        sc.ctx.speed = 0.0;
        sc.ctx.seeking = 0;
        sc.ctx.feeding = false;
        sc.ctx.attack_type = 0;
        sc.ctx.clear_target();
    }

    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType {
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

        if sc.ctx.visual_threat.kind == ThreatKind::VisualFood {
            let threat = sc.ctx.visual_threat;
            sc.ctx.set_target(threat);
            return AIStateType::Pursuit;
        }

        self.timer -= sc.io.dt;
        if self.timer <= 0.0 {
            return AIStateType::Patrol;
        }

        AIStateType::Idle
    }
}
