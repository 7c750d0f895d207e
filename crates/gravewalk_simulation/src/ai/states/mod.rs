//! Behavior States — закрытый набор состояний зомби.
//!
//! Состояние не хранит контекст между тиками, только свой тюнинг
//! (скорости, пороги) и таймеры. Единственный источник переходов в
//! нормальной работе — `on_update`.

use bevy::prelude::*;

use super::events::{AggravatorInfo, TriggerPhase};
use super::machine::{AIStateType, StateContext};
use super::sensor;

mod alerted;
mod attack;
mod feeding;
mod idle;
mod patrol;
mod pursuit;

pub use alerted::AlertedState;
pub use attack::AttackState;
pub use feeding::FeedingState;
pub use idle::IdleState;
pub use patrol::PatrolState;
pub use pursuit::PursuitState;

/// Контракт состояния. Default-реализация `on_trigger_event` отдаёт
/// событие sensor evaluator'у — все зомби-состояния разделяют одну
/// сенсорику.
pub trait ZombieState: Send + Sync {
    fn state_type(&self) -> AIStateType;

    fn on_enter(&mut self, _sc: &mut StateContext) {}
    fn on_exit(&mut self, _sc: &mut StateContext) {}
    fn on_update(&mut self, sc: &mut StateContext) -> AIStateType;
    fn on_destination_reached(&mut self, _sc: &mut StateContext, _reached: bool) {}
    fn on_animator_ik(&mut self, _sc: &mut StateContext) {}

    fn on_trigger_event(&mut self, sc: &mut StateContext, phase: TriggerPhase, other: &AggravatorInfo) {
        sensor::evaluate_threat(sc, phase, other);
    }
}

/// Знаковый угол между векторами в градусах; положительный — поворот от
/// `from` к `to` против часовой вокруг +Y.
pub fn find_signed_angle(from: Vec3, to: Vec3) -> f32 {
    if from == to || from.length_squared() < 1e-8 || to.length_squared() < 1e-8 {
        return 0.0;
    }
    let angle = from.angle_between(to).to_degrees();
    angle * from.cross(to).y.signum()
}

/// Горизонтальный поворот "смотреть вдоль direction" (forward = -Z)
pub fn look_rotation(direction: Vec3) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < 1e-8 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(f32::atan2(-flat.x, -flat.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_angle_sign_matches_rotation_direction() {
        let forward = Vec3::NEG_Z;
        let left = Vec3::NEG_X; // против часовой вокруг +Y от -Z

        let angle = find_signed_angle(forward, left);
        assert!((angle.abs() - 90.0).abs() < 1e-3);

        // Поворот на полученный угол совмещает векторы
        let rotated = Quat::from_rotation_y(angle.to_radians()) * forward;
        assert!((rotated - left).length() < 1e-4);
    }

    #[test]
    fn test_signed_angle_identical_vectors() {
        assert_eq!(find_signed_angle(Vec3::NEG_Z, Vec3::NEG_Z), 0.0);
    }

    #[test]
    fn test_look_rotation_faces_direction() {
        let rotation = look_rotation(Vec3::new(1.0, 0.0, 0.0));
        let forward = rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::X).length() < 1e-4);

        // Вертикальная компонента не влияет
        let rotation = look_rotation(Vec3::new(0.0, 5.0, -1.0));
        let forward = rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-4);
    }
}
