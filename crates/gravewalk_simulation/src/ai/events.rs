//! AI Events — события от tactical layer для AI систем.
//!
//! Engine-сборка шлёт SensorEvent из trigger-коллбеков физики; headless
//! режим генерирует их системой `emit_sensor_overlaps`. Доставка
//! синхронная, в пределах физической фазы тика — state update читает уже
//! обновлённые угрозы.

use bevy::prelude::*;

use crate::components::{AggravatorKind, SourceId};

use super::machine::AIStateType;

/// Фаза trigger-контакта сенсора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    Enter,
    Stay,
    Exit,
}

/// Снимок раздражителя на момент контакта
#[derive(Debug, Clone)]
pub struct AggravatorInfo {
    pub kind: AggravatorKind,
    pub source: SourceId,
    pub position: Vec3,
}

/// Раздражитель в сенсорном объёме агента
#[derive(Event, Debug, Clone)]
pub struct SensorEvent {
    pub agent: Entity,
    pub phase: TriggerPhase,
    pub other: AggravatorInfo,
}

/// Принудительный перевод машины в состояние (cinematics, скрипты)
#[derive(Event, Debug, Clone, Copy)]
pub struct StateOverride {
    pub agent: Entity,
    pub state: AIStateType,
}
