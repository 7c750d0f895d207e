//! Раздражители — объекты мира, способные поднять угрозу у агента.
//!
//! Игрок, луч фонаря, источник звука, еда (трупы). В engine-сборке
//! trigger events приходят от физики; headless-система
//! `emit_sensor_overlaps` генерирует их из этих компонентов.

use bevy::prelude::*;

use super::threat::SourceId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggravatorKind {
    Player,
    /// Луч фонаря; `beam_depth` — протяжённость триггера вдоль оси луча
    Flashlight { beam_depth: f32 },
    /// Сферический источник звука с радиусом слышимости
    SoundEmitter { radius: f32 },
    Food,
}

/// Компонент-раздражитель. `source` обязан совпадать с id коллайдера
/// этого объекта в raycast-мире, иначе visibility test его не подтвердит.
#[derive(Component, Debug, Clone)]
pub struct Aggravator {
    pub kind: AggravatorKind,
    pub source: SourceId,
}

/// Временный источник звука (крик, выстрел) — живёт `remaining` секунд
#[derive(Component, Debug, Clone)]
pub struct SoundDecay {
    pub remaining: f32,
}
