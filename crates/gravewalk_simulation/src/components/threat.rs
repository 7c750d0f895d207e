//! Модель угроз: Threat, ThreatKind, SourceId

use bevy::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity коллайдера/rigidbody во внешнем мире.
///
/// Используется для сопоставления raycast hits с раздражителями и
/// body parts (реестр переводит id обратно в Entity агента).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct SourceId(pub u64);

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

impl SourceId {
    /// Новый уникальный id (детерминистичен при одинаковом порядке спавна)
    pub fn fresh() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Тип воспринятого стимула, в порядке от "ничего" к звуку
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum ThreatKind {
    #[default]
    None,
    Waypoint,
    VisualPlayer,
    VisualLight,
    VisualFood,
    Audio,
}

/// Потенциальный target для AI: стимул с позицией и дистанцией.
///
/// Перезаписывается каждый тик сенсорами, никогда не накапливается.
/// Инвариант: `distance` ≥ 0 и соответствует последнему пересчёту;
/// после `clear()` — `kind = None`, `distance = +inf`.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct Threat {
    pub kind: ThreatKind,
    pub source: Option<SourceId>,
    pub position: Vec3,
    pub distance: f32,
    /// Момент симуляции, когда угроза была зафиксирована
    pub time: f32,
}

impl Default for Threat {
    fn default() -> Self {
        Self::cleared()
    }
}

impl Threat {
    pub fn cleared() -> Self {
        Self {
            kind: ThreatKind::None,
            source: None,
            position: Vec3::ZERO,
            distance: f32::INFINITY,
            time: 0.0,
        }
    }

    pub fn new(kind: ThreatKind, source: Option<SourceId>, position: Vec3, distance: f32, time: f32) -> Self {
        Self { kind, source, position, distance, time }
    }

    pub fn set(&mut self, kind: ThreatKind, source: Option<SourceId>, position: Vec3, distance: f32, time: f32) {
        self.kind = kind;
        self.source = source;
        self.position = position;
        self.distance = distance.max(0.0);
        self.time = time;
    }

    pub fn clear(&mut self) {
        *self = Self::cleared();
    }

    pub fn is_none(&self) -> bool {
        self.kind == ThreatKind::None
    }
}
