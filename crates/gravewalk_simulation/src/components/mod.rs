//! ECS Components игровых entity
//!
//! Организация по доменам:
//! - threat: модель угроз (Threat, ThreatKind, SourceId)
//! - zombie: характеристики зомби (ZombieStats, пороги урона)
//! - aggravator: раздражители в мире (игрок, фонарь, звук, еда)
//! - waypoints: сети патрульных точек

pub mod aggravator;
pub mod threat;
pub mod waypoints;
pub mod zombie;

// Re-exports для удобного импорта
pub use aggravator::*;
pub use threat::*;
pub use waypoints::*;
pub use zombie::*;
