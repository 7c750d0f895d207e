//! Характеристики зомби: восприятие, vitals, пороги урона
//!
//! Tunables назначаются дизайнером при спавне и не меняются в рантайме,
//! vitals (health, damage аккумуляторы, satisfaction) мутирует симуляция.

use serde::{Deserialize, Serialize};

/// Полный блок характеристик одного зомби.
///
/// Инварианты: satisfaction ∈ [0, 1], health ∈ [0, 100]. Региональные
/// аккумуляторы урона накапливаются без ограничения и клампятся только
/// в точках потребления (веса animator layers, пороги crawl).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZombieStats {
    /// Угол поля зрения в градусах (полный, не половина)
    pub fov: f32,
    /// Качество зрения 0..1 — масштабирует дальность видимости
    pub sight: f32,
    /// Слух 0..1 — 1.0 слышит весь радиус источника
    pub hearing: f32,
    pub aggression: f32,
    pub intelligence: f32,

    pub health: i32,
    pub upper_body_damage: i32,
    pub lower_body_damage: i32,
    /// Выше этого урона в корпус включается upper body layer
    pub upper_body_threshold: i32,
    /// Выше этого урона в ноги зомби хромает
    pub limp_threshold: i32,
    /// С этого урона в ноги зомби может только ползти
    pub crawl_threshold: i32,

    /// Обратная величина голода: 1.0 = сыт
    pub satisfaction: f32,
    /// Скорость восполнения satisfaction при кормёжке (единиц/сек, /100)
    pub replenish_rate: f32,
    /// Скорость истощения satisfaction от движения (масштабируется speed³)
    pub depletion_rate: f32,

    pub scream_chance: f32,
    pub scream_radius: f32,

    /// Пауза после ragdoll перед началом подъёма (сек)
    pub reanimation_wait_time: f32,
    /// Длительность blend'а ragdoll → анимация (сек)
    pub reanimation_blend_time: f32,
}

impl Default for ZombieStats {
    fn default() -> Self {
        Self {
            fov: 50.0,
            sight: 0.5,
            hearing: 1.0,
            aggression: 0.5,
            intelligence: 0.5,
            health: 100,
            upper_body_damage: 0,
            lower_body_damage: 0,
            upper_body_threshold: 30,
            limp_threshold: 30,
            crawl_threshold: 90,
            satisfaction: 1.0,
            replenish_rate: 0.5,
            depletion_rate: 0.1,
            scream_chance: 1.0,
            scream_radius: 20.0,
            reanimation_wait_time: 3.0,
            reanimation_blend_time: 1.5,
        }
    }
}

impl ZombieStats {
    /// Ноги разбиты настолько, что ходьба невозможна
    pub fn is_crawling(&self) -> bool {
        self.lower_body_damage >= self.crawl_threshold
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}
