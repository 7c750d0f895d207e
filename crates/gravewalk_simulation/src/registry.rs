//! SceneRegistry — сопоставление world identity → ECS entity.
//!
//! Явно конструируемый ресурс сессии (никаких глобальных singleton'ов):
//! raycast возвращает SourceId коллайдера, реестр переводит его во
//! владеющего агента (исключение собственных body parts) или в метаданные
//! игрока.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::components::SourceId;

/// Метаданные игрока для AI: melee-триггер и damage-коллайдер
#[derive(Component, Debug, Clone, Copy)]
pub struct Player {
    pub collider: SourceId,
    /// Радиус melee-триггера вокруг игрока (sticky detector)
    pub melee_radius: f32,
}

/// Снимок игрока на текущий тик (собирается системами для provider'ов)
#[derive(Debug, Clone, Copy)]
pub struct PlayerSnapshot {
    pub entity: Entity,
    pub collider: SourceId,
    pub position: Vec3,
    pub melee_radius: f32,
}

#[derive(Resource, Debug, Default)]
pub struct SceneRegistry {
    machines: HashMap<SourceId, Entity>,
    players: HashMap<SourceId, Entity>,
}

impl SceneRegistry {
    /// Привязывает коллайдер/сенсор/body part к его state machine
    pub fn register_machine(&mut self, id: SourceId, entity: Entity) {
        self.machines.insert(id, entity);
    }

    pub fn machine_for(&self, id: SourceId) -> Option<Entity> {
        self.machines.get(&id).copied()
    }

    pub fn register_player(&mut self, id: SourceId, entity: Entity) {
        self.players.insert(id, entity);
    }

    pub fn player_for(&self, id: SourceId) -> Option<Entity> {
        self.players.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_lookup() {
        let mut registry = SceneRegistry::default();
        let id = SourceId(42);
        registry.register_machine(id, Entity::PLACEHOLDER);

        assert_eq!(registry.machine_for(id), Some(Entity::PLACEHOLDER));
        assert_eq!(registry.machine_for(SourceId(43)), None);
    }

    #[test]
    fn test_player_lookup_is_separate_namespace() {
        let mut registry = SceneRegistry::default();
        registry.register_player(SourceId(1), Entity::PLACEHOLDER);

        assert!(registry.player_for(SourceId(1)).is_some());
        assert!(registry.machine_for(SourceId(1)).is_none());
    }
}
