//! Сети патрульных точек.
//!
//! Сеть — shared read-only ресурс; индекс обхода живёт в контексте
//! агента, а не в сети.

use bevy::prelude::*;

/// Упорядоченный список патрульных точек
#[derive(Debug, Clone, Default)]
pub struct WaypointNetwork {
    pub waypoints: Vec<Vec3>,
}

impl WaypointNetwork {
    pub fn new(waypoints: Vec<Vec3>) -> Self {
        Self { waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Все сети уровня; агент хранит индекс своей сети
#[derive(Resource, Debug, Clone, Default)]
pub struct WaypointNetworks {
    networks: Vec<WaypointNetwork>,
}

impl WaypointNetworks {
    /// Регистрирует сеть, возвращает её индекс для агентов
    pub fn add(&mut self, network: WaypointNetwork) -> usize {
        self.networks.push(network);
        self.networks.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&WaypointNetwork> {
        self.networks.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_network_is_none() {
        let networks = WaypointNetworks::default();
        assert!(networks.get(0).is_none());
    }

    #[test]
    fn test_add_returns_index() {
        let mut networks = WaypointNetworks::default();
        let a = networks.add(WaypointNetwork::new(vec![Vec3::ZERO]));
        let b = networks.add(WaypointNetwork::new(vec![Vec3::X, Vec3::Z]));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(networks.get(b).map(|n| n.len()), Some(2));
    }
}
