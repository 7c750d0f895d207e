//! Тестовая обвязка: headless provider'ы + Providers одной строкой.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::ai::machine::Providers;
use crate::components::WaypointNetworks;
use crate::providers::headless::{
    HeadlessNav, HeadlessParticles, HeadlessRagdoll, HeadlessRig, HeadlessWorld,
};
use crate::registry::{PlayerSnapshot, SceneRegistry};

pub(crate) struct Harness {
    pub transform: Transform,
    pub nav: HeadlessNav,
    pub rig: HeadlessRig,
    pub body: HeadlessRagdoll,
    pub world: HeadlessWorld,
    pub registry: SceneRegistry,
    pub particles: HeadlessParticles,
    pub networks: WaypointNetworks,
    pub players: Vec<PlayerSnapshot>,
    pub rng: ChaCha8Rng,
    pub now: f32,
    pub dt: f32,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            transform: Transform::default(),
            nav: HeadlessNav::default(),
            rig: HeadlessRig::default(),
            body: HeadlessRagdoll::humanoid(),
            world: HeadlessWorld::with_ground(),
            registry: SceneRegistry::default(),
            particles: HeadlessParticles::default(),
            networks: WaypointNetworks::default(),
            players: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(7),
            now: 0.0,
            dt: 1.0 / 60.0,
        }
    }

    pub fn providers(&mut self) -> Providers<'_> {
        Providers {
            entity: Entity::PLACEHOLDER,
            transform: &mut self.transform,
            nav: Some(&mut self.nav),
            rig: Some(&mut self.rig),
            body: Some(&mut self.body),
            raycast: &self.world,
            registry: &self.registry,
            particles: &mut self.particles,
            waypoints: &self.networks,
            players: &self.players,
            rng: &mut self.rng,
            dt: self.dt,
            now: self.now,
        }
    }
}
