//! Тесты детерминизма
//!
//! Одинаковый seed → идентичные траектории, состояния и vitals после
//! сотен тиков полного сценария (патруль, погоня, крики).

use bevy::app::FixedPostUpdate;
use bevy::prelude::*;
use gravewalk_simulation::providers::headless::{HeadlessNav, HeadlessRagdoll, HeadlessRig};
use gravewalk_simulation::*;

const TICKS: usize = 600;

#[test]
fn test_same_seed_same_run() {
    let snapshot1 = run_scenario(42);
    let snapshot2 = run_scenario(42);

    assert_eq!(
        snapshot1, snapshot2,
        "симуляция с одинаковым seed (42) дала разные результаты"
    );
}

#[test]
fn test_three_runs_identical() {
    let snapshots: Vec<_> = (0..3).map(|_| run_scenario(1337)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(snapshots[0], *snapshot, "прогон {} отличается от прогона 0", i);
    }
}

/// Полный сценарий: два зомби, игрок, патрульная сеть
fn run_scenario(seed: u64) -> Vec<u8> {
    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    let network = app.world_mut().resource_mut::<WaypointNetworks>().add(WaypointNetwork::new(vec![
        Vec3::new(8.0, 0.0, 8.0),
        Vec3::new(8.0, 0.0, -8.0),
        Vec3::new(-8.0, 0.0, -8.0),
        Vec3::new(-8.0, 0.0, 8.0),
    ]));

    spawn_zombie(&mut app, Vec3::ZERO, network, false);
    spawn_zombie(&mut app, Vec3::new(12.0, 0.0, 3.0), network, true);
    spawn_player(&mut app, Vec3::new(0.0, 0.0, -7.0));

    for _ in 0..TICKS {
        step(&mut app);
    }

    snapshot(app.world_mut())
}

fn step(app: &mut App) {
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(timestep);
    app.world_mut().run_schedule(FixedUpdate);
    app.world_mut().run_schedule(FixedPostUpdate);
}

/// Позиции, состояния и vitals агентов, отсортированные по Entity
fn snapshot(world: &mut World) -> Vec<u8> {
    // Общий Transform-снимок всех entity + детальный по агентам
    let mut data = world_snapshot::<Transform>(world);

    let mut query = world.query::<(Entity, &Transform, &ZombieMachine)>();
    let mut agents: Vec<_> = query.iter(world).collect();
    agents.sort_by_key(|(entity, _, _)| entity.index());

    for (entity, transform, machine) in agents {
        data.extend_from_slice(&entity.index().to_le_bytes());
        for value in transform.translation.to_array() {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(format!("{:?}", machine.current_state()).as_bytes());
        data.extend_from_slice(&machine.ctx.stats.health.to_le_bytes());
        data.extend_from_slice(&machine.ctx.stats.satisfaction.to_le_bytes());
        data.extend_from_slice(format!("{:?}", machine.ctx.ragdoll.bone_control).as_bytes());
    }

    data
}

fn spawn_zombie(app: &mut App, position: Vec3, network: usize, random_patrol: bool) {
    let capsule = SourceId::fresh();
    let body = HeadlessRagdoll::humanoid();
    let segment_ids: Vec<SourceId> = (0..body.segment_count()).map(|i| body.segment_id(i)).collect();

    let mut machine = ZombieMachine::standard(AIStateType::Patrol);
    machine.ctx.waypoint_network = network;
    machine.ctx.random_patrol = random_patrol;
    machine.ctx.stats.sight = 1.0;

    let entity = app
        .world_mut()
        .spawn((
            Transform::from_translation(position),
            machine,
            Navigation(Box::new(HeadlessNav::default())),
            Rig(Box::new(HeadlessRig::default())),
            Body(Box::new(body)),
            WorldCollider {
                id: capsule,
                radius: 0.4,
                layer: layers::AI_BODY_PART,
                rigid_body: Some(capsule),
            },
        ))
        .id();

    let mut registry = app.world_mut().resource_mut::<SceneRegistry>();
    registry.register_machine(capsule, entity);
    for id in segment_ids {
        registry.register_machine(id, entity);
    }
}

fn spawn_player(app: &mut App, position: Vec3) {
    let collider = SourceId::fresh();
    let entity = app
        .world_mut()
        .spawn((
            Transform::from_translation(position),
            Player { collider, melee_radius: 1.5 },
            Aggravator { kind: AggravatorKind::Player, source: collider },
            WorldCollider { id: collider, radius: 0.3, layer: layers::PLAYER, rigid_body: None },
        ))
        .id();
    app.world_mut().resource_mut::<SceneRegistry>().register_player(collider, entity);
}
