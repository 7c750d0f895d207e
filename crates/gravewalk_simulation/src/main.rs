//! Headless прогон GRAVEWALK
//!
//! Bevy App без рендера: один зомби патрулирует квадрат waypoint'ов,
//! игрок стоит на маршруте. Печатаем переходы FSM.

use bevy::app::FixedPostUpdate;
use bevy::prelude::*;
use gravewalk_simulation::providers::headless::{HeadlessNav, HeadlessRagdoll, HeadlessRig};
use gravewalk_simulation::*;

fn main() {
    let seed = 42;
    println!("Starting GRAVEWALK headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    // Квадрат патруля 20×20
    let network = {
        let mut networks = app.world_mut().resource_mut::<WaypointNetworks>();
        networks.add(WaypointNetwork::new(vec![
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, -10.0),
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(-10.0, 0.0, 10.0),
        ]))
    };

    let zombie = spawn_zombie(&mut app, Vec3::ZERO, network);
    spawn_player(&mut app, Vec3::new(10.0, 0.0, 4.0));

    let mut last_state = AIStateType::None;
    for tick in 0..1800 {
        step(&mut app);

        let Some(machine) = app.world().get::<ZombieMachine>(zombie) else {
            break;
        };
        let state = machine.current_state();
        if state != last_state {
            println!("tick {:4}: {:?} → {:?}", tick, last_state, state);
            last_state = state;
        }
    }

    println!("Simulation complete!");
}

/// Один fixed tick: двигаем Time<Fixed> и исполняем оба расписания
fn step(app: &mut App) {
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(timestep);
    app.world_mut().run_schedule(FixedUpdate);
    app.world_mut().run_schedule(FixedPostUpdate);
}

fn spawn_zombie(app: &mut App, position: Vec3, network: usize) -> Entity {
    let capsule = SourceId::fresh();
    let body = HeadlessRagdoll::humanoid();
    let segment_ids: Vec<SourceId> = (0..body.segment_count()).map(|i| body.segment_id(i)).collect();

    let mut machine = ZombieMachine::standard(AIStateType::Patrol);
    machine.ctx.waypoint_network = network;
    machine.ctx.stats.sight = 1.0; // видит весь сенсорный радиус

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
            DamageTriggers(vec![DamageTrigger::default()]),
        ))
        .id();

    let mut registry = app.world_mut().resource_mut::<SceneRegistry>();
    registry.register_machine(capsule, entity);
    for id in segment_ids {
        registry.register_machine(id, entity);
    }
    entity
}

fn spawn_player(app: &mut App, position: Vec3) -> Entity {
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
    entity
}
