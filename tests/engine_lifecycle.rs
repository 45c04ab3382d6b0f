use forge_engine::{engine_init, engine_shutdown};

use engine_core::config::EngineConfig;
use engine_core::jobs::SystemKind;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
    dz: f32,
}

// Exercises the fixed construction order (memory -> jobs -> file system ->
// resource manager) end to end: entities move through the ECS, a mesh
// resource drains through the job graph, and teardown runs in reverse
// without panicking.
#[test]
fn engine_context_runs_a_frame_end_to_end() {
    let config = EngineConfig { max_jobs: 64, ..EngineConfig::default() };
    let mut context = engine_init(config);

    let mut entities = Vec::new();
    for i in 0..10 {
        let entity = context.world.create_entity().unwrap();
        context.world.add_components::<(Position, Velocity)>(entity).unwrap();
        *context.world.get_component_mut::<Position>(entity).unwrap() =
            Position { x: i as f32, y: 0.0, z: 0.0 };
        entities.push(entity);
    }

    let mut simulated = 0;
    context.world.for_each::<(Position, Velocity)>(|_entity, (pos, _vel)| {
        assert!(pos.x >= 0.0);
        simulated += 1;
    });
    assert_eq!(simulated, 10);

    let texture = context.resources.add_texture_resource("textures/brick.png");
    assert_eq!(context.resources.add_texture_resource("textures/brick.png"), texture);
    for _ in 0..16 {
        context.jobs.dispatch_one(SystemKind::Render);
    }
    assert!(context.resources.get_renderer_texture_handle(texture).is_some());

    engine_shutdown(context);
}
