use std::collections::HashMap;
use std::sync::Arc;

use engine_core::alloc_bindings::{get_bindings, SystemAllocator};
use engine_core::config::EngineConfig;
use engine_core::ecs::{EntityHandle, World};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel(f32, f32, f32);
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct Model(u32);
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct Static;

fn world() -> World {
    World::new(EngineConfig::default(), get_bindings(Arc::new(SystemAllocator)))
}

// Entities land in four distinct archetypes ({Pos,Vel}, {Pos,Vel,Model},
// {Pos,Vel,Static}, {Pos,Vel,Model,Static}); a query over a strict subset of
// an entity's components must still find it regardless of which archetype
// it ended up in.
#[test]
fn query_matches_across_every_archetype_containing_the_requested_components() {
    let mut w = world();
    let mut expected: HashMap<EntityHandle, (Pos, Vel)> = HashMap::new();

    for i in 0..50 {
        let e = w.create_entity().unwrap();
        let pos = Pos(i as f32, i as f32 + 1.0, i as f32 + 2.0);
        let vel = Vel(1.0, 0.0, 0.0);
        w.add_components::<(Pos, Vel)>(e).unwrap();
        *w.get_component_mut::<Pos>(e).unwrap() = pos;
        *w.get_component_mut::<Vel>(e).unwrap() = vel;

        if i % 3 == 0 {
            w.add_components::<(Model,)>(e).unwrap();
            *w.get_component_mut::<Model>(e).unwrap() = Model(i as u32);
        }
        if i % 5 == 0 {
            w.add_components::<(Static,)>(e).unwrap();
        }
        expected.insert(e, (pos, vel));
    }

    let mut seen: HashMap<EntityHandle, (Pos, Vel)> = HashMap::new();
    w.for_each::<(Pos, Vel)>(|entity, (pos, vel)| {
        seen.insert(entity, (*pos, *vel));
    });

    assert_eq!(seen.len(), expected.len());
    for (entity, value) in &expected {
        assert_eq!(seen.get(entity), Some(value));
    }
}

#[test]
fn removing_a_component_drops_entity_from_queries_that_need_it() {
    let mut w = world();
    let e = w.create_entity().unwrap();
    w.add_components::<(Pos, Model)>(e).unwrap();

    let mut matched = 0;
    w.for_each::<(Pos, Model)>(|_, _| matched += 1);
    assert_eq!(matched, 1);

    w.remove_components::<(Model,)>(e).unwrap();

    matched = 0;
    w.for_each::<(Pos, Model)>(|_, _| matched += 1);
    assert_eq!(matched, 0);

    // Pos alone still matches.
    matched = 0;
    w.for_each::<(Pos,)>(|_, _| matched += 1);
    assert_eq!(matched, 1);
}

#[test]
fn querying_a_component_nobody_ever_registered_matches_nothing() {
    let mut w = world();
    let e = w.create_entity().unwrap();
    w.add_components::<(Pos,)>(e).unwrap();

    let mut matched = 0;
    w.for_each::<(Vel,)>(|_, _| matched += 1);
    assert_eq!(matched, 0);
}
