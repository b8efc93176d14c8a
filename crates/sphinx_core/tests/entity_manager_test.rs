//! Integration tests for entity lifetimes.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sphinx_core::{CoordinateTransform, EntityHandle, EntityId, EntityManager, World};

/// Reference model: is the manager still owning it, and how many handles exist.
#[derive(Default)]
struct Model {
    owned: bool,
    handles: Vec<EntityHandle>,
}

#[test]
fn test_random_lifetimes_match_model() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    let manager = EntityManager::with_capacity(32);
    let mut model: HashMap<EntityId, Model> = HashMap::new();

    for _ in 0..5_000 {
        match rng.gen_range(0..4) {
            0 => {
                if let Ok(handle) = manager.create() {
                    let id = handle.id();
                    // Never hand out a live identifier twice
                    assert!(!model.contains_key(&id), "{id} reused while live");
                    model.insert(
                        id,
                        Model {
                            owned: true,
                            handles: vec![handle],
                        },
                    );
                } else {
                    assert_eq!(model.len(), 32);
                }
            }
            1 => {
                let owned: Vec<EntityId> = model.iter().filter(|(_, m)| m.owned).map(|(id, _)| *id).collect();
                if let Some(&id) = owned.get(rng.gen_range(0..owned.len().max(1))) {
                    manager.release(id);
                    if let Some(m) = model.get_mut(&id) {
                        m.owned = false;
                    }
                }
            }
            2 => {
                let ids: Vec<EntityId> = model.keys().copied().collect();
                if let Some(&id) = ids.get(rng.gen_range(0..ids.len().max(1))) {
                    let handle = manager.get(id).expect("model says live");
                    if let Some(m) = model.get_mut(&id) {
                        m.handles.push(handle);
                    }
                }
            }
            _ => {
                let ids: Vec<EntityId> = model.keys().copied().collect();
                if let Some(&id) = ids.get(rng.gen_range(0..ids.len().max(1))) {
                    if let Some(m) = model.get_mut(&id) {
                        m.handles.pop();
                    }
                }
            }
        }

        model.retain(|_, m| m.owned || !m.handles.is_empty());

        assert_eq!(manager.len(), model.len());
        for (id, m) in &model {
            assert!(manager.is_alive(*id));
            assert_eq!(manager.is_owned(*id), m.owned);
            assert_eq!(manager.handle_count(*id), m.handles.len());
        }
    }
}

#[test]
fn test_destroyed_entity_is_not_found_until_reused() {
    let manager = EntityManager::with_capacity(4);
    let handle = manager.create().unwrap();
    let id = handle.id();

    manager.release(id);
    let still_there = manager.get(id).unwrap();
    drop(handle);
    assert!(manager.is_alive(id));

    drop(still_there);
    assert!(manager.get(id).is_none());
    assert_eq!(manager.create().unwrap().id(), id);
}

#[test]
fn test_concurrent_create_and_release() {
    let manager = Arc::new(EntityManager::with_capacity(1_024));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..200 {
                    let handle = manager.create().unwrap();
                    let shared = handle.clone();
                    manager.release(handle.id());
                    drop(handle);
                    assert!(manager.is_alive(shared.id()));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(manager.is_empty());
    assert_eq!(manager.drain_destroyed().len(), 800);
}

#[test]
fn test_world_tears_down_components_of_released_entities() {
    let mut world = World::with_entity_capacity(8);
    let type_id = world.register::<CoordinateTransform>();

    let ids: Vec<EntityId> = (0..5)
        .map(|_| {
            let id = world.spawn().unwrap().id();
            world.add_component::<CoordinateTransform>(id).unwrap();
            id
        })
        .collect();

    for id in &ids[..3] {
        world.entities().release(*id);
    }
    assert_eq!(world.maintain(), 3);
    assert_eq!(world.components().live_count(type_id), Some(2));
    assert!(world.component::<CoordinateTransform>(ids[4]).is_ok());
}
