//! # Pool & Entity Benchmark
//!
//! Measures the hot paths: pool allocate/release, entity create/release and
//! type-erased field application.
//!
//! Run with: `cargo bench --package sphinx_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sphinx_core::{CoordinateTransform, EntityManager, ObjectPool, World};
use sphinx_shared::{Coordinate, Vec3, Vec3Int};

fn bench_pool_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_churn");

    for capacity in [256usize, 4_096, 65_536] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut pool: ObjectPool<u64> = ObjectPool::new(capacity);
            b.iter(|| {
                let handles: Vec<_> = (0..capacity as u64)
                    .map_while(|v| pool.allocate(v).ok())
                    .collect();
                for handle in handles.into_iter().rev() {
                    black_box(pool.release(handle));
                }
            });
        });
    }

    group.finish();
}

fn bench_entity_lifecycle(c: &mut Criterion) {
    let manager = EntityManager::with_capacity(1_024);
    c.bench_function("entity_create_release_1024", |b| {
        b.iter(|| {
            let ids: Vec<_> = (0..1_024).map_while(|_| manager.create().ok().map(|h| h.id())).collect();
            for id in ids {
                manager.release(id);
            }
            black_box(manager.drain_destroyed().len())
        });
    });
}

fn bench_apply_field(c: &mut Criterion) {
    let mut world = World::with_entity_capacity(16);
    let type_id = world.register::<CoordinateTransform>();
    let Ok(entity) = world.spawn() else { return };
    if world.add_component::<CoordinateTransform>(entity.id()).is_err() {
        return;
    }
    let position = Coordinate::new(Vec3Int::new(3, 0, -2), Vec3Int::new(1, 2, 3), Vec3::new(0.5, 0.0, 0.25));
    let bytes = bytemuck::bytes_of(&position).to_vec();

    c.bench_function("apply_position_field", |b| {
        b.iter(|| {
            black_box(world.apply_field(entity.id(), type_id, CoordinateTransform::POSITION, &bytes))
        });
    });
}

criterion_group!(benches, bench_pool_churn, bench_entity_lifecycle, bench_apply_field);
criterion_main!(benches);
