//! # Codec Benchmark
//!
//! Encode/decode cost of replication packets, and the full
//! mutate -> flush -> encode -> decode -> apply path for one field.
//!
//! Run with: `cargo bench --package sphinx_net`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sphinx_core::{ComponentTypeId, CoordinateTransform, FieldId, StableEntityRef, World};
use sphinx_net::{apply_replicate, EcsReplicate, Packet, ReplicationQueue};
use sphinx_shared::{Coordinate, Vec3, Vec3Int};

fn replicate_with(fields: u16, field_len: usize) -> Packet {
    let mut replicate = EcsReplicate::new(StableEntityRef::new(u32::MAX, 42), ComponentTypeId::new(1));
    for id in 0..fields {
        replicate.push_field(FieldId(id), &vec![0xAB; field_len]);
    }
    Packet::EcsReplicate(replicate)
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("replicate_codec");

    for fields in [1u16, 8, 32] {
        let packet = replicate_with(fields, 16);
        let Ok(bytes) = packet.encode() else { return };
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", fields), &packet, |b, packet| {
            b.iter(|| black_box(packet.encode()));
        });
        group.bench_with_input(BenchmarkId::new("decode", fields), &bytes, |b, bytes| {
            b.iter(|| black_box(Packet::decode(bytes)));
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let mut source = World::with_entity_capacity(16);
    source.register::<CoordinateTransform>();
    let Ok(entity) = source.spawn_networked(StableEntityRef::SERVER_OWNER) else { return };
    if source.add_component::<CoordinateTransform>(entity.id()).is_err() {
        return;
    }
    let Some(stable_ref) = entity.stable_ref() else { return };

    let mut mirror = World::with_entity_capacity(16);
    mirror.register::<CoordinateTransform>();
    let Ok(local) = mirror.spawn_mirror(stable_ref) else { return };
    if mirror.add_component::<CoordinateTransform>(local.id()).is_err() {
        return;
    }

    let mut queue = ReplicationQueue::new();
    let mut step = 0i32;
    c.bench_function("set_position_to_peer", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            let position = Coordinate::new(Vec3Int::ZERO, Vec3Int::new(step % 16, 2, 3), Vec3::ZERO);
            let _ = source.mutate::<CoordinateTransform, _, _>(entity.id(), &mut queue, |t, ctx| {
                t.set_position(position, ctx);
            });
            for replicate in queue.flush(source.entities()) {
                let Ok(bytes) = Packet::EcsReplicate(replicate).encode() else { continue };
                if let Ok(Packet::EcsReplicate(decoded)) = Packet::decode(&bytes) {
                    black_box(apply_replicate(&mut mirror, &decoded).ok());
                }
            }
        });
    });
}

criterion_group!(benches, bench_codec, bench_round_trip);
criterion_main!(benches);
