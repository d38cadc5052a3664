mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Mat4, Vec3, Vec4};
use sdf_scene::field::primitives::sdf_sphere;
use sdf_scene::prelude::{
    BakedMeshField, Blend, CombineKind, FieldEvaluator, FieldNode, MaterialData, MeshAssetId,
    MeshSlot, PrimitiveKind, Ray, RayMarchConfig,
};

const NODE_COUNTS: [usize; 5] = [1, 4, 16, 64, 256];

fn make_nodes(count: usize) -> Vec<FieldNode> {
    let kinds = [
        PrimitiveKind::Sphere,
        PrimitiveKind::Cuboid,
        PrimitiveKind::Torus,
        PrimitiveKind::Cylinder,
        PrimitiveKind::BoxFrame,
    ];
    (0..count)
        .map(|i| {
            let angle = i as f32 * 0.61;
            let at = Vec3::new(angle.cos() * 2.0, (i % 5) as f32 * 0.3 - 0.6, angle.sin() * 2.0);
            let combine = if i % 7 == 6 {
                CombineKind::Subtract
            } else {
                CombineKind::Union
            };
            FieldNode::Primitive {
                kind: kinds[i % kinds.len()],
                params: Vec4::new(0.5, 0.2, 0.4, 0.05),
                blend: Blend::new(combine, false, 0.1),
                transform: Mat4::from_translation(at).inverse(),
            }
        })
        .collect()
}

fn make_evaluator(nodes: Vec<FieldNode>) -> FieldEvaluator {
    let mut evaluator = FieldEvaluator::new();
    let materials = vec![MaterialData::default(); nodes.len()];
    evaluator.set_data(nodes, materials);
    evaluator
}

fn map_benches(c: &mut Criterion) {
    let points = common::grid_points(3.0, 16);

    let mut group = c.benchmark_group("evaluator/map");
    for &count in &NODE_COUNTS {
        let evaluator = make_evaluator(make_nodes(count));
        group.throughput(common::elements_throughput(points.len()));
        group.bench_with_input(BenchmarkId::new("primitives", count), &count, |b, _| {
            b.iter(|| {
                let mut acc = 0.0f32;
                for &p in &points {
                    acc += evaluator.map(black_box(p));
                }
                black_box(acc)
            });
        });
    }
    group.finish();

    let baked = BakedMeshField::bake(32, Vec3::splat(-1.5), Vec3::splat(1.5), |p| {
        sdf_sphere(p, 1.0)
    })
    .expect("valid bake");
    let mesh = FieldNode::Mesh {
        slot: MeshSlot {
            asset: MeshAssetId(1),
            size: baked.size(),
            sample_start: Some(0),
            uv_start: None,
            min_bounds: baked.min_bounds(),
            max_bounds: baked.max_bounds(),
        },
        blend: Blend::default(),
        transform: Mat4::IDENTITY,
    };
    let mut evaluator = make_evaluator(vec![mesh]);
    evaluator.set_mesh_data(baked.samples().to_vec(), Vec::<f32>::new());

    let mut group = c.benchmark_group("evaluator/map_mesh");
    group.throughput(common::elements_throughput(points.len()));
    group.bench_function("size_32", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for &p in &points {
                acc += evaluator.map(black_box(p));
            }
            black_box(acc)
        });
    });
    group.finish();
}

fn ray_march_benches(c: &mut Criterion) {
    const RAYS: usize = 32;
    let rays: Vec<Ray> = (0..RAYS * RAYS)
        .map(|i| {
            let u = (i % RAYS) as f32 / RAYS as f32 - 0.5;
            let v = (i / RAYS) as f32 / RAYS as f32 - 0.5;
            Ray::new(Vec3::new(0.0, 0.0, 8.0), Vec3::new(u, v, -1.0))
        })
        .collect();
    let config = RayMarchConfig::default();

    let mut group = c.benchmark_group("evaluator/ray_march");
    for &count in &NODE_COUNTS {
        let evaluator = make_evaluator(make_nodes(count));
        group.throughput(common::elements_throughput(rays.len()));
        group.bench_with_input(BenchmarkId::new("primitives", count), &count, |b, _| {
            b.iter(|| {
                let hits = rays
                    .iter()
                    .filter(|ray| evaluator.ray_march(black_box(ray), &config).is_some())
                    .count();
                black_box(hits)
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = map_benches, ray_march_benches
}
criterion_main!(benches);
