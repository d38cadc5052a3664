use glam::Vec3;
use sdf_scene::field::primitives::{sdf_rounded_box, sdf_torus};
use sdf_scene::prelude::*;
use sdf_scene_examples::*;

const TORUS: MeshAssetId = MeshAssetId(1);
const CRATE: MeshAssetId = MeshAssetId(2);

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut pool = SharedMeshPool::new();
    pool.install(
        TORUS,
        BakedMeshField::bake(24, Vec3::splat(-1.5), Vec3::splat(1.5), |p| {
            sdf_torus(p, glam::Vec2::new(1.0, 0.3))
        })?,
    );
    pool.install(
        CRATE,
        BakedMeshField::bake(16, Vec3::splat(-1.0), Vec3::splat(1.0), |p| {
            sdf_rounded_box(p, Vec3::splat(0.7), 0.05)
        })?,
    );

    // Two scenes share one pool; each asset is stored once.
    let mut left = SceneRegistry::new();
    let mut right = SceneRegistry::new();

    let left_nodes = [
        SceneNode::mesh(TORUS).with_translation(Vec3::new(-1.2, 0.0, 0.0)),
        SceneNode::mesh(CRATE)
            .with_translation(Vec3::new(1.2, 0.0, 0.0))
            .with_blend(CombineKind::Union, 0.3)
            .with_order(1),
    ]
    .map(NodeRef::new);
    let right_nodes = [
        SceneNode::mesh(CRATE),
        SceneNode::sphere(0.8)
            .with_blend(CombineKind::Subtract, 0.05)
            .with_order(1),
    ]
    .map(NodeRef::new);

    for node in &left_nodes {
        left.register(node, &mut pool)?;
    }
    for node in &right_nodes {
        right.register(node, &mut pool)?;
    }
    left.tick(&mut pool)?;
    right.tick(&mut pool)?;

    tracing::info!(
        "Pool generation {}, crate referenced by {} scenes, {} samples.",
        pool.generation(),
        pool.ref_count(CRATE),
        pool.samples().len()
    );

    let config = RenderConfig::new((400, 300), Vec3::new(0.0, 2.5, 5.0), Vec3::ZERO);
    render_to_png(left.evaluator(), &config, "mesh-field-left.png")?;
    render_to_png(right.evaluator(), &config, "mesh-field-right.png")?;

    // Dropping the torus scene releases its asset; the other scene picks up the new offsets.
    left.clear(&mut pool)?;
    right.tick(&mut pool)?;
    tracing::info!(
        "After clear: generation {}, {} samples.",
        pool.generation(),
        pool.samples().len()
    );
    render_to_png(
        right.evaluator(),
        &config.with_shading(Shading::Depth),
        "mesh-field-right-depth.png",
    )?;

    Ok(())
}
