use glam::{Vec2, Vec3};
use sdf_scene::prelude::*;
use sdf_scene_examples::*;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut pool = SharedMeshPool::new();
    let mut scene = SceneRegistry::new().with_settings(Settings::new(0.02));

    let nodes = [
        SceneNode::cuboid(Vec3::new(1.2, 0.6, 1.2), 0.1).with_order(0),
        SceneNode::sphere(0.9)
            .with_translation(Vec3::new(0.0, 0.7, 0.0))
            .with_blend(CombineKind::Union, 0.35)
            .with_order(1),
        SceneNode::cylinder(0.45, 2.0)
            .with_blend(CombineKind::Subtract, 0.1)
            .with_order(2),
        SceneNode::torus(Vec2::new(1.6, 0.15))
            .with_blend(CombineKind::Union, 0.2)
            .with_order(3),
    ]
    .map(NodeRef::new);

    for node in &nodes {
        scene.register(node, &mut pool)?;
    }
    let report = scene.tick(&mut pool)?;
    tracing::info!("First tick: {:?}", report);

    let config = RenderConfig::new((480, 360), Vec3::new(4.0, 3.0, 5.0), Vec3::ZERO)
        .with_background([20, 22, 30]);
    render_to_png(scene.evaluator(), &config, "raymarch-smooth-csg.png")?;

    // Sharpen the cutter and move it to the front of the fold.
    {
        let mut cutter = nodes[2].lock();
        cutter.set_smoothing(MIN_SMOOTHING);
        cutter.set_order(-1);
    }
    let report = scene.tick(&mut pool)?;
    tracing::info!("After reorder: {:?}", report);

    render_to_png(
        scene.evaluator(),
        &config.clone().with_shading(Shading::Steps),
        "raymarch-smooth-csg-steps.png",
    )?;

    Ok(())
}
