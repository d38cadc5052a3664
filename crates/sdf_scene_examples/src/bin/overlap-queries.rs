use glam::Vec3;
use sdf_scene::prelude::*;
use sdf_scene_examples::*;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut pool = SharedMeshPool::new();
    let mut scene = SceneRegistry::new();
    let recorder = RecordingConsumer::new();
    scene.add_consumer(recorder.clone());

    let ground = NodeRef::new(SceneNode::cuboid(Vec3::new(4.0, 0.1, 4.0), 0.0));
    let pillar = NodeRef::new(
        SceneNode::cylinder(0.3, 1.0)
            .with_translation(Vec3::new(0.0, 1.0, 0.0))
            .with_blend(CombineKind::Union, 0.2)
            .with_order(1),
    );
    scene.register(&ground, &mut pool)?;
    scene.register(&pillar, &mut pool)?;

    // Queries before the first tick report that the scene is not ready.
    if let Err(err) = scene.distance(Vec3::ZERO) {
        tracing::info!("Before tick: {}", err);
    }
    scene.tick(&mut pool)?;

    let probes = [
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.6, 1.0, 0.0),
        Vec3::new(2.0, 0.5, 2.0),
        Vec3::new(2.0, -1.0, 2.0),
    ];
    for p in probes {
        let d = scene.distance(p)?;
        let projection = scene.project_to_surface(p)?;
        tracing::info!(
            "p = {:?}: distance {:.3}, surface at {:?}, sphere(0.25) {}, box(0.25) {}",
            p,
            d,
            projection.point,
            scene.overlap_sphere(p, 0.25)?,
            scene.overlap_box(p, Vec3::splat(0.25))?
        );
    }

    let ray = Ray::new(Vec3::new(3.0, 1.0, 0.0), Vec3::NEG_X);
    match scene.raycast(&ray, &RayMarchConfig::default())? {
        Some(hit) => tracing::info!(
            "Ray hit at {:?} after {} steps, normal {:?}.",
            hit.point,
            hit.steps,
            hit.normal
        ),
        None => tracing::info!("Ray missed."),
    }

    tracing::info!("Consumer saw {} calls.", recorder.len());

    let config = RenderConfig::new((320, 240), Vec3::new(3.0, 2.5, 3.0), Vec3::new(0.0, 0.5, 0.0))
        .with_shading(Shading::Depth);
    render_to_png(scene.evaluator(), &config, "overlap-queries.png")?;

    Ok(())
}
