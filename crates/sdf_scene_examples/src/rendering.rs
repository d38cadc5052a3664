//! Shared helpers for the example binaries: logging setup and a small ray-marched PNG renderer.
use std::path::Path;

use anyhow::Context;
use glam::Vec3;
use image::{Rgb, RgbImage};
use sdf_scene::prelude::{FieldEvaluator, Ray, RayMarchConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// What each pixel shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shading {
    /// Lambert lighting tinted by the surface normal.
    #[default]
    Normals,
    /// Hit distance, near is bright.
    Depth,
    /// Number of marching steps, many is bright.
    Steps,
}

/// Pinhole camera and image settings.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub size: (u32, u32),
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub background: [u8; 3],
    pub shading: Shading,
    pub march: RayMarchConfig,
}

impl RenderConfig {
    pub fn new(size: (u32, u32), eye: Vec3, target: Vec3) -> Self {
        Self {
            size,
            eye,
            target,
            fov_y: 45.0,
            background: [24, 24, 32],
            shading: Shading::Normals,
            march: RayMarchConfig::default(),
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self
    }

    pub fn with_fov_y(mut self, fov_y: f32) -> Self {
        self.fov_y = fov_y;
        self
    }

    /// Primary ray through pixel `(x, y)`.
    pub fn ray(&self, x: u32, y: u32) -> Ray {
        let (w, h) = (self.size.0.max(1) as f32, self.size.1.max(1) as f32);
        let forward = (self.target - self.eye).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);

        let half_h = (self.fov_y.to_radians() * 0.5).tan();
        let half_w = half_h * w / h;
        let u = ((x as f32 + 0.5) / w * 2.0 - 1.0) * half_w;
        let v = (1.0 - (y as f32 + 0.5) / h * 2.0) * half_h;

        Ray::new(self.eye, forward + right * u + up * v)
    }
}

/// Ray marches `evaluator` once per pixel and writes the image to `out_path`.
pub fn render_to_png(
    evaluator: &FieldEvaluator,
    config: &RenderConfig,
    out_path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let out_path = out_path.as_ref();
    let (w, h) = config.size;
    let light = Vec3::new(0.6, 0.8, 0.4).normalize();
    let far = (config.target - config.eye).length() * 2.0;

    let mut hits = 0usize;
    let img = RgbImage::from_fn(w, h, |x, y| {
        let ray = config.ray(x, y);
        let Some(hit) = evaluator.ray_march(&ray, &config.march) else {
            return Rgb(config.background);
        };
        hits += 1;

        let rgb = match config.shading {
            Shading::Normals => {
                let lambert = hit.normal.dot(light).max(0.0) * 0.8 + 0.2;
                let tint = hit.normal * 0.5 + 0.5;
                tint * lambert
            }
            Shading::Depth => Vec3::splat(1.0 - (hit.distance / far).clamp(0.0, 1.0)),
            Shading::Steps => {
                Vec3::splat(hit.steps as f32 / config.march.max_iterations.max(1) as f32)
            }
        };
        let rgb = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        Rgb([rgb.x as u8, rgb.y as u8, rgb.z as u8])
    });

    img.save(out_path)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    info!(
        "Wrote {} ({}x{}, {:.1}% hit).",
        out_path.display(),
        w,
        h,
        100.0 * hits as f32 / (w as f32 * h as f32).max(1.0)
    );
    Ok(())
}
