use std::time::Duration;

use criterion::{Criterion, Throughput};
use glam::Vec3;

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// `n³` cell-centered points filling the cube `[-extent, extent]³`.
#[allow(dead_code)]
pub fn grid_points(extent: f32, n: usize) -> Vec<Vec3> {
    let step = 2.0 * extent / n.max(1) as f32;
    let mut points = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let cell = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
                points.push(Vec3::splat(-extent) + cell * step);
            }
        }
    }
    points
}
