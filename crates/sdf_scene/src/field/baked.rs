//! Baked mesh distance fields.
//!
//! A [`BakedMeshField`] is the finished output of an external mesh bake: a cubic grid of
//! `size³` signed distances covering a padded bounding box, plus optional packed UVs.
//! [`MeshVolume`] is a borrowed view over such a grid. The evaluator builds views directly over
//! the shared pool buffer, so sampling never copies.
//!
//! Grid layout: `index = x + y * size + z * size²`.
use glam::{UVec3, Vec3};

use crate::error::{Error, Result};

/// Inward push applied to the bounds before estimating a gradient, so every tap has
/// neighbours on both sides.
pub const BOUNDS_PUSH: f32 = 0.04;

/// Tap distance for the gradient used in mesh reconstruction.
pub const GRADIENT_EPSILON: f32 = 0.75;

/// Number of points in a cubic grid of `size` per axis, or `None` on overflow.
#[inline]
pub fn grid_len(size: usize) -> Option<usize> {
    size.checked_mul(size)?.checked_mul(size)
}

/// Borrowed view over one baked grid.
#[derive(Clone, Copy, Debug)]
pub struct MeshVolume<'a> {
    size: usize,
    min_bounds: Vec3,
    max_bounds: Vec3,
    samples: &'a [f32],
}

impl<'a> MeshVolume<'a> {
    /// Creates a view. Returns `None` if the grid is degenerate or `samples` is too short.
    pub fn new(
        size: usize,
        min_bounds: Vec3,
        max_bounds: Vec3,
        samples: &'a [f32],
    ) -> Option<Self> {
        if size < 2 || samples.len() < grid_len(size)? {
            return None;
        }
        Some(Self {
            size,
            min_bounds,
            max_bounds,
            samples,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn min_bounds(&self) -> Vec3 {
        self.min_bounds
    }

    pub fn max_bounds(&self) -> Vec3 {
        self.max_bounds
    }

    /// Flat index of grid point `(x, y, z)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.size + z * self.size * self.size
    }

    #[inline]
    fn at(&self, x: usize, y: usize, z: usize) -> f32 {
        self.samples[self.index(x, y, z)]
    }

    /// Bounds shrunk by `offset` on every side. Axes thinner than `2 * offset` collapse to
    /// their midpoint.
    fn pushed_bounds(&self, offset: f32) -> (Vec3, Vec3) {
        let lo = self.min_bounds + Vec3::splat(offset);
        let hi = self.max_bounds - Vec3::splat(offset);
        let mid = (self.min_bounds + self.max_bounds) * 0.5;
        let crossed = lo.cmpgt(hi);
        (Vec3::select(crossed, mid, lo), Vec3::select(crossed, mid, hi))
    }

    /// Point inside the (optionally shrunk) bounds nearest to `p`.
    pub fn closest_point(&self, p: Vec3, offset: f32) -> Vec3 {
        let (lo, hi) = self.pushed_bounds(offset);
        p.clamp(lo, hi)
    }

    /// Clamps `p` into the bounds and maps it to `[0, 1]³`.
    pub fn normalize_to_volume(&self, p: Vec3, offset: f32) -> Vec3 {
        let (lo, hi) = self.pushed_bounds(offset);
        let p = p.clamp(lo, hi);
        Vec3::new(
            inverse_lerp(lo.x, hi.x, p.x),
            inverse_lerp(lo.y, hi.y, p.y),
            inverse_lerp(lo.z, hi.z, p.z),
        )
    }

    /// Cell containing `p` and the fractional position inside that cell.
    ///
    /// The cell index is capped at `size - 2` so the far corner is always a valid grid point;
    /// on the upper boundary this yields a fraction of exactly `1.0`.
    pub fn cell_and_fraction(&self, p: Vec3, offset: f32) -> (UVec3, Vec3) {
        let cells = (self.size - 1) as f32;
        let t = self.normalize_to_volume(p, offset) * cells;
        let cell = t.floor().min(Vec3::splat(cells - 1.0));
        (cell.as_uvec3(), t - cell)
    }

    /// Trilinearly interpolated distance at `p`, clamped into the bounds.
    pub fn sample(&self, p: Vec3, offset: f32) -> f32 {
        let (cell, f) = self.cell_and_fraction(p, offset);
        let (x, y, z) = (cell.x as usize, cell.y as usize, cell.z as usize);

        let c000 = self.at(x, y, z);
        let c100 = self.at(x + 1, y, z);
        let c010 = self.at(x, y + 1, z);
        let c110 = self.at(x + 1, y + 1, z);
        let c001 = self.at(x, y, z + 1);
        let c101 = self.at(x + 1, y, z + 1);
        let c011 = self.at(x, y + 1, z + 1);
        let c111 = self.at(x + 1, y + 1, z + 1);

        let c00 = lerp(c000, c100, f.x);
        let c10 = lerp(c010, c110, f.x);
        let c01 = lerp(c001, c101, f.x);
        let c11 = lerp(c011, c111, f.x);

        let c0 = lerp(c00, c10, f.y);
        let c1 = lerp(c01, c11, f.y);

        lerp(c0, c1, f.z)
    }

    /// Normalized gradient of the sampled field, from four tetrahedral taps.
    pub fn gradient(&self, p: Vec3, epsilon: f32, offset: f32) -> Vec3 {
        let k0 = Vec3::new(epsilon, -epsilon, -epsilon);
        let k1 = Vec3::new(-epsilon, -epsilon, epsilon);
        let k2 = Vec3::new(-epsilon, epsilon, -epsilon);
        let k3 = Vec3::splat(epsilon);

        (k0 * self.sample(p + k0, offset)
            + k1 * self.sample(p + k1, offset)
            + k2 * self.sample(p + k2, offset)
            + k3 * self.sample(p + k3, offset))
        .normalize_or_zero()
    }

    /// Vector from `p` to the reconstructed surface, and the side `p` is on (`-1.0` inside).
    ///
    /// Points outside the baked box first travel to the nearest point on the (slightly shrunk)
    /// box, then follow the field gradient from there. This gives far-away points a plausible
    /// distance even though the grid does not cover them.
    pub fn direction_to_surface(&self, p: Vec3) -> (Vec3, f32) {
        let sample = self.sample(p, 0.0);
        let closest = self.closest_point(p, BOUNDS_PUSH);

        let in_bounds = -self.gradient(closest, GRADIENT_EPSILON, BOUNDS_PUSH) * sample;
        let to_bounds = closest - p;

        let sign = if sample < 0.0 { -1.0 } else { 1.0 };
        (to_bounds + in_bounds, sign)
    }

    /// Reconstructed signed distance at `p`.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        let (v, sign) = self.direction_to_surface(p);
        v.length() * sign
    }
}

/// A finished mesh bake: `size³` signed distances over a padded bounding box.
#[derive(Clone, Debug)]
pub struct BakedMeshField {
    size: usize,
    min_bounds: Vec3,
    max_bounds: Vec3,
    padding: f32,
    samples: Vec<f32>,
    packed_uvs: Option<Vec<f32>>,
}

impl BakedMeshField {
    /// Wraps the arrays produced by a bake, validating their layout.
    pub fn new(
        size: usize,
        min_bounds: Vec3,
        max_bounds: Vec3,
        samples: Vec<f32>,
        packed_uvs: Option<Vec<f32>>,
    ) -> Result<Self> {
        if size < 2 {
            return Err(Error::InvalidField(format!(
                "grid size must be at least 2, got {size}"
            )));
        }
        let total = grid_len(size).ok_or_else(|| {
            Error::InvalidField(format!("grid size {size} overflows the sample count"))
        })?;
        if samples.len() != total {
            return Err(Error::InvalidField(format!(
                "expected {total} samples for a grid of size {size}, got {}",
                samples.len()
            )));
        }
        if let Some(uvs) = &packed_uvs {
            if uvs.len() != total {
                return Err(Error::InvalidField(format!(
                    "expected {total} packed uvs for a grid of size {size}, got {}",
                    uvs.len()
                )));
            }
        }
        if !min_bounds.cmplt(max_bounds).all() {
            return Err(Error::InvalidField(format!(
                "min bounds {min_bounds} must be below max bounds {max_bounds} on every axis"
            )));
        }

        Ok(Self {
            size,
            min_bounds,
            max_bounds,
            padding: 0.0,
            samples,
            packed_uvs: packed_uvs.filter(|uvs| !uvs.is_empty()),
        })
    }

    /// Bakes an arbitrary distance function on the CPU by evaluating it at every grid point.
    pub fn bake(
        size: usize,
        min_bounds: Vec3,
        max_bounds: Vec3,
        mut f: impl FnMut(Vec3) -> f32,
    ) -> Result<Self> {
        let total = grid_len(size).ok_or_else(|| {
            Error::InvalidField(format!("grid size {size} overflows the sample count"))
        })?;
        let cells = size.saturating_sub(1).max(1) as f32;
        let step = (max_bounds - min_bounds) / cells;
        let mut samples = Vec::with_capacity(total);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let p = min_bounds + step * Vec3::new(x as f32, y as f32, z as f32);
                    samples.push(f(p));
                }
            }
        }
        Self::new(size, min_bounds, max_bounds, samples, None)
    }

    /// Records how much the bake padded the mesh bounds.
    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of grid points, `size³`.
    pub fn total_size(&self) -> usize {
        self.samples.len()
    }

    pub fn min_bounds(&self) -> Vec3 {
        self.min_bounds
    }

    pub fn max_bounds(&self) -> Vec3 {
        self.max_bounds
    }

    pub fn padding(&self) -> f32 {
        self.padding
    }

    pub fn center(&self) -> Vec3 {
        (self.min_bounds + self.max_bounds) * 0.5
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn packed_uvs(&self) -> Option<&[f32]> {
        self.packed_uvs.as_deref()
    }

    pub fn has_uvs(&self) -> bool {
        self.packed_uvs.is_some()
    }

    pub fn volume(&self) -> MeshVolume<'_> {
        MeshVolume {
            size: self.size,
            min_bounds: self.min_bounds,
            max_bounds: self.max_bounds,
            samples: &self.samples,
        }
    }

    /// Interpolated distance at `p`, clamped into the bounds.
    pub fn sample(&self, p: Vec3) -> f32 {
        self.volume().sample(p, 0.0)
    }

    /// Grid coordinate of a flat sample index.
    pub fn index_to_cell(&self, index: usize) -> UVec3 {
        let plane = self.size * self.size;
        let z = index / plane;
        let rem = index - z * plane;
        UVec3::new((rem % self.size) as u32, (rem / self.size) as u32, z as u32)
    }

    /// Object-space position of a grid point.
    pub fn cell_to_position(&self, cell: UVec3) -> Vec3 {
        let t = cell.as_vec3() / (self.size - 1) as f32;
        self.min_bounds + (self.max_bounds - self.min_bounds) * t
    }

    /// Object-space position of a flat sample index.
    pub fn index_to_position(&self, index: usize) -> Vec3 {
        self.cell_to_position(self.index_to_cell(index))
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        0.0
    } else {
        ((v - a) / (b - a)).clamp(0.0, 1.0)
    }
}
