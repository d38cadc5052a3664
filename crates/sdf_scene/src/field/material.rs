//! Per-node surface materials and their exported form.
use glam::{Vec3, Vec4};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a node is shaded.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// No material; consumers fall back to their default shading.
    #[default]
    None,
    /// Flat colour from [`Material::color`].
    Color,
    /// Textured; `color` tints the texture.
    Texture,
}

impl MaterialKind {
    fn as_index(self) -> u32 {
        match self {
            MaterialKind::None => 0,
            MaterialKind::Color => 1,
            MaterialKind::Texture => 2,
        }
    }
}

/// Authoring-side material.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// How the node is shaded.
    pub kind: MaterialKind,
    /// Base colour (RGBA).
    pub color: Vec4,
    /// Emitted light (RGB).
    pub emission: Vec3,
    /// Metalness in `[0, 1]`. Clamped on export.
    pub metallic: f32,
    /// Surface smoothness in `[0, 1]`. Clamped on export.
    pub smoothness: f32,
    /// Colour of light scattered below the surface.
    pub subsurface_color: Vec3,
    /// Strength of the subsurface term.
    pub subsurface_power: f32,
    /// How far colours bleed between blended nodes.
    pub material_smoothing: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            kind: MaterialKind::None,
            color: Vec4::ONE,
            emission: Vec3::ZERO,
            metallic: 0.5,
            smoothness: 0.5,
            subsurface_color: Vec3::ZERO,
            subsurface_power: 0.0,
            material_smoothing: 0.1,
        }
    }
}

impl Material {
    /// Creates a material of `kind` with base `color` and default surface values.
    pub fn new(kind: MaterialKind, color: Vec4) -> Self {
        Self {
            kind,
            color,
            ..Default::default()
        }
    }

    /// Sets the emitted light.
    pub fn with_emission(mut self, emission: Vec3) -> Self {
        self.emission = emission;
        self
    }

    /// Sets the metalness.
    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    /// Sets the surface smoothness.
    pub fn with_smoothness(mut self, smoothness: f32) -> Self {
        self.smoothness = smoothness;
        self
    }

    /// Sets the subsurface colour and strength.
    pub fn with_subsurface(mut self, color: Vec3, power: f32) -> Self {
        self.subsurface_color = color;
        self.subsurface_power = power;
        self
    }

    /// Sets how far colours bleed between blended nodes.
    pub fn with_material_smoothing(mut self, material_smoothing: f32) -> Self {
        self.material_smoothing = material_smoothing;
        self
    }
}

/// Exported material record, one per exported node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MaterialData {
    /// [`MaterialKind`] as an index: 0 none, 1 colour, 2 texture.
    pub kind: u32,
    pub color: Vec4,
    pub emission: Vec3,
    pub metallic: f32,
    pub smoothness: f32,
    pub subsurface_color: Vec3,
    pub subsurface_power: f32,
    pub material_smoothing: f32,
}

impl From<&Material> for MaterialData {
    fn from(m: &Material) -> Self {
        Self {
            kind: m.kind.as_index(),
            color: m.color,
            emission: m.emission,
            metallic: m.metallic.clamp(0.0, 1.0),
            smoothness: m.smoothness.clamp(0.0, 1.0),
            subsurface_color: m.subsurface_color,
            subsurface_power: m.subsurface_power,
            material_smoothing: m.material_smoothing,
        }
    }
}
