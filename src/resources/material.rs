//! Blinn-Phong material definitions

use glam::Vec3;

use super::texture::TextureId;

/// Surface appearance shared by the meshes that reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// 1.0 is opaque; anything lower is drawn in the deferred transparent pass.
    pub alpha: f32,
    pub diffuse_texture: TextureId,
}

impl Default for Material {
    /// Flat gray, opaque, default white texture.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.6),
            specular: Vec3::splat(0.2),
            shininess: 16.0,
            alpha: 1.0,
            diffuse_texture: TextureId::DEFAULT,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_colors(mut self, ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        self.ambient = ambient;
        self.diffuse = diffuse;
        self.specular = specular;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.diffuse_texture = texture;
        self
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha == 1.0
    }

    // Preset materials

    /// Matte single-color surface.
    pub fn flat(name: &str, color: Vec3) -> Self {
        Self::new(name).with_colors(color * 0.3, color, Vec3::splat(0.1))
    }

    pub fn rubber() -> Self {
        Self::flat("rubber", Vec3::splat(0.08)).with_shininess(4.0)
    }

    pub fn paint(color: Vec3) -> Self {
        Self::new("paint")
            .with_colors(color * 0.25, color, Vec3::splat(0.6))
            .with_shininess(64.0)
    }

    pub fn glass() -> Self {
        Self::new("glass")
            .with_colors(Vec3::splat(0.05), Vec3::new(0.6, 0.7, 0.8), Vec3::ONE)
            .with_shininess(96.0)
            .with_alpha(0.35)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_is_opaque_gray() {
        let material = Material::default();
        assert!(material.is_opaque());
        assert_eq!(material.diffuse_texture, TextureId::DEFAULT);
        assert_eq!(material.diffuse.x, material.diffuse.y);
    }

    #[test]
    fn test_alpha_below_one_is_transparent() {
        assert!(!Material::glass().is_opaque());
        assert!(!Material::new("almost").with_alpha(0.999).is_opaque());
    }
}
