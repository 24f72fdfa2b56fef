//! Mesh: a drawable index range inside an object's shared buffers

use std::sync::Arc;

use super::material::Material;

/// Index range plus the material it is drawn with. Several nodes may share
/// one mesh.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    /// Number of indices in the range.
    pub index_count: u32,
    /// First index of the range in the owning object's index buffer.
    pub index_offset: u32,
    pub material: Arc<Material>,
}

impl Mesh {
    pub fn new(name: &str, index_offset: u32, index_count: u32, material: Arc<Material>) -> Self {
        Self {
            name: name.to_string(),
            index_count,
            index_offset,
            material,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.material.is_opaque()
    }

    /// Index range for `draw_indexed`.
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.index_offset..self.index_offset + self.index_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}
