//! Scene node hierarchy

use std::sync::Arc;

use glam::Mat4;

use super::mesh::Mesh;

/// Transform grouping of meshes. Immutable once built.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    pub meshes: Vec<Arc<Mesh>>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: &str, transform: Mat4) -> Self {
        Self {
            name: name.to_string(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first visit of every mesh with its accumulated transform
    /// (`parent * local` down the tree).
    pub fn visit_meshes<'a, F>(&'a self, parent: Mat4, visit: &mut F)
    where
        F: FnMut(&'a Mesh, Mat4),
    {
        let world = parent * self.transform;
        for mesh in &self.meshes {
            visit(mesh, world);
        }
        for child in &self.children {
            child.visit_meshes(world, visit);
        }
    }

    /// Total meshes referenced in this subtree.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(Node::mesh_count).sum::<usize>()
    }
}
