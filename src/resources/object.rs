//! Drawable objects: a node tree over one shared vertex/index buffer pair

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::loader::{ModelData, ModelLoader, NodeData};
use super::material::Material;
use super::mesh::Mesh;
use super::node::Node;
use super::texture::TextureRegistry;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::renderer::{DrawContext, ShadowContext};
use crate::scene::Renderable;

/// A mesh ready to draw with its world transform.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub mesh: &'a Mesh,
    pub model: Mat4,
}

/// Eye distance usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
struct DrawDistance(f32);

impl PartialEq for DrawDistance {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for DrawDistance {}

impl PartialOrd for DrawDistance {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DrawDistance {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

struct GpuBuffers {
    vertex: BufferHandle,
    index: BufferHandle,
}

/// An imported or generated model.
///
/// An object that failed to load stays in the scene in an error state and
/// draws nothing.
pub struct Object {
    name: String,
    root: Option<Node>,
    /// Host copy of the geometry, released after upload.
    host: Option<ModelData>,
    gpu: Option<GpuBuffers>,
    model_matrix: Mat4,
    error: Option<String>,
}

impl Object {
    /// Import `path` through `loader`. Failures produce an error object.
    pub fn load(loader: &dyn ModelLoader, path: &Path, textures: &mut TextureRegistry) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match loader.load(path) {
            Ok(model) => Self::from_model(&name, model, textures),
            Err(e) => {
                log::warn!("Object '{}' failed to load: {}", name, e);
                Self::failed(&name, &e.to_string())
            }
        }
    }

    /// Build from geometry already in memory. Material textures are
    /// resolved through `textures`.
    pub fn from_model(name: &str, model: ModelData, textures: &mut TextureRegistry) -> Self {
        if model.indices.is_empty() || model.vertex_count() == 0 {
            return Self::failed(name, "model has no geometry");
        }
        if model.meshes.is_empty() {
            return Self::failed(name, "model has no meshes");
        }

        let default_material = Arc::new(Material::default());
        let materials: Vec<Arc<Material>> = model
            .materials
            .iter()
            .map(|m| {
                let mut material = Material::new(&m.name)
                    .with_colors(m.ambient, m.diffuse, m.specular)
                    .with_shininess(m.shininess)
                    .with_alpha(m.alpha);
                if let Some(path) = &m.diffuse_texture {
                    material = material.with_texture(textures.load(path));
                }
                Arc::new(material)
            })
            .collect();

        let meshes: Vec<Arc<Mesh>> = model
            .meshes
            .iter()
            .map(|m| {
                let material = m
                    .material
                    .and_then(|i| materials.get(i).cloned())
                    .unwrap_or_else(|| default_material.clone());
                Arc::new(Mesh::new(&m.name, m.index_offset, m.index_count, material))
            })
            .collect();

        let root = Self::build_node(&model.root, &meshes);
        if root.mesh_count() == 0 {
            return Self::failed(name, "node tree references no mesh");
        }
        log::debug!(
            "Object '{}': {} vertices, {} meshes",
            name,
            model.vertex_count(),
            root.mesh_count()
        );

        Self {
            name: name.to_string(),
            root: Some(root),
            host: Some(model),
            gpu: None,
            model_matrix: Mat4::IDENTITY,
            error: None,
        }
    }

    /// An object in the error state.
    pub fn failed(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            root: None,
            host: None,
            gpu: None,
            model_matrix: Mat4::IDENTITY,
            error: Some(reason.to_string()),
        }
    }

    fn build_node(data: &NodeData, meshes: &[Arc<Mesh>]) -> Node {
        let mut node = Node::new(&data.name, data.transform);
        for &index in &data.meshes {
            match meshes.get(index) {
                Some(mesh) => node = node.with_mesh(mesh.clone()),
                None => log::warn!("Node '{}' references missing mesh {}", data.name, index),
            }
        }
        for child in &data.children {
            node = node.with_child(Self::build_node(child, meshes));
        }
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model_matrix
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.model_matrix = model;
    }

    /// Opaque meshes in tree order, then transparent meshes from the
    /// farthest to the nearest relative to `eye`.
    pub fn draw_order(&self, eye: Vec3, model: Mat4) -> Vec<DrawItem<'_>> {
        let Some(root) = &self.root else {
            return Vec::new();
        };

        let mut opaque = Vec::new();
        let mut transparent: BTreeMap<DrawDistance, Vec<DrawItem<'_>>> = BTreeMap::new();
        root.visit_meshes(model, &mut |mesh, world| {
            let item = DrawItem { mesh, model: world };
            if mesh.is_opaque() {
                opaque.push(item);
            } else {
                let distance = world.transform_point3(Vec3::ZERO).distance(eye);
                transparent.entry(DrawDistance(distance)).or_default().push(item);
            }
        });

        opaque.extend(transparent.into_values().rev().flat_map(|items| items.into_iter().rev()));
        opaque
    }

    /// Bind the vertex and index buffers. False until uploaded.
    pub fn bind_buffers(&self, backend: &mut dyn GraphicsBackend) -> bool {
        let Some(gpu) = &self.gpu else {
            return false;
        };
        backend.set_vertex_buffer(0, gpu.vertex, 0);
        backend.set_index_buffer(gpu.index, 0, IndexFormat::Uint32);
        true
    }

    /// Draw with an explicit model matrix, for objects instanced several
    /// times per frame.
    pub fn render_with(&self, ctx: &mut DrawContext, model: Mat4) {
        if self.error.is_some() || !self.bind_buffers(ctx.backend()) {
            return;
        }
        for item in self.draw_order(ctx.eye(), model) {
            ctx.draw_mesh(item.mesh, item.model);
        }
    }

    pub fn render_shadow_with(&self, ctx: &mut ShadowContext, model: Mat4) {
        if self.error.is_some() || !self.bind_buffers(ctx.backend()) {
            return;
        }
        if let Some(root) = &self.root {
            root.visit_meshes(model, &mut |mesh, world| ctx.draw_mesh(mesh, world));
        }
    }
}

impl Renderable for Object {
    fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        if self.error.is_some() || self.gpu.is_some() {
            return Ok(());
        }
        let Some(model) = self.host.take() else {
            return Ok(());
        };

        let vertices: Vec<Vertex> = (0..model.vertex_count())
            .map(|i| Vertex {
                position: Vec3::from_slice(&model.positions[i * 3..]),
                normal: model
                    .normals
                    .get(i * 3..i * 3 + 3)
                    .map(Vec3::from_slice)
                    .unwrap_or(Vec3::Z),
                uv: model
                    .uvs
                    .get(i * 2..i * 2 + 2)
                    .map(glam::Vec2::from_slice)
                    .unwrap_or_default(),
            })
            .collect();

        let vertex = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{}_vertices", self.name)),
                size: (vertices.len() * std::mem::size_of::<Vertex>()) as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            bytemuck::cast_slice(&vertices),
        )?;
        let index = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{}_indices", self.name)),
                size: (model.indices.len() * std::mem::size_of::<u32>()) as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            bytemuck::cast_slice(&model.indices),
        )?;

        self.gpu = Some(GpuBuffers { vertex, index });
        Ok(())
    }

    fn render(&self, ctx: &mut DrawContext) {
        self.render_with(ctx, self.model_matrix);
    }

    fn render_shadow(&self, ctx: &mut ShadowContext) {
        self.render_shadow_with(ctx, self.model_matrix);
    }

    fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(gpu) = self.gpu.take() {
            backend.destroy_buffer(gpu.vertex);
            backend.destroy_buffer(gpu.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::resources::loader::{LoadError, MaterialData, MeshData};
    use crate::resources::GeometryBuilder;
    use std::path::PathBuf;

    fn material(name: &str, alpha: f32) -> MaterialData {
        MaterialData {
            name: name.to_string(),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.5),
            specular: Vec3::ZERO,
            shininess: 8.0,
            alpha,
            diffuse_texture: None,
        }
    }

    /// One opaque mesh at the origin plus transparent meshes placed along +X.
    fn panes(distances: &[f32]) -> ModelData {
        let mut model = GeometryBuilder::plane(1.0, 1.0, 1.0).into_model("base", material("solid", 1.0));
        model.materials.push(material("glass", 0.4));
        let mut root = NodeData::leaf("root", Mat4::IDENTITY, vec![0]);
        for (i, &d) in distances.iter().enumerate() {
            model.meshes.push(MeshData {
                name: format!("pane{}", i),
                index_offset: 0,
                index_count: 6,
                material: Some(1),
            });
            root.children.push(NodeData::leaf(
                &format!("pane{}", i),
                Mat4::from_translation(Vec3::new(d, 0.0, 0.0)),
                vec![i + 1],
            ));
        }
        model.root = root;
        model
    }

    #[test]
    fn test_transparent_meshes_drawn_far_to_near() {
        let mut textures = TextureRegistry::new();
        let object = Object::from_model("panes", panes(&[5.0, 2.0, 8.0]), &mut textures);

        let order: Vec<String> = object
            .draw_order(Vec3::ZERO, Mat4::IDENTITY)
            .iter()
            .map(|item| item.mesh.name.clone())
            .collect();
        assert_eq!(order, vec!["base", "pane2", "pane0", "pane1"]);
    }

    #[test]
    fn test_opaque_meshes_come_first() {
        let mut textures = TextureRegistry::new();
        let object = Object::from_model("panes", panes(&[1.0]), &mut textures);
        let order = object.draw_order(Vec3::new(100.0, 0.0, 0.0), Mat4::IDENTITY);
        assert!(order[0].mesh.is_opaque());
        assert!(!order[1].mesh.is_opaque());
    }

    struct FailingLoader;

    impl ModelLoader for FailingLoader {
        fn load(&self, path: &Path) -> Result<ModelData, LoadError> {
            Err(LoadError::NotFound(path.to_path_buf()))
        }
    }

    #[test]
    fn test_failed_object_draws_nothing() {
        let mut backend = DummyBackend::new(8, 8);
        let mut textures = TextureRegistry::new();
        let mut object = Object::load(&FailingLoader, &PathBuf::from("missing/car.obj"), &mut textures);
        assert_eq!(object.name(), "car");
        assert!(!object.is_ok());
        object.initialize(&mut backend).unwrap();
        assert!(!object.is_uploaded());
        assert_eq!(backend.live_buffer_count(), 0);
        assert!(object.draw_order(Vec3::ZERO, Mat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_model_without_meshes_is_failed() {
        let mut backend = DummyBackend::new(8, 8);
        let mut textures = TextureRegistry::new();
        let mut model = GeometryBuilder::cuboid(Vec3::ONE).into_model("box", material("m", 1.0));
        model.meshes.clear();
        model.root.meshes.clear();
        model.root.children.clear();

        let mut object = Object::from_model("box", model, &mut textures);
        assert!(!object.is_ok());
        object.initialize(&mut backend).unwrap();
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_root_reaching_no_mesh_is_failed() {
        let mut textures = TextureRegistry::new();
        let mut model = GeometryBuilder::cuboid(Vec3::ONE).into_model("box", material("m", 1.0));
        model.root = NodeData::leaf("empty", Mat4::IDENTITY, vec![]);

        let object = Object::from_model("box", model, &mut textures);
        assert!(!object.is_ok());
        assert!(object.draw_order(Vec3::ZERO, Mat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_upload_releases_host_geometry() {
        let mut backend = DummyBackend::new(8, 8);
        let mut textures = TextureRegistry::new();
        let mut object = Object::from_model(
            "box",
            GeometryBuilder::cuboid(Vec3::ONE).into_model("box", material("m", 1.0)),
            &mut textures,
        );
        object.initialize(&mut backend).unwrap();
        assert!(object.is_uploaded());
        assert_eq!(backend.live_buffer_count(), 2);

        object.cleanup(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
        // Host data is gone, so a second upload is a no-op.
        object.initialize(&mut backend).unwrap();
        assert!(!object.is_uploaded());
    }
}
