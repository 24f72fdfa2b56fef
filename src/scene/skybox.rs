//! Cube-mapped sky

use std::path::PathBuf;

use glam::Vec3;

use super::Renderable;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::renderer::{DrawContext, ShadowContext, SkyboxBinding};
use crate::resources::{GeometryBuilder, Material, MaterialData, Object, TextureData, TextureRegistry};

/// Faces in cube-map layer order.
pub const FACE_NAMES: [&str; 6] = ["+X", "-X", "+Y", "-Y", "+Z", "-Z"];

struct GpuCubeMap {
    texture: TextureHandle,
    view: TextureViewHandle,
    sampler: SamplerHandle,
}

pub struct Skybox {
    faces: Option<[TextureData; 6]>,
    cube: Object,
    gpu: Option<GpuCubeMap>,
}

impl Skybox {
    /// Sky from six image files. Any unreadable face, or faces of differing
    /// sizes, falls back to the built-in gradient.
    pub fn from_files(paths: &[PathBuf; 6], textures: &mut TextureRegistry) -> Self {
        let mut faces = Vec::with_capacity(6);
        for (path, face) in paths.iter().zip(FACE_NAMES) {
            match TextureData::from_file(path) {
                Ok(data) => faces.push(data),
                Err(e) => {
                    log::warn!("Skybox face {}: {}; using built-in sky", face, e);
                    return Self::gradient(textures);
                }
            }
        }

        let size = (faces[0].width, faces[0].height);
        if faces.iter().any(|f| (f.width, f.height) != size) {
            log::warn!("Skybox faces differ in size; using built-in sky");
            return Self::gradient(textures);
        }
        match <[TextureData; 6]>::try_from(faces) {
            Ok(faces) => Self::with_faces(faces, textures),
            Err(_) => Self::gradient(textures),
        }
    }

    /// Solid-colored faces: blue overhead, pale at the horizon, dark below.
    pub fn gradient(textures: &mut TextureRegistry) -> Self {
        let horizon = [170, 200, 235, 255];
        let faces = [
            TextureData::solid_color(horizon, "sky+x"),
            TextureData::solid_color(horizon, "sky-x"),
            TextureData::solid_color([70, 120, 200, 255], "sky+y"),
            TextureData::solid_color([60, 60, 55, 255], "sky-y"),
            TextureData::solid_color(horizon, "sky+z"),
            TextureData::solid_color(horizon, "sky-z"),
        ];
        Self::with_faces(faces, textures)
    }

    fn with_faces(faces: [TextureData; 6], textures: &mut TextureRegistry) -> Self {
        let cube = GeometryBuilder::cuboid(Vec3::splat(2.0))
            .into_model("skybox", MaterialData::from_material(&Material::new("sky"), None));
        Self {
            faces: Some(faces),
            cube: Object::from_model("skybox", cube, textures),
            gpu: None,
        }
    }

    /// Cube map bound at group 0. `None` until initialized.
    pub fn binding(&self) -> Option<SkyboxBinding> {
        self.gpu.as_ref().map(|gpu| SkyboxBinding {
            view: gpu.view,
            sampler: gpu.sampler,
        })
    }
}

impl Renderable for Skybox {
    fn initialize(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        self.cube.initialize(backend)?;
        let Some(faces) = self.faces.take() else {
            return Ok(());
        };

        let (width, height) = (faces[0].width, faces[0].height);
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("skybox".to_string()),
            width,
            height,
            array_layers: 6,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        for (layer, face) in faces.iter().enumerate() {
            backend.write_texture(texture, layer as u32, &face.data, width, height);
        }
        let view = backend.create_texture_view(texture, TextureViewDimension::Cube)?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("skybox_sampler".to_string()),
            ..Default::default()
        })?;

        log::debug!("Skybox uploaded ({}x{} per face)", width, height);
        self.gpu = Some(GpuCubeMap {
            texture,
            view,
            sampler,
        });
        Ok(())
    }

    fn render(&self, ctx: &mut DrawContext) {
        if self.gpu.is_none() || !self.cube.bind_buffers(ctx.backend()) {
            return;
        }
        if let Some(root) = self.cube.root() {
            let mut ranges = Vec::new();
            root.visit_meshes(glam::Mat4::IDENTITY, &mut |mesh, _| ranges.push(mesh.indices()));
            for range in ranges {
                ctx.draw_sky(range);
            }
        }
    }

    /// The sky casts no shadows.
    fn render_shadow(&self, _ctx: &mut ShadowContext) {}

    fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        self.cube.cleanup(backend);
        if let Some(gpu) = self.gpu.take() {
            backend.destroy_texture_view(gpu.view);
            backend.destroy_texture(gpu.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_missing_faces_fall_back_to_gradient() {
        let mut textures = TextureRegistry::new();
        let paths: [PathBuf; 6] = std::array::from_fn(|i| PathBuf::from(format!("no/such/face{}.png", i)));
        let mut sky = Skybox::from_files(&paths, &mut textures);

        let mut backend = DummyBackend::new(8, 8);
        assert!(sky.binding().is_none());
        sky.initialize(&mut backend).unwrap();
        assert!(sky.binding().is_some());

        sky.cleanup(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
