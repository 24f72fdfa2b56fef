//! Texture loading and the scene's texture registry

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use super::loader::LoadError;
use crate::backend::traits::*;
use crate::backend::types::*;

/// Loaded texture data
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| LoadError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(img, &name))
    }

    /// Create texture from image
    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Create a default white texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Create a checkerboard texture with `cell`-pixel squares
    pub fn checkerboard(size: u32, cell: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / cell) + (y / cell)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: "checkerboard".to_string(),
        }
    }
}

/// Stable handle into a [`TextureRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// The built-in white texture, always present.
    pub const DEFAULT: Self = Self(0);
}

struct GpuTexture {
    handle: TextureHandle,
    view: TextureViewHandle,
    bind_group: BindGroupHandle,
}

struct TextureEntry {
    name: String,
    /// Host pixels, released once uploaded.
    data: Option<TextureData>,
    gpu: Option<GpuTexture>,
}

/// Owns every diffuse texture of a scene. Each distinct file path is decoded
/// once; handle 0 is a white texture used whenever a file is missing.
pub struct TextureRegistry {
    entries: Vec<TextureEntry>,
    by_path: HashMap<PathBuf, TextureId>,
    sampler: Option<SamplerHandle>,
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            by_path: HashMap::new(),
            sampler: None,
        };
        registry.insert(TextureData::white());
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, data: TextureData) -> TextureId {
        let id = TextureId(self.entries.len() as u32);
        self.entries.push(TextureEntry {
            name: data.name.clone(),
            data: Some(data),
            gpu: None,
        });
        id
    }

    /// Add generated pixel data that has no backing file.
    pub fn register(&mut self, data: TextureData) -> TextureId {
        self.insert(data)
    }

    /// Handle for the image at `path`, decoding it on first use. A file
    /// that cannot be read maps to [`TextureId::DEFAULT`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> TextureId {
        let path = path.as_ref();
        if let Some(&id) = self.by_path.get(path) {
            return id;
        }

        let id = match TextureData::from_file(path) {
            Ok(data) => {
                log::debug!("Loaded texture {} ({}x{})", path.display(), data.width, data.height);
                self.insert(data)
            }
            Err(e) => {
                log::warn!("{}; using default texture", e);
                TextureId::DEFAULT
            }
        };
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    pub fn name(&self, id: TextureId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    /// Upload every texture and create its bind group against
    /// `layout` (binding 0 texture, binding 1 sampler).
    pub fn initialize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<()> {
        let sampler = match self.sampler {
            Some(sampler) => sampler,
            None => {
                let sampler = backend.create_sampler(&SamplerDescriptor {
                    label: Some("diffuse_sampler".to_string()),
                    address_mode: AddressMode::Repeat,
                    ..Default::default()
                })?;
                self.sampler = Some(sampler);
                sampler
            }
        };

        for entry in &mut self.entries {
            let Some(data) = entry.data.take() else {
                continue;
            };
            let handle = backend.create_texture(&TextureDescriptor {
                label: Some(data.name.clone()),
                width: data.width,
                height: data.height,
                array_layers: 1,
                format: data.format,
                usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            })?;
            let view = backend.create_texture_view(handle, TextureViewDimension::D2)?;
            backend.write_texture(handle, 0, &data.data, data.width, data.height);
            let bind_group = backend.create_bind_group(
                layout,
                &[
                    (0, BindGroupEntry::Texture(view)),
                    (1, BindGroupEntry::Sampler(sampler)),
                ],
            )?;
            entry.gpu = Some(GpuTexture {
                handle,
                view,
                bind_group,
            });
        }

        log::info!("Uploaded {} textures", self.entries.len());
        Ok(())
    }

    /// Bind group for `id`, falling back to the default texture.
    pub fn bind_group(&self, id: TextureId) -> Option<BindGroupHandle> {
        self.entries
            .get(id.0 as usize)
            .and_then(|e| e.gpu.as_ref())
            .or_else(|| self.entries.first().and_then(|e| e.gpu.as_ref()))
            .map(|gpu| gpu.bind_group)
    }

    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        for entry in &mut self.entries {
            if let Some(gpu) = entry.gpu.take() {
                backend.destroy_bind_group(gpu.bind_group);
                backend.destroy_texture_view(gpu.view);
                backend.destroy_texture(gpu.handle);
            }
        }
        self.sampler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_default_texture_is_first() {
        let registry = TextureRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name(TextureId::DEFAULT), Some("white"));
    }

    #[test]
    fn test_missing_file_maps_to_default() {
        let mut registry = TextureRegistry::new();
        let id = registry.load("/nonexistent/texture.png");
        assert_eq!(id, TextureId::DEFAULT);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_path_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let mut registry = TextureRegistry::new();
        let a = registry.load(&path);
        let b = registry.load(&path);
        assert_eq!(a, b);
        assert_ne!(a, TextureId::DEFAULT);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_upload_and_cleanup() {
        let mut backend = DummyBackend::new(64, 64);
        let layout = backend.create_bind_group_layout(&[]).unwrap();
        let mut registry = TextureRegistry::new();
        let checker = registry.register(TextureData::checkerboard(16, 4, [0; 4], [255; 4]));

        registry.initialize(&mut backend, layout).unwrap();
        assert_eq!(backend.live_texture_count(), 2);
        assert!(registry.bind_group(checker).is_some());
        assert_eq!(registry.bind_group(TextureId(99)), registry.bind_group(TextureId::DEFAULT));

        registry.cleanup(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
        assert!(registry.bind_group(checker).is_none());
    }
}
