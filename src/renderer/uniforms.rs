//! GPU uniform layouts and the per-frame uniform arena

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::Material;
use crate::scene::light::CASCADE_COUNT;

/// Per-draw uniform shared by the opaque, transparent, shadow and skybox
/// pipelines. Matches `DrawUniform` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniform {
    pub model: Mat4,
    pub model_view: Mat4,
    pub mvp: Mat4,
    pub light_mvp: [Mat4; CASCADE_COUNT],
    /// Inverse transpose of the model matrix.
    pub normal: Mat4,
    pub ka: Vec4,
    pub kd: Vec4,
    pub ks: Vec4,
    pub shininess: f32,
    pub alpha: f32,
    /// Active cascade during the shadow pass.
    pub cascade: u32,
    pub _padding: u32,
}

impl DrawUniform {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Uniform for a shaded draw.
    pub fn shaded(
        model: Mat4,
        view: Mat4,
        projection: Mat4,
        light_space: &[Mat4; CASCADE_COUNT],
        material: &Material,
    ) -> Self {
        let model_view = view * model;
        Self {
            model,
            model_view,
            mvp: projection * model_view,
            light_mvp: light_space.map(|light| light * model),
            normal: model.inverse().transpose(),
            ka: material.ambient.extend(1.0),
            kd: material.diffuse.extend(1.0),
            ks: material.specular.extend(1.0),
            shininess: material.shininess,
            alpha: material.alpha,
            cascade: 0,
            _padding: 0,
        }
    }

    /// Uniform for a depth-only draw into one cascade.
    pub fn shadow(model: Mat4, light_space: &[Mat4; CASCADE_COUNT], cascade: usize) -> Self {
        Self {
            model,
            light_mvp: light_space.map(|light| light * model),
            cascade: cascade as u32,
            ..Self::zeroed()
        }
    }
}

/// Per-frame data at group 0, binding 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniform {
    pub view: Mat4,
    pub projection: Mat4,
    /// xyz = direction the light travels
    pub light_direction: Vec4,
    /// xyz = RGB intensity
    pub light_intensity: Vec4,
    pub camera_position: Vec4,
    /// xyz = far distance of each cascade, w = 1 when shadows are sampled
    pub cascade_far: Vec4,
}

impl FrameUniform {
    pub fn new(
        view: Mat4,
        projection: Mat4,
        light_direction: Vec3,
        light_intensity: Vec3,
        camera_position: Vec3,
        cascade_distances: &[f32; CASCADE_COUNT + 1],
        shadows_enabled: bool,
    ) -> Self {
        Self {
            view,
            projection,
            light_direction: light_direction.extend(0.0),
            light_intensity: light_intensity.extend(1.0),
            camera_position: camera_position.extend(1.0),
            cascade_far: Vec4::new(
                cascade_distances[1],
                cascade_distances[2],
                cascade_distances[3],
                if shadows_enabled { 1.0 } else { 0.0 },
            ),
        }
    }
}

/// A sub-allocation from the uniform arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingAllocation {
    /// Byte offset into the arena, usable as a dynamic offset.
    pub offset: u64,
    pub size: u64,
}

/// One uniform buffer holding every per-draw uniform of a frame, addressed
/// by dynamic offsets. Reset at the start of each frame.
#[derive(Debug)]
pub struct UniformRing {
    capacity: u64,
    alignment: u64,
    write_offset: u64,
    overflowed: bool,
    buffer: Option<BufferHandle>,
    bind_group: Option<BindGroupHandle>,
}

impl UniformRing {
    /// Matches the common minimum uniform buffer offset alignment.
    pub const DEFAULT_ALIGNMENT: u64 = 256;

    pub fn new(capacity: u64) -> Self {
        Self::with_alignment(capacity, Self::DEFAULT_ALIGNMENT)
    }

    /// `alignment` is rounded up to a power of two.
    pub fn with_alignment(capacity: u64, alignment: u64) -> Self {
        let alignment = alignment.max(1).next_power_of_two();
        Self {
            capacity: align_up(capacity, alignment),
            alignment,
            write_offset: 0,
            overflowed: false,
            buffer: None,
            bind_group: None,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.write_offset
    }

    /// Create the GPU buffer and a bind group exposing one `DrawUniform`
    /// window at binding 0 of `layout`.
    pub fn initialize(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<()> {
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("draw_uniform_ring".to_string()),
            size: self.capacity,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let bind_group = backend.create_bind_group(
            layout,
            &[(
                0,
                BindGroupEntry::Buffer {
                    buffer,
                    offset: 0,
                    size: Some(DrawUniform::SIZE),
                },
            )],
        )?;
        self.buffer = Some(buffer);
        self.bind_group = Some(bind_group);
        Ok(())
    }

    pub fn bind_group(&self) -> Option<BindGroupHandle> {
        self.bind_group
    }

    /// Reserve `size` bytes. Returns `None` when the arena is full.
    pub fn allocate(&mut self, size: u64) -> Option<RingAllocation> {
        let offset = align_up(self.write_offset, self.alignment);
        if offset + size > self.capacity {
            return None;
        }
        self.write_offset = offset + size;
        Some(RingAllocation { offset, size })
    }

    /// Copy `value` into the arena and return its dynamic offset. A full
    /// arena drops the draw and warns once per frame.
    pub fn push<T: Pod>(&mut self, backend: &mut dyn GraphicsBackend, value: &T) -> Option<u32> {
        let buffer = self.buffer?;
        let bytes = bytemuck::bytes_of(value);
        match self.allocate(bytes.len() as u64) {
            Some(allocation) => {
                backend.write_buffer(buffer, allocation.offset, bytes);
                Some(allocation.offset as u32)
            }
            None => {
                if !self.overflowed {
                    log::warn!(
                        "Uniform arena full ({} bytes); dropping draws for this frame",
                        self.capacity
                    );
                    self.overflowed = true;
                }
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.write_offset = 0;
        self.overflowed = false;
    }

    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(bind_group) = self.bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.reset();
    }
}

#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(DrawUniform::SIZE, 512);
        assert_eq!(DrawUniform::SIZE % UniformRing::DEFAULT_ALIGNMENT, 0);
        assert_eq!(std::mem::size_of::<FrameUniform>(), 192);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_allocation_alignment_and_overflow() {
        let mut ring = UniformRing::new(1024);
        assert_eq!(ring.allocate(100).unwrap().offset, 0);
        assert_eq!(ring.allocate(100).unwrap().offset, 256);
        assert_eq!(ring.allocate(512).unwrap().offset, 512);
        assert!(ring.allocate(1).is_none());

        ring.reset();
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.allocate(1024).unwrap().offset, 0);
    }

    #[test]
    fn test_push_requires_initialization() {
        let mut backend = DummyBackend::new(8, 8);
        let mut ring = UniformRing::new(4096);
        assert!(ring.push(&mut backend, &DrawUniform::zeroed()).is_none());

        let layout = backend.create_bind_group_layout(&[]).unwrap();
        ring.initialize(&mut backend, layout).unwrap();
        assert_eq!(ring.push(&mut backend, &DrawUniform::zeroed()), Some(0));
        assert_eq!(ring.push(&mut backend, &DrawUniform::zeroed()), Some(512));

        ring.cleanup(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_shaded_uniform_matrices() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let uniform = DrawUniform::shaded(
            model,
            view,
            Mat4::IDENTITY,
            &[Mat4::IDENTITY; CASCADE_COUNT],
            &Material::glass(),
        );
        assert!(uniform.model_view.abs_diff_eq(view * model, 1e-6));
        assert!(uniform.light_mvp[2].abs_diff_eq(model, 1e-6));
        assert!(uniform.alpha < 1.0);
    }
}
