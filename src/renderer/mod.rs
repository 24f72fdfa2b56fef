//! Frame-level GPU state and the draw contexts handed to renderables
//!
//! A frame is three depth-only cascade passes followed by one color pass.
//! [`FrameResources`] owns everything shared by those passes; renderables
//! only ever see a [`ShadowContext`] or a [`DrawContext`].

pub mod shaders;
pub mod shadow;
pub mod uniforms;

pub use shadow::{ShadowMaps, ShadowStrategy, DEFAULT_SHADOW_RESOLUTION};
pub use uniforms::{DrawUniform, FrameUniform, RingAllocation, UniformRing};

use glam::{Mat4, Vec3};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{Mesh, TextureRegistry};
use crate::scene::light::CASCADE_COUNT;

/// Uniform arena size: room for a few thousand draws per frame.
pub const DEFAULT_RING_CAPACITY: u64 = 2 * 1024 * 1024;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Where the color pass writes.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub color: TextureViewHandle,
    pub depth: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// Depth attachment that follows the size of its color target.
#[derive(Debug, Default)]
pub struct DepthBuffer {
    texture: Option<(TextureHandle, TextureViewHandle)>,
    size: (u32, u32),
}

impl DepthBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// View sized `width` x `height`, recreating the texture on a size change.
    pub fn ensure(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
    ) -> BackendResult<TextureViewHandle> {
        let size = (width.max(1), height.max(1));
        if let Some((_, view)) = self.texture {
            if self.size == size {
                return Ok(view);
            }
        }
        self.cleanup(backend);

        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("scene_depth".to_string()),
            width: size.0,
            height: size.1,
            array_layers: 1,
            format: DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture, TextureViewDimension::D2)?;
        self.texture = Some((texture, view));
        self.size = size;
        Ok(view)
    }

    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some((texture, view)) = self.texture.take() {
            backend.destroy_texture_view(view);
            backend.destroy_texture(texture);
        }
    }
}

/// Which color pipeline a mesh is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Opaque,
    Transparent,
    Skybox,
}

#[derive(Debug, Clone, Copy)]
pub struct Pipelines {
    pub opaque: RenderPipelineHandle,
    pub transparent: RenderPipelineHandle,
    pub shadow: RenderPipelineHandle,
    pub skybox: RenderPipelineHandle,
}

impl Pipelines {
    pub fn get(&self, kind: PipelineKind) -> RenderPipelineHandle {
        match kind {
            PipelineKind::Opaque => self.opaque,
            PipelineKind::Transparent => self.transparent,
            PipelineKind::Skybox => self.skybox,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BindGroupLayouts {
    pub frame: BindGroupLayoutHandle,
    pub draw: BindGroupLayoutHandle,
    pub material: BindGroupLayoutHandle,
}

/// Sky cube map bound at group 0 next to the shadow maps.
#[derive(Debug, Clone, Copy)]
pub struct SkyboxBinding {
    pub view: TextureViewHandle,
    pub sampler: SamplerHandle,
}

/// Everything shared by the passes of one frame.
pub struct FrameResources {
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    frame_buffer: BufferHandle,
    frame_bind_group: BindGroupHandle,
    ring: UniformRing,
    shadow_maps: ShadowMaps,
}

impl FrameResources {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        color_format: TextureFormat,
        strategy: ShadowStrategy,
        skybox: SkyboxBinding,
    ) -> BackendResult<Self> {
        let layouts = Self::create_layouts(backend)?;
        let shadow_maps = ShadowMaps::new(backend, strategy)?;

        let frame_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("frame_uniforms".to_string()),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        let mut entries = vec![(
            0,
            BindGroupEntry::Buffer {
                buffer: frame_buffer,
                offset: 0,
                size: None,
            },
        )];
        for (i, view) in shadow_maps.views().into_iter().enumerate() {
            entries.push((1 + i as u32, BindGroupEntry::Texture(view)));
        }
        entries.push((4, BindGroupEntry::Sampler(shadow_maps.sampler())));
        entries.push((5, BindGroupEntry::Texture(skybox.view)));
        entries.push((6, BindGroupEntry::Sampler(skybox.sampler)));
        let frame_bind_group = backend.create_bind_group(layouts.frame, &entries)?;

        let mut ring = UniformRing::new(DEFAULT_RING_CAPACITY);
        ring.initialize(backend, layouts.draw)?;

        let pipelines = Self::create_pipelines(backend, &layouts, color_format)?;

        Ok(Self {
            layouts,
            pipelines,
            frame_buffer,
            frame_bind_group,
            ring,
            shadow_maps,
        })
    }

    fn create_layouts(backend: &mut dyn GraphicsBackend) -> BackendResult<BindGroupLayouts> {
        let mut frame_entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer {
                dynamic: false,
                min_binding_size: None,
            },
        }];
        for cascade in 0..CASCADE_COUNT as u32 {
            frame_entries.push(BindGroupLayoutEntry {
                binding: 1 + cascade,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                    view_dimension: TextureViewDimension::D2,
                },
            });
        }
        frame_entries.extend([
            BindGroupLayoutEntry {
                binding: 4,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { comparison: true },
            },
            BindGroupLayoutEntry {
                binding: 5,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::Cube,
                },
            },
            BindGroupLayoutEntry {
                binding: 6,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { comparison: false },
            },
        ]);
        let frame = backend.create_bind_group_layout(&frame_entries)?;

        let draw = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer {
                dynamic: true,
                min_binding_size: Some(DrawUniform::SIZE),
            },
        }])?;

        let material = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { comparison: false },
            },
        ])?;

        Ok(BindGroupLayouts { frame, draw, material })
    }

    fn create_pipelines(
        backend: &mut dyn GraphicsBackend,
        layouts: &BindGroupLayouts,
        color_format: TextureFormat,
    ) -> BackendResult<Pipelines> {
        let depth = |write: bool, compare: CompareFunction| DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: write,
            depth_compare: compare,
            bias: DepthBias::default(),
        };
        let color = |blend: Option<BlendState>| ColorTargetState {
            format: color_format,
            blend,
            write_mask: ColorWrites::ALL,
        };
        let shaded = |label: &str,
                      shader: &str,
                      bind_group_layouts: Vec<BindGroupLayoutHandle>,
                      depth_stencil: DepthStencilState,
                      target: ColorTargetState| RenderPipelineDescriptor {
            label: Some(label.to_string()),
            shader: shader.to_string(),
            has_fragment: true,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts,
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            // Imported models do not guarantee consistent winding.
            cull_mode: CullMode::None,
            depth_stencil: Some(depth_stencil),
            color_targets: vec![target],
        };

        let scene_layouts = vec![layouts.frame, layouts.draw, layouts.material];
        let opaque = backend.create_render_pipeline(&shaded(
            "opaque",
            shaders::SCENE_SHADER,
            scene_layouts.clone(),
            depth(true, CompareFunction::Less),
            color(None),
        ))?;
        let transparent = backend.create_render_pipeline(&shaded(
            "transparent",
            shaders::SCENE_SHADER,
            scene_layouts,
            depth(false, CompareFunction::Less),
            color(Some(BlendState::alpha_blending())),
        ))?;
        let skybox = backend.create_render_pipeline(&shaded(
            "skybox",
            shaders::SKYBOX_SHADER,
            vec![layouts.frame, layouts.draw],
            depth(false, CompareFunction::LessEqual),
            color(None),
        ))?;

        let shadow = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("shadow".to_string()),
            shader: shaders::SHADOW_SHADER.to_string(),
            has_fragment: false,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.draw],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: Some(DepthStencilState {
                bias: DepthBias {
                    constant: 2,
                    slope_scale: 2.0,
                },
                ..depth(true, CompareFunction::LessEqual)
            }),
            color_targets: Vec::new(),
        })?;

        Ok(Pipelines {
            opaque,
            transparent,
            shadow,
            skybox,
        })
    }

    pub fn layouts(&self) -> &BindGroupLayouts {
        &self.layouts
    }

    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    pub fn shadow_maps(&self) -> &ShadowMaps {
        &self.shadow_maps
    }

    pub fn shadow_strategy(&self) -> ShadowStrategy {
        self.shadow_maps.strategy()
    }

    /// Start a new frame: rewind the uniform arena and upload frame data.
    pub fn begin_frame(&mut self, backend: &mut dyn GraphicsBackend, frame: &FrameUniform) {
        self.ring.reset();
        backend.write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(frame));
    }

    /// Open the depth-only pass of `cascade` and return its draw context.
    pub fn begin_shadow_pass<'a>(
        &'a mut self,
        backend: &'a mut dyn GraphicsBackend,
        light_space: [Mat4; CASCADE_COUNT],
        cascade: usize,
    ) -> Option<ShadowContext<'a>> {
        let desc = self.shadow_maps.pass_descriptor(cascade)?;
        backend.begin_render_pass(&desc);
        backend.set_render_pipeline(self.pipelines.shadow);
        Some(ShadowContext {
            backend,
            ring: &mut self.ring,
            light_space,
            cascade,
        })
    }

    /// Open the color pass on `target`, cleared to `clear_color`.
    pub fn begin_color_pass<'a>(
        &'a mut self,
        backend: &'a mut dyn GraphicsBackend,
        textures: &'a TextureRegistry,
        target: &RenderTarget,
        clear_color: [f32; 4],
        view: ViewParams,
    ) -> DrawContext<'a> {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("color_pass".to_string()),
            color_attachments: vec![ColorAttachment {
                view: target.color,
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: target.depth,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
        backend.set_bind_group(0, self.frame_bind_group, &[]);
        DrawContext {
            backend,
            ring: &mut self.ring,
            textures,
            pipelines: self.pipelines,
            view,
            current: None,
        }
    }

    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        self.ring.cleanup(backend);
        self.shadow_maps.cleanup(backend);
        backend.destroy_bind_group(self.frame_bind_group);
        backend.destroy_buffer(self.frame_buffer);
    }
}

/// Camera and light matrices for the color pass.
#[derive(Debug, Clone, Copy)]
pub struct ViewParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub light_space: [Mat4; CASCADE_COUNT],
    pub eye: Vec3,
}

/// Color pass recorder. Group 0 is already bound; each draw binds its own
/// uniform window and diffuse texture.
pub struct DrawContext<'a> {
    backend: &'a mut dyn GraphicsBackend,
    ring: &'a mut UniformRing,
    textures: &'a TextureRegistry,
    pipelines: Pipelines,
    view: ViewParams,
    current: Option<PipelineKind>,
}

impl<'a> DrawContext<'a> {
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    pub fn view(&self) -> &ViewParams {
        &self.view
    }

    pub fn eye(&self) -> Vec3 {
        self.view.eye
    }

    fn use_pipeline(&mut self, kind: PipelineKind) {
        if self.current != Some(kind) {
            self.backend.set_render_pipeline(self.pipelines.get(kind));
            self.current = Some(kind);
        }
    }

    fn bind_draw_uniform(&mut self, uniform: &DrawUniform) -> bool {
        let (Some(offset), Some(bind_group)) =
            (self.ring.push(&mut *self.backend, uniform), self.ring.bind_group())
        else {
            return false;
        };
        self.backend.set_bind_group(1, bind_group, &[offset]);
        true
    }

    /// Draw `mesh` from the currently bound vertex and index buffers.
    pub fn draw_mesh(&mut self, mesh: &Mesh, model: Mat4) {
        let kind = if mesh.is_opaque() {
            PipelineKind::Opaque
        } else {
            PipelineKind::Transparent
        };
        self.use_pipeline(kind);

        let uniform = DrawUniform::shaded(
            model,
            self.view.view,
            self.view.projection,
            &self.view.light_space,
            &mesh.material,
        );
        if !self.bind_draw_uniform(&uniform) {
            return;
        }
        if let Some(texture) = self.textures.bind_group(mesh.material.diffuse_texture) {
            self.backend.set_bind_group(2, texture, &[]);
        }
        self.backend.draw_indexed(mesh.indices(), 0, 0..1);
    }

    /// Draw the sky cube with the camera translation removed.
    pub fn draw_sky(&mut self, indices: std::ops::Range<u32>) {
        self.use_pipeline(PipelineKind::Skybox);
        let rotation_only = Mat4::from_mat3(glam::Mat3::from_mat4(self.view.view));
        let uniform = DrawUniform {
            mvp: self.view.projection * rotation_only,
            ..bytemuck::Zeroable::zeroed()
        };
        if self.bind_draw_uniform(&uniform) {
            self.backend.draw_indexed(indices, 0, 0..1);
        }
    }

    pub fn finish(self) {
        self.backend.end_render_pass();
    }
}

/// Depth-only recorder for one cascade.
pub struct ShadowContext<'a> {
    backend: &'a mut dyn GraphicsBackend,
    ring: &'a mut UniformRing,
    light_space: [Mat4; CASCADE_COUNT],
    cascade: usize,
}

impl<'a> ShadowContext<'a> {
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    pub fn cascade(&self) -> usize {
        self.cascade
    }

    pub fn draw_mesh(&mut self, mesh: &Mesh, model: Mat4) {
        let uniform = DrawUniform::shadow(model, &self.light_space, self.cascade);
        let (Some(offset), Some(bind_group)) =
            (self.ring.push(&mut *self.backend, &uniform), self.ring.bind_group())
        else {
            return;
        };
        self.backend.set_bind_group(0, bind_group, &[offset]);
        self.backend.draw_indexed(mesh.indices(), 0, 0..1);
    }

    pub fn finish(self) {
        self.backend.end_render_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, RecordedCommand};
    use crate::resources::Material;
    use std::sync::Arc;

    fn sky_binding(backend: &mut DummyBackend) -> SkyboxBinding {
        let texture = backend.create_texture(&TextureDescriptor::default()).unwrap();
        SkyboxBinding {
            view: backend.create_texture_view(texture, TextureViewDimension::Cube).unwrap(),
            sampler: backend.create_sampler(&SamplerDescriptor::default()).unwrap(),
        }
    }

    fn view_params() -> ViewParams {
        ViewParams {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            light_space: [Mat4::IDENTITY; CASCADE_COUNT],
            eye: Vec3::ZERO,
        }
    }

    #[test]
    fn test_pipeline_switches_are_deduplicated() {
        let mut backend = DummyBackend::new(64, 64);
        let sky = sky_binding(&mut backend);
        let mut resources = FrameResources::new(
            &mut backend,
            TextureFormat::Bgra8UnormSrgb,
            ShadowStrategy::Cascaded { resolution: 16 },
            sky,
        )
        .unwrap();
        let mut depth = DepthBuffer::new();
        let target = RenderTarget {
            color: sky.view,
            depth: depth.ensure(&mut backend, 64, 64).unwrap(),
            width: 64,
            height: 64,
        };
        let textures = TextureRegistry::new();
        let opaque = Mesh::new("a", 0, 6, Arc::new(Material::default()));
        let glass = Mesh::new("b", 6, 3, Arc::new(Material::glass()));

        backend.clear_commands();
        let mut ctx = resources.begin_color_pass(&mut backend, &textures, &target, [0.0; 4], view_params());
        ctx.draw_mesh(&opaque, Mat4::IDENTITY);
        ctx.draw_mesh(&opaque, Mat4::IDENTITY);
        ctx.draw_mesh(&glass, Mat4::IDENTITY);
        ctx.finish();

        let switches = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetPipeline(_)))
            .count();
        assert_eq!(switches, 2);
        assert_eq!(backend.draw_calls(), vec![0..6, 0..6, 6..9]);
    }

    #[test]
    fn test_depth_buffer_follows_size() {
        let mut backend = DummyBackend::new(64, 64);
        let mut depth = DepthBuffer::new();
        let first = depth.ensure(&mut backend, 64, 64).unwrap();
        assert_eq!(depth.ensure(&mut backend, 64, 64).unwrap(), first);
        assert_ne!(depth.ensure(&mut backend, 32, 32).unwrap(), first);
        assert_eq!(backend.live_texture_count(), 1);
        depth.cleanup(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
