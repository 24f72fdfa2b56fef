//! Dummy GPU backend for testing without GPU hardware.
//!
//! Every resource creation succeeds and hands out a fresh handle. Commands
//! recorded inside render passes are kept in order so tests can inspect what
//! a frame would have drawn.

use std::collections::HashSet;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command observed by the [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass {
        label: Option<String>,
        color_targets: usize,
        has_depth: bool,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
        offsets: Vec<u32>,
    },
    SetVertexBuffer(BufferHandle),
    SetIndexBuffer(BufferHandle),
    DrawIndexed {
        indices: std::ops::Range<u32>,
    },
}

/// Recording backend used by unit and integration tests.
#[derive(Debug)]
pub struct DummyBackend {
    size: (u32, u32),
    capability: RenderCapability,
    next_id: u64,
    commands: Vec<RecordedCommand>,
    pending_errors: Vec<String>,
    live_buffers: HashSet<u64>,
    live_textures: HashSet<u64>,
    frames_submitted: usize,
}

impl DummyBackend {
    /// Create a new dummy backend with a `width` x `height` surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            capability: RenderCapability::Full,
            next_id: 1,
            commands: Vec::new(),
            pending_errors: Vec::new(),
            live_buffers: HashSet::new(),
            live_textures: HashSet::new(),
            frames_submitted: 0,
        }
    }

    /// Pretend to be a device with the given capability level.
    pub fn with_capability(mut self, capability: RenderCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Commands recorded since creation or the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Index ranges of every indexed draw, in submission order.
    pub fn draw_calls(&self) -> Vec<std::ops::Range<u32>> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::DrawIndexed { indices } => Some(indices.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queue an error to be returned by the next `poll_errors`.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.pending_errors.push(message.into());
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    pub fn frames_submitted(&self) -> usize {
        self.frames_submitted
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsBackend for DummyBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let id = self.allocate_id();
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(id),
            width: self.size.0,
            height: self.size.1,
        })
    }

    fn begin_offscreen_frame(&mut self) {}

    fn end_frame(&mut self) -> BackendResult<()> {
        self.frames_submitted += 1;
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Rgba8UnormSrgb
    }

    fn capability(&self) -> RenderCapability {
        self.capability
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = self.allocate_id();
        self.live_buffers.insert(id);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} with {} bytes",
            desc.label,
            data.len()
        );
        let id = self.allocate_id();
        self.live_buffers.insert(id);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, _buffer: BufferHandle, _offset: u64, _data: &[u8]) {}

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );
        let id = self.allocate_id();
        self.live_textures.insert(id);
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        _texture: TextureHandle,
        _dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        Ok(TextureViewHandle(self.allocate_id()))
    }

    fn write_texture(&mut self, _texture: TextureHandle, _layer: u32, _data: &[u8], _width: u32, _height: u32) {}

    fn read_texture(
        &mut self,
        _texture: TextureHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<Vec<u8>> {
        Ok(vec![0; (width * height * 4) as usize])
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.allocate_id()))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.allocate_id()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        Ok(BindGroupHandle(self.allocate_id()))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        log::trace!("DummyBackend: creating pipeline {:?}", desc.label);
        Ok(RenderPipelineHandle(self.allocate_id()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: desc.label.clone(),
            color_targets: desc.color_attachments.len(),
            has_depth: desc.depth_stencil_attachment.is_some(),
        });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle, offsets: &[u32]) {
        self.commands.push(RecordedCommand::SetBindGroup {
            index,
            bind_group,
            offsets: offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, _slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands.push(RecordedCommand::SetVertexBuffer(buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, _format: IndexFormat) {
        self.commands.push(RecordedCommand::SetIndexBuffer(buffer));
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _min_depth: f32, _max_depth: f32) {}

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        _instances: std::ops::Range<u32>,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed { indices });
    }

    fn poll_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_errors)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.live_buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.live_textures.remove(&texture.0);
    }

    fn destroy_texture_view(&mut self, _view: TextureViewHandle) {}

    fn destroy_bind_group(&mut self, _bind_group: BindGroupHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mut backend = DummyBackend::new(64, 64);
        let desc = BufferDescriptor {
            label: None,
            size: 16,
            usage: BufferUsage::UNIFORM,
        };
        let a = backend.create_buffer(&desc).unwrap();
        let b = backend.create_buffer(&desc).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_buffer_count(), 2);

        backend.destroy_buffer(a);
        assert_eq!(backend.live_buffer_count(), 1);
    }

    #[test]
    fn test_injected_errors_drain_once() {
        let mut backend = DummyBackend::new(64, 64);
        backend.inject_error("validation");
        assert_eq!(backend.poll_errors(), vec!["validation".to_string()]);
        assert!(backend.poll_errors().is_empty());
    }

    #[test]
    fn test_readback_size() {
        let mut backend = DummyBackend::new(64, 64);
        let texture = backend.create_texture(&TextureDescriptor::default()).unwrap();
        let pixels = backend.read_texture(texture, 4, 3).unwrap();
        assert_eq!(pixels.len(), 48);
    }
}
