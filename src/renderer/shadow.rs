//! Cascade depth maps and the capability-keyed shadow strategy

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::scene::light::CASCADE_COUNT;

pub const DEFAULT_SHADOW_RESOLUTION: u32 = 2048;

/// How shadows are produced, picked once from the device capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowStrategy {
    /// One full-size depth map per cascade; casters are drawn into each.
    Cascaded { resolution: u32 },
    /// 1x1 maps cleared to the far plane and never sampled.
    Disabled,
}

impl ShadowStrategy {
    pub fn for_capability(capability: RenderCapability, resolution: u32) -> Self {
        match capability {
            RenderCapability::Full => ShadowStrategy::Cascaded {
                resolution: resolution.max(1),
            },
            RenderCapability::Reduced => ShadowStrategy::Disabled,
        }
    }

    pub fn resolution(&self) -> u32 {
        match self {
            ShadowStrategy::Cascaded { resolution } => *resolution,
            ShadowStrategy::Disabled => 1,
        }
    }

    pub fn draws_casters(&self) -> bool {
        matches!(self, ShadowStrategy::Cascaded { .. })
    }
}

struct CascadeMap {
    texture: TextureHandle,
    view: TextureViewHandle,
}

/// Depth textures for every cascade plus the comparison sampler that reads
/// them.
pub struct ShadowMaps {
    strategy: ShadowStrategy,
    cascades: Vec<CascadeMap>,
    sampler: SamplerHandle,
}

impl ShadowMaps {
    pub fn new(backend: &mut dyn GraphicsBackend, strategy: ShadowStrategy) -> BackendResult<Self> {
        let size = strategy.resolution();
        let mut cascades = Vec::with_capacity(CASCADE_COUNT);
        for i in 0..CASCADE_COUNT {
            let texture = backend.create_texture(&TextureDescriptor {
                label: Some(format!("shadow_cascade_{}", i)),
                width: size,
                height: size,
                array_layers: 1,
                format: TextureFormat::Depth32Float,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            })?;
            let view = backend.create_texture_view(texture, TextureViewDimension::D2)?;
            cascades.push(CascadeMap { texture, view });
        }

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("shadow_sampler".to_string()),
            compare: Some(CompareFunction::LessEqual),
            ..Default::default()
        })?;

        log::info!("Shadow maps: {:?} ({}x{} per cascade)", strategy, size, size);
        Ok(Self {
            strategy,
            cascades,
            sampler,
        })
    }

    pub fn strategy(&self) -> ShadowStrategy {
        self.strategy
    }

    pub fn view(&self, cascade: usize) -> Option<TextureViewHandle> {
        self.cascades.get(cascade).map(|c| c.view)
    }

    pub fn views(&self) -> Vec<TextureViewHandle> {
        self.cascades.iter().map(|c| c.view).collect()
    }

    pub fn sampler(&self) -> SamplerHandle {
        self.sampler
    }

    /// Depth-only pass for one cascade, cleared to the far plane.
    pub fn pass_descriptor(&self, cascade: usize) -> Option<RenderPassDescriptor> {
        let view = self.view(cascade)?;
        Some(RenderPassDescriptor {
            label: Some(format!("shadow_pass_{}", cascade)),
            color_attachments: Vec::new(),
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        })
    }

    pub fn cleanup(&mut self, backend: &mut dyn GraphicsBackend) {
        for cascade in self.cascades.drain(..) {
            backend.destroy_texture_view(cascade.view);
            backend.destroy_texture(cascade.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_strategy_from_capability() {
        assert_eq!(
            ShadowStrategy::for_capability(RenderCapability::Full, 1024),
            ShadowStrategy::Cascaded { resolution: 1024 }
        );
        let reduced = ShadowStrategy::for_capability(RenderCapability::Reduced, 1024);
        assert_eq!(reduced, ShadowStrategy::Disabled);
        assert_eq!(reduced.resolution(), 1);
        assert!(!reduced.draws_casters());
    }

    #[test]
    fn test_one_map_per_cascade() {
        let mut backend = DummyBackend::new(8, 8);
        let mut maps = ShadowMaps::new(&mut backend, ShadowStrategy::Cascaded { resolution: 64 }).unwrap();
        assert_eq!(maps.views().len(), CASCADE_COUNT);
        assert_eq!(backend.live_texture_count(), CASCADE_COUNT);
        assert!(maps.pass_descriptor(CASCADE_COUNT).is_none());

        maps.cleanup(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
