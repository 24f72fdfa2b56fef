//! Backend abstraction layer
//!
//! [`GraphicsBackend`] is implemented by the wgpu backend used at runtime and
//! by [`DummyBackend`], which records commands for tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use dummy::{DummyBackend, RecordedCommand};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
