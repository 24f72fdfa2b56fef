//! Resource management
//!
//! Model import, procedural geometry, materials, textures and the objects
//! built from them.

pub mod loader;
mod material;
mod mesh;
mod node;
mod object;
mod primitives;
mod texture;

pub use loader::{LoadError, MaterialData, MeshData, ModelData, ModelLoader, NodeData, ObjLoader};
pub use material::*;
pub use mesh::*;
pub use node::*;
pub use object::*;
pub use primitives::*;
pub use texture::*;
