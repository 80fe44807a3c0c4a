//! Asset loading: OBJ models with vertex deduplication and RGBA8 texture
//! decoding.

mod error;

pub mod mesh;
pub mod model;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use mesh::{MeshData, MeshVertex};
pub use model::Model;
pub use texture::TextureData;
