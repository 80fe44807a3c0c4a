//! Asset loading errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to load OBJ file '{path}': {message}")]
    ObjLoad { path: PathBuf, message: String },

    #[error("model file '{0}' contains no meshes")]
    NoMeshes(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
