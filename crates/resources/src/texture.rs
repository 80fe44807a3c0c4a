//! Texture loading and decoding.
//!
//! Decodes image files into RGBA8 pixel buffers ready for staging upload.
//! Whether the data is treated as sRGB is decided by the consumer at image
//! creation time (base-color textures are sRGB, everything else is linear),
//! so no color-space conversion happens here.

use std::path::Path;

use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Decoded RGBA8 pixel data.
#[derive(Clone, Debug)]
pub struct TextureData {
    /// Tightly packed RGBA8 pixels, row-major.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TextureData {
    /// Load and decode an image file into RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let decoded = image::open(path)?.into_rgba8();
        let (width, height) = decoded.dimensions();

        info!("Loaded texture {:?}: {}x{}", path, width, height);

        Ok(Self {
            pixels: decoded.into_raw(),
            width,
            height,
        })
    }

    /// A single-color texture, useful as a fallback or for untextured demos.
    pub fn solid_color(rgba: [u8; 4], width: u32, height: u32) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_dimensions() {
        let tex = TextureData::solid_color([255, 0, 0, 255], 4, 2);
        assert_eq!(tex.byte_size(), 4 * 2 * 4);
        assert_eq!(&tex.pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_texture_errors() {
        let err = TextureData::load(Path::new("missing.png")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }
}
