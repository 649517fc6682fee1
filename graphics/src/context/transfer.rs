//! Arguments for texture uploads and texture-to-texture copies.

use crate::types::{CubeFace, Extent3d, Origin3d, TextureFormat};

/// A box inside one texture subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    /// Texel offset.
    pub origin: Origin3d,
    /// Size in texels.
    pub size: Extent3d,
}

impl TextureRegion {
    /// Create a region.
    pub fn new(origin: Origin3d, size: Extent3d) -> Self {
        Self { origin, size }
    }
}

/// Where and how texel data is written by `upload_texture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUpload {
    /// Format of the supplied data; must match the texture format.
    pub format: TextureFormat,
    /// Array element (cube index for cube arrays).
    pub array_index: u32,
    /// Face for cube and cube array textures.
    pub cube_face: Option<CubeFace>,
    /// Target mip level.
    pub mip_level: u32,
    /// Target box; `None` covers the whole mip level.
    pub region: Option<TextureRegion>,
}

impl TextureUpload {
    /// Upload the whole of mip 0, layer 0.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            array_index: 0,
            cube_face: None,
            mip_level: 0,
            region: None,
        }
    }

    /// Target a mip level.
    pub fn with_mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;
        self
    }

    /// Target an array element.
    pub fn with_array_index(mut self, array_index: u32) -> Self {
        self.array_index = array_index;
        self
    }

    /// Target a cube face.
    pub fn with_cube_face(mut self, face: CubeFace) -> Self {
        self.cube_face = Some(face);
        self
    }

    /// Restrict the upload to a region.
    pub fn with_region(mut self, origin: Origin3d, size: Extent3d) -> Self {
        self.region = Some(TextureRegion::new(origin, size));
        self
    }

    /// Layer index after folding in the cube face.
    pub fn layer(&self) -> u32 {
        match self.cube_face {
            Some(face) => self.array_index * 6 + face.index(),
            None => self.array_index,
        }
    }
}

/// One side of a texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureCopyLocation {
    /// Mip level.
    pub mip_level: u32,
    /// Array layer.
    pub array_layer: u32,
    /// Texel offset.
    pub origin: Origin3d,
}

impl TextureCopyLocation {
    /// Create a location.
    pub fn new(mip_level: u32, array_layer: u32, origin: Origin3d) -> Self {
        Self {
            mip_level,
            array_layer,
            origin,
        }
    }

    /// Mip 0, layer 0, origin zero.
    pub fn base() -> Self {
        Self::default()
    }
}

/// Region copied by `copy_texture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureCopyRegion {
    /// Source location.
    pub src: TextureCopyLocation,
    /// Destination location.
    pub dst: TextureCopyLocation,
    /// Size of the copied box.
    pub extent: Extent3d,
}

impl TextureCopyRegion {
    /// Create a copy region.
    pub fn new(src: TextureCopyLocation, dst: TextureCopyLocation, extent: Extent3d) -> Self {
        Self { src, dst, extent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_face_layer() {
        let upload = TextureUpload::new(TextureFormat::Rgba8Unorm)
            .with_array_index(2)
            .with_cube_face(CubeFace::NegativeY);
        assert_eq!(upload.layer(), 15);

        let plain = TextureUpload::new(TextureFormat::Rgba8Unorm).with_array_index(3);
        assert_eq!(plain.layer(), 3);
    }
}
