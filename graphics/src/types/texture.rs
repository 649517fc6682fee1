//! Texture types and descriptors.

use super::{Extent3d, Origin3d};
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, signed normalized.
    R8Snorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,
    /// 8-bit red channel, signed integer.
    R8Sint,

    // 16-bit formats
    /// 16-bit red channel, unsigned normalized.
    R16Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24Plus
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Returns true for sRGB-encoded color formats.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb)
    }

    /// Returns the size in bytes per pixel/block.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Snorm | Self::R8Uint | Self::R8Sint => 1,
            Self::R16Unorm | Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether whole texels of this format can be copied out of a texture.
    pub fn is_copy_src(&self) -> bool {
        !matches!(self, Self::Depth24Plus | Self::Depth24PlusStencil8)
    }

    /// Whether whole texels of this format can be copied into a texture.
    pub fn is_copy_dst(&self) -> bool {
        !matches!(
            self,
            Self::Depth24Plus
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shape of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// Single 2D image.
    #[default]
    D2,
    /// Array of 2D images; `size.depth` is the layer count.
    D2Array,
    /// Volume texture; `size.depth` is the depth in texels.
    D3,
    /// Six 2D faces.
    Cube,
    /// Array of cubes; `size.depth` is the cube count.
    CubeArray,
}

/// Face of a cube texture, in layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubeFace {
    /// Layer offset of this face within one cube.
    pub fn index(self) -> u32 {
        match self {
            Self::PositiveX => 0,
            Self::NegativeX => 1,
            Self::PositiveY => 2,
            Self::NegativeY => 3,
            Self::PositiveZ => 4,
            Self::NegativeZ => 5,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Texture shape.
    pub dimension: TextureDimension,
    /// Size of the texture; see [`TextureDimension`] for the meaning of `depth`.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Texture format.
    pub format: TextureFormat,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            dimension: TextureDimension::D2,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            sample_count: 1,
            format,
        }
    }

    /// Create a 2D array texture descriptor.
    pub fn new_2d_array(width: u32, height: u32, layers: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::D2Array,
            size: Extent3d::new_3d(width, height, layers),
            ..Self::new_2d(width, height, format)
        }
    }

    /// Create a 3D texture descriptor.
    pub fn new_3d(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::D3,
            size: Extent3d::new_3d(width, height, depth),
            ..Self::new_2d(width, height, format)
        }
    }

    /// Create a cube texture descriptor with square faces.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::Cube,
            ..Self::new_2d(size, size, format)
        }
    }

    /// Create a cube array texture descriptor.
    pub fn new_cube_array(size: u32, cubes: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::CubeArray,
            size: Extent3d::new_3d(size, size, cubes),
            ..Self::new_2d(size, size, format)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Request the complete mip chain down to 1x1.
    pub fn with_full_mip_chain(mut self) -> Self {
        self.mip_level_count = self.full_mip_chain_levels();
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Number of levels in a complete mip chain for this size.
    pub fn full_mip_chain_levels(&self) -> u32 {
        let mut largest = self.size.width.max(self.size.height);
        if self.dimension == TextureDimension::D3 {
            largest = largest.max(self.size.depth);
        }
        32 - largest.max(1).leading_zeros()
    }

    /// Number of array layers, counting each cube face as a layer.
    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            TextureDimension::D2 | TextureDimension::D3 => 1,
            TextureDimension::D2Array => self.size.depth.max(1),
            TextureDimension::Cube => 6,
            TextureDimension::CubeArray => 6 * self.size.depth.max(1),
        }
    }

    /// Extent of one layer at the given mip level.
    pub fn mip_extent(&self, level: u32) -> Extent3d {
        let depth = match self.dimension {
            TextureDimension::D3 => (self.size.depth >> level).max(1),
            _ => 1,
        };
        Extent3d::new_3d(
            (self.size.width >> level).max(1),
            (self.size.height >> level).max(1),
            depth,
        )
    }

    /// Byte size of one layer at the given mip level.
    pub fn subresource_size(&self, level: u32) -> u64 {
        let extent = self.mip_extent(level);
        u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(extent.depth)
            * u64::from(self.format.block_size())
            * u64::from(self.sample_count.max(1))
    }

    /// Total byte size over every layer and mip level.
    pub fn byte_size(&self) -> u64 {
        let per_layer: u64 = (0..self.mip_level_count)
            .map(|level| self.subresource_size(level))
            .sum();
        per_layer * u64::from(self.array_layers())
    }

    /// Whether a region at `origin` with `size` fits inside the given mip level.
    pub fn contains_region(&self, level: u32, origin: Origin3d, size: Extent3d) -> bool {
        let extent = self.mip_extent(level);
        level < self.mip_level_count
            && u64::from(origin.x) + u64::from(size.width) <= u64::from(extent.width)
            && u64::from(origin.y) + u64::from(size.height) <= u64::from(extent.height)
            && u64::from(origin.z) + u64::from(size.depth) <= u64::from(extent.depth)
    }

    /// Usage flags a backend texture is created with.
    pub fn usage(&self) -> TextureUsage {
        let mut usage = TextureUsage::TEXTURE_BINDING;
        if self.dimension != TextureDimension::D3 {
            usage |= TextureUsage::RENDER_ATTACHMENT;
        }
        if self.sample_count <= 1 {
            if self.format.is_copy_src() {
                usage |= TextureUsage::COPY_SRC;
            }
            if self.format.is_copy_dst() {
                usage |= TextureUsage::COPY_DST;
            }
        }
        usage
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_chain() {
        let desc = TextureDescriptor::new_2d(256, 64, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.full_mip_chain_levels(), 9);
        let desc = TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.full_mip_chain_levels(), 1);
        let desc = TextureDescriptor::new_3d(4, 4, 32, TextureFormat::R8Unorm);
        assert_eq!(desc.full_mip_chain_levels(), 6);
    }

    #[test]
    fn test_layers() {
        assert_eq!(
            TextureDescriptor::new_cube(16, TextureFormat::Rgba8Unorm).array_layers(),
            6
        );
        assert_eq!(
            TextureDescriptor::new_cube_array(16, 3, TextureFormat::Rgba8Unorm).array_layers(),
            18
        );
        assert_eq!(
            TextureDescriptor::new_3d(8, 8, 8, TextureFormat::Rgba8Unorm).array_layers(),
            1
        );
    }

    #[test]
    fn test_byte_size() {
        let desc = TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm).with_mip_levels(3);
        // 4x4 + 2x2 + 1x1 texels
        assert_eq!(desc.byte_size(), (16 + 4 + 1) * 4);

        let volume = TextureDescriptor::new_3d(4, 4, 4, TextureFormat::R8Unorm).with_mip_levels(2);
        assert_eq!(volume.byte_size(), 64 + 8);
    }

    #[test]
    fn test_region_bounds() {
        let desc = TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm).with_mip_levels(2);
        assert!(desc.contains_region(1, Origin3d::new(2, 2, 0), Extent3d::new_2d(2, 2)));
        assert!(!desc.contains_region(1, Origin3d::new(3, 0, 0), Extent3d::new_2d(2, 2)));
        assert!(!desc.contains_region(2, Origin3d::ZERO, Extent3d::new_2d(1, 1)));
    }

    #[test]
    fn test_depth_usage() {
        let depth = TextureDescriptor::new_2d(8, 8, TextureFormat::Depth24PlusStencil8);
        assert!(!depth.usage().contains(TextureUsage::COPY_SRC));
        let color = TextureDescriptor::new_2d(8, 8, TextureFormat::Bgra8Unorm);
        assert!(color.usage().contains(TextureUsage::COPY_SRC | TextureUsage::COPY_DST));
    }
}
