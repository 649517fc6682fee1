//! Execution statistics.

use std::ops::AddAssign;

/// Bytes of backend memory referenced by a compiled graph, by category.
///
/// Objects shared between handles through inheritance are counted once.
/// The back buffer is not included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VramUsage {
    /// Vertex buffer bytes.
    pub vertex_buffers: u64,
    /// Index buffer bytes.
    pub index_buffers: u64,
    /// Shader buffer bytes.
    pub shader_buffers: u64,
    /// Texture bytes over every mip level and layer.
    pub textures: u64,
}

impl VramUsage {
    /// Sum over every category.
    pub fn total(&self) -> u64 {
        self.vertex_buffers + self.index_buffers + self.shader_buffers + self.textures
    }
}

impl AddAssign for VramUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.vertex_buffers += rhs.vertex_buffers;
        self.index_buffers += rhs.index_buffers;
        self.shader_buffers += rhs.shader_buffers;
        self.textures += rhs.textures;
    }
}

/// Counters gathered while executing one or more graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteStatistics {
    /// Passes run.
    pub passes: u32,
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Vertices submitted, counting every instance.
    pub vertices: u64,
    /// Bytes written by buffer and texture uploads.
    pub uploaded_bytes: u64,
    /// Bytes moved by buffer and texture copies.
    pub copied_bytes: u64,
    /// Memory referenced by the executed graphs after execution.
    pub vram: VramUsage,
}

impl AddAssign for ExecuteStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.passes += rhs.passes;
        self.draw_calls += rhs.draw_calls;
        self.vertices += rhs.vertices;
        self.uploaded_bytes += rhs.uploaded_bytes;
        self.copied_bytes += rhs.copied_bytes;
        self.vram += rhs.vram;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate() {
        let mut total = ExecuteStatistics::default();
        total += ExecuteStatistics {
            passes: 2,
            draw_calls: 1,
            vertices: 3,
            uploaded_bytes: 64,
            copied_bytes: 0,
            vram: VramUsage {
                vertex_buffers: 64,
                ..Default::default()
            },
        };
        total += ExecuteStatistics {
            passes: 1,
            copied_bytes: 64,
            vram: VramUsage {
                textures: 256,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(total.passes, 3);
        assert_eq!(total.copied_bytes, 64);
        assert_eq!(total.vram.total(), 320);
    }
}
