//! Resource handles for graph descriptors.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of the builder that minted a handle.
///
/// Every [`GraphBuilder`](super::GraphBuilder) draws a fresh id, so handles of
/// two descriptors never compare equal even when their indices match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u32);

impl GraphId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Opaque reference to a resource declared in one graph descriptor.
///
/// Indices are positional and monotonic within a descriptor and are never
/// recycled. Index 0 and 1 are the back-buffer color and depth/stencil
/// targets every descriptor receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle {
    graph: GraphId,
    index: u32,
}

impl ResourceHandle {
    pub(crate) const BACK_BUFFER_COLOR: u32 = 0;
    pub(crate) const BACK_BUFFER_DEPTH_STENCIL: u32 = 1;
    pub(crate) const FIRST_DECLARED: u32 = 2;

    pub(crate) fn new(graph: GraphId, index: u32) -> Self {
        Self { graph, index }
    }

    /// Get the index of this resource within its descriptor.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the descriptor this handle belongs to.
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Whether this is the back-buffer color target.
    pub fn is_back_buffer_color(&self) -> bool {
        self.index == Self::BACK_BUFFER_COLOR
    }

    /// Whether this is the back-buffer depth/stencil target.
    pub fn is_back_buffer_depth_stencil(&self) -> bool {
        self.index == Self::BACK_BUFFER_DEPTH_STENCIL
    }

    /// Whether this is either back-buffer target.
    pub fn is_back_buffer(&self) -> bool {
        self.index < Self::FIRST_DECLARED
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.graph.0, self.index)
    }
}

/// Resource access type for dependency tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceAccess {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Read and write access.
    ReadWrite,
}

impl ResourceAccess {
    /// Check if this access includes reading.
    pub fn reads(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Check if this access includes writing.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_ids_are_unique() {
        let a = GraphId::next();
        let b = GraphId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handles_scoped_by_graph() {
        let a = ResourceHandle::new(GraphId::next(), 5);
        let b = ResourceHandle::new(GraphId::next(), 5);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
    }

    #[test]
    fn test_back_buffer_indices() {
        let graph = GraphId::next();
        assert!(ResourceHandle::new(graph, 0).is_back_buffer_color());
        assert!(ResourceHandle::new(graph, 1).is_back_buffer_depth_stencil());
        assert!(!ResourceHandle::new(graph, 2).is_back_buffer());
    }

    #[test]
    fn test_access_flags() {
        assert!(ResourceAccess::ReadWrite.reads());
        assert!(ResourceAccess::ReadWrite.writes());
        assert!(!ResourceAccess::Read.writes());
        assert!(!ResourceAccess::Write.reads());
    }
}
